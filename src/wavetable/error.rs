// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
/// Error types for turning an audio file into a wavetable
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Unsupported audio for {0}")]
    Unsupported(String),

    #[error("No audio found in {0}")]
    NoAudio(String),

    #[error("Audio file error: {0}")]
    AudioError(#[from] symphonia::core::errors::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Error types for sending a wavetable to the device
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("No MIDI output bound")]
    NoOutput,

    #[error("Wavetable must have 1024 samples, got {0}")]
    WrongLength(usize),
}
