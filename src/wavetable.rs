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

//! Wavetables: conversion from audio files, local preview and transfer to the device.

use std::{fmt, path::Path, time::Duration};

use tracing::{debug, info, span, Level};

use crate::{
    protocol::Output,
    sysex::{self, ParamId},
};

pub mod convert;
pub mod decode;
mod error;
pub mod preview;

pub use convert::PcmBuffer;
pub use error::{ConvertError, TransferError};

/// The number of samples in a wavetable.
pub const WAVETABLE_LEN: usize = 1024;

/// The number of samples carried by one transfer frame.
pub const CHUNK_LEN: usize = 32;

/// The pause between transfer frames. The device has a small receive buffer
/// and no way to acknowledge, so frames sent faster than this are lost.
pub const CHUNK_PAUSE: Duration = Duration::from_millis(4);

/// The highest table slot on the device.
pub const MAX_TABLE_ID: i32 = 2;

/// A single-cycle waveform of exactly [`WAVETABLE_LEN`] signed 8-bit samples.
#[derive(Clone, PartialEq, Eq)]
pub struct Wavetable {
    samples: Vec<i8>,
}

impl Wavetable {
    /// Returns None unless there are exactly [`WAVETABLE_LEN`] samples.
    pub fn new(samples: Vec<i8>) -> Option<Wavetable> {
        if samples.len() != WAVETABLE_LEN {
            return None;
        }
        Some(Wavetable { samples })
    }

    /// Decodes an audio file and converts it into a wavetable.
    pub fn from_file(path: &Path) -> Result<Wavetable, ConvertError> {
        let span = span!(Level::INFO, "load wavetable");
        let _enter = span.enter();

        let buffer = decode::decode_file(path)?;
        info!(
            path = ?path,
            channels = buffer.channel_count(),
            frames = buffer.frames(),
            sample_rate = buffer.sample_rate(),
            "Decoded audio."
        );
        convert::convert(&buffer)
    }

    pub fn samples(&self) -> &[i8] {
        &self.samples
    }

    /// The samples scaled into [-1.0, 1.0).
    pub fn to_f32(&self) -> Vec<f32> {
        self.samples
            .iter()
            .map(|sample| *sample as f32 / 128.0)
            .collect()
    }
}

impl fmt::Debug for Wavetable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (min, max) = self
            .samples
            .iter()
            .fold((i8::MAX, i8::MIN), |(min, max), s| (min.min(*s), max.max(*s)));
        write!(f, "Wavetable {{ min: {}, max: {} }}", min, max)
    }
}

/// Builds one transfer frame. Each sample is offset into [0,255] and split
/// into a 1-bit msb and a 7-bit lsb.
pub fn chunk_frame(table_id: u8, chunk: u8, samples: &[i8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(3 + samples.len() * 2);
    body.push(ParamId::DumpWavetable.code());
    body.push(table_id);
    body.push(chunk);
    for sample in samples {
        let value = (*sample as i16 + 128) as u8;
        body.push((value >> 7) & 0x01);
        body.push(value & 0x7F);
    }
    sysex::frame(&body)
}

/// Sends the samples to the given table slot in [`CHUNK_LEN`] sized frames,
/// pausing [`CHUNK_PAUSE`] after each one. Success only means every frame was
/// handed to the output; the device never confirms receipt.
pub async fn transfer(
    output: Option<&Output>,
    table_id: i32,
    samples: &[i8],
) -> Result<(), TransferError> {
    let output = output.ok_or(TransferError::NoOutput)?;
    if samples.len() != WAVETABLE_LEN {
        return Err(TransferError::WrongLength(samples.len()));
    }

    let table_id = table_id.clamp(0, MAX_TABLE_ID) as u8;
    info!(
        table = table_id,
        port = output.port().name(),
        "Sending wavetable."
    );

    for (chunk, samples) in samples.chunks(CHUNK_LEN).enumerate() {
        debug!(table = table_id, chunk, "Sending wavetable chunk.");
        output.send(&chunk_frame(table_id, chunk as u8, samples));
        tokio::time::sleep(CHUNK_PAUSE).await;
    }

    info!(table = table_id, "Wavetable sent.");
    Ok(())
}
