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

//! A control surface for the Ascetik Ash synthesizer: device discovery, the
//! vendor SysEx parameter protocol, a rolling traffic monitor, presets and
//! wavetable conversion, preview and upload.

pub mod app;
pub mod config;
pub mod midi;
pub mod monitor;
pub mod preset;
pub mod protocol;
pub mod settings;
pub mod sysex;
#[cfg(test)]
mod testutil;
pub mod voice;
pub mod wavetable;
