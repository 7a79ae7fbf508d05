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
use std::{error::Error, path::Path};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;

use crate::{
    midi::Port,
    protocol::{Listener, ParamUpdate},
    sysex::DeviceInfo,
    voice::{ControlChange, NoteEvent},
};

/// Everything a [`RecordingListener`] was told, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Candidate port ids and the preferred id.
    PortsChanged(Vec<String>, Option<String>),
    Status(String),
    DeviceInfo(DeviceInfo),
    DeviceStatus(String),
    LogField(String, String),
    Parameter(ParamUpdate),
    Note(NoteEvent),
    ControlChange(ControlChange),
    FrameSent(Vec<u8>),
}

/// A listener that records every notification.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

impl Listener for RecordingListener {
    fn device_info(&self, info: &DeviceInfo) {
        self.record(Event::DeviceInfo(*info));
    }

    fn device_status(&self, message: &str) {
        self.record(Event::DeviceStatus(message.to_string()));
    }

    fn log_field(&self, name: &str, value: &str) {
        self.record(Event::LogField(name.to_string(), value.to_string()));
    }

    fn parameter(&self, update: &ParamUpdate) {
        self.record(Event::Parameter(*update));
    }

    fn note(&self, event: &NoteEvent) {
        self.record(Event::Note(*event));
    }

    fn control_change(&self, event: &ControlChange) {
        self.record(Event::ControlChange(*event));
    }

    fn status(&self, message: &str) {
        self.record(Event::Status(message.to_string()));
    }

    fn ports_changed(&self, ports: &[Port], preferred: Option<&str>) {
        self.record(Event::PortsChanged(
            ports.iter().map(|port| port.id().to_string()).collect(),
            preferred.map(str::to_string),
        ));
    }

    fn frame_sent(&self, frame: &[u8]) {
        self.record(Event::FrameSent(frame.to_vec()));
    }
}

/// Writes a 16-bit WAV file with one vector of samples per channel.
pub fn write_wav(path: &Path, samples: Vec<Vec<i16>>, sample_rate: u32) -> Result<(), Box<dyn Error>> {
    let num_channels = samples.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let mut writer = WavWriter::create(
        path,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )?;

    let frames = samples.iter().map(Vec::len).min().unwrap_or(0);
    for frame in 0..frames {
        for channel in samples.iter() {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}
