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

//! A short rolling log of device traffic. Lines starting with `>` came from
//! the device, lines starting with `<` came from us.

use std::collections::VecDeque;

use crate::{
    sysex::{self, ParamId, MANUFACTURER_ID, SYSEX_START},
    voice::{ControlChange, NoteEvent},
};

/// The number of lines kept.
pub const CAPACITY: usize = 4;

/// What a line represents. Lines with an equal kind are updated in place
/// instead of pushing a new line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    LogField(String),
    DeviceStatus,
    LocalStatus,
    Note,
    ControlChange(u8),
    OutboundCcMap(u8),
    OutboundParam(u8),
    Outbound,
}

impl Kind {
    fn coalesces(&self) -> bool {
        matches!(
            self,
            Kind::LogField(_)
                | Kind::ControlChange(_)
                | Kind::OutboundCcMap(_)
                | Kind::OutboundParam(_)
        )
    }
}

#[derive(Debug, Clone)]
struct Entry {
    line: String,
    kind: Kind,
}

/// The rolling log, newest line first.
#[derive(Debug, Default)]
pub struct MonitorLog {
    entries: VecDeque<Entry>,
}

impl MonitorLog {
    pub fn new() -> MonitorLog {
        MonitorLog::default()
    }

    /// The current lines, newest first.
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.line.clone()).collect()
    }

    /// A named value the device logged.
    pub fn log_field(&mut self, name: &str, value: &str) -> Option<String> {
        let line = format!("> {} {}", name.to_uppercase(), format_value(value))
            .trim()
            .to_string();
        self.push(line, Kind::LogField(name.to_string()))
    }

    /// A status line from the device.
    pub fn device_status(&mut self, message: &str) -> Option<String> {
        self.push(format!("> {}", message), Kind::DeviceStatus)
    }

    /// A status line about the session. Skipped if the same line is already
    /// showing.
    pub fn status(&mut self, message: &str) -> Option<String> {
        if message.is_empty() {
            return None;
        }
        let line = format!("< {}", message);
        if self.entries.iter().any(|entry| entry.line == line) {
            return None;
        }
        self.push(line, Kind::LocalStatus)
    }

    /// A status line about local work, always shown.
    pub fn local_status(&mut self, message: &str) -> Option<String> {
        self.push(format!("< {}", message), Kind::LocalStatus)
    }

    pub fn note(&mut self, event: &NoteEvent) -> Option<String> {
        self.push(
            format!("> {} / {} / {}", event.note, event.velocity, event.channel),
            Kind::Note,
        )
    }

    pub fn control_change(&mut self, event: &ControlChange) -> Option<String> {
        self.push(
            format!(
                "> CC / {} / {} / {}",
                event.controller, event.value, event.channel
            ),
            Kind::ControlChange(event.controller),
        )
    }

    /// A parameter frame we sent. Anything else is left out of the log.
    pub fn outbound(&mut self, frame: &[u8]) -> Option<String> {
        let [SYSEX_START, MANUFACTURER_ID, code, first, ..] = *frame else {
            return None;
        };
        let kind = match ParamId::try_from(code) {
            Ok(ParamId::CcMapping) => Kind::OutboundCcMap(first),
            Ok(
                ParamId::Velocity
                | ParamId::Channel
                | ParamId::Thru
                | ParamId::DelayFeedback
                | ParamId::DelayMix
                | ParamId::FilterResonance,
            ) => Kind::OutboundParam(code),
            Ok(ParamId::SaveSettings | ParamId::DumpSettings | ParamId::DeviceMode) => {
                Kind::Outbound
            }
            // Wavetable chunks would flush everything else out.
            Ok(ParamId::DumpWavetable) | Err(_) => return None,
        };
        self.push(format!("< {}", sysex::hex_string(frame)), kind)
    }

    /// Adds or updates a line. Returns the line unless nothing changed.
    fn push(&mut self, line: String, kind: Kind) -> Option<String> {
        if kind.coalesces() {
            if let Some(entry) = self.entries.iter_mut().find(|entry| entry.kind == kind) {
                if entry.line == line {
                    return None;
                }
                entry.line = line.clone();
                return Some(line);
            }
        }
        self.entries.push_front(Entry {
            line: line.clone(),
            kind,
        });
        self.entries.truncate(CAPACITY);
        Some(line)
    }
}

/// Strips an all-zero fraction from an integer-looking value, so "64.00"
/// reads as "64". Anything else is returned as is.
pub fn format_value(value: &str) -> &str {
    let Some((whole, fraction)) = value.split_once('.') else {
        return value;
    };
    let digits = whole.strip_prefix('-').unwrap_or(whole);
    let integral = !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit());
    let zeros = !fraction.is_empty() && fraction.chars().all(|c| c == '0');
    if integral && zeros {
        whole
    } else {
        value
    }
}
