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
use std::fmt;

use crate::{
    protocol::ParamUpdate,
    sysex::{join_u14, ParamId},
};

/// The number of CC slots the device can remap.
pub const CC_SLOTS: usize = 13;

/// A single setting reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Velocity(u16),
    MidiChannel(u16),
    MidiThru(bool),
    FilterResonance(u16),
    DeviceMode(u8),
    CcMapping { index: u8, value: u8 },
}

impl Setting {
    /// Interprets a parameter message. Single-value settings join the two data
    /// bytes into 14 bits, CC mappings carry an index and a value. Returns None
    /// for ids that aren't tracked and for out of range CC slots.
    pub fn from_param(update: &ParamUpdate) -> Option<Setting> {
        let value = join_u14(update.a, update.b);
        match update.id {
            ParamId::Velocity => Some(Setting::Velocity(value)),
            ParamId::Channel => Some(Setting::MidiChannel(value)),
            ParamId::Thru => Some(Setting::MidiThru(value != 0)),
            ParamId::FilterResonance => Some(Setting::FilterResonance(value)),
            ParamId::DeviceMode => Some(Setting::DeviceMode(value.min(2) as u8)),
            ParamId::CcMapping if (update.a as usize) < CC_SLOTS => Some(Setting::CcMapping {
                index: update.a,
                value: update.b,
            }),
            _ => None,
        }
    }
}

/// The last known state of the device's settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSettings {
    pub velocity: u16,
    pub midi_channel: u16,
    pub midi_thru: bool,
    pub filter_resonance: u16,
    pub device_mode: u8,
    pub cc_map: [u8; CC_SLOTS],
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            velocity: 0,
            midi_channel: 1,
            midi_thru: false,
            filter_resonance: 0,
            device_mode: 0,
            cc_map: [0; CC_SLOTS],
        }
    }
}

impl DeviceSettings {
    /// Applies a parameter message. Returns the setting it changed, if any.
    pub fn apply(&mut self, update: &ParamUpdate) -> Option<Setting> {
        let setting = Setting::from_param(update)?;
        match setting {
            Setting::Velocity(value) => self.velocity = value,
            Setting::MidiChannel(value) => self.midi_channel = value,
            Setting::MidiThru(value) => self.midi_thru = value,
            Setting::FilterResonance(value) => self.filter_resonance = value,
            Setting::DeviceMode(value) => self.device_mode = value,
            Setting::CcMapping { index, value } => self.cc_map[index as usize] = value,
        }
        Some(setting)
    }
}

impl fmt::Display for DeviceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Velocity: {}", self.velocity)?;
        writeln!(f, "MIDI channel: {}", self.midi_channel)?;
        writeln!(f, "MIDI thru: {}", if self.midi_thru { "on" } else { "off" })?;
        writeln!(f, "Filter resonance: {}", self.filter_resonance)?;
        writeln!(f, "Device mode: {}", self.device_mode)?;
        write!(
            f,
            "CC map: {}",
            self.cc_map
                .iter()
                .map(|cc| cc.to_string())
                .collect::<Vec<String>>()
                .join(" ")
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn update(id: ParamId, a: u8, b: u8) -> ParamUpdate {
        ParamUpdate { id, a, b }
    }

    #[test]
    fn test_from_param() {
        assert_eq!(
            Some(Setting::Velocity(100)),
            Setting::from_param(&update(ParamId::Velocity, 0, 100))
        );
        assert_eq!(
            Some(Setting::FilterResonance(255)),
            Setting::from_param(&update(ParamId::FilterResonance, 1, 0x7F))
        );
        assert_eq!(
            Some(Setting::MidiThru(true)),
            Setting::from_param(&update(ParamId::Thru, 1, 0))
        );
        assert_eq!(
            Some(Setting::DeviceMode(2)),
            Setting::from_param(&update(ParamId::DeviceMode, 0, 9))
        );
        assert_eq!(
            Some(Setting::CcMapping {
                index: 12,
                value: 74
            }),
            Setting::from_param(&update(ParamId::CcMapping, 12, 74))
        );
    }

    #[test]
    fn test_ignored_params() {
        assert_eq!(None, Setting::from_param(&update(ParamId::CcMapping, 13, 1)));
        assert_eq!(None, Setting::from_param(&update(ParamId::DelayMix, 0, 1)));
        assert_eq!(None, Setting::from_param(&update(ParamId::DelayFeedback, 0, 1)));
        assert_eq!(None, Setting::from_param(&update(ParamId::SaveSettings, 0, 1)));
        assert_eq!(None, Setting::from_param(&update(ParamId::DumpWavetable, 0, 1)));
    }

    #[test]
    fn test_apply() {
        let mut settings = DeviceSettings::default();

        settings.apply(&update(ParamId::Velocity, 0, 90));
        settings.apply(&update(ParamId::Channel, 0, 10));
        settings.apply(&update(ParamId::Thru, 0, 1));
        settings.apply(&update(ParamId::CcMapping, 3, 21));
        assert_eq!(None, settings.apply(&update(ParamId::CcMapping, 40, 21)));

        let mut cc_map = [0; CC_SLOTS];
        cc_map[3] = 21;
        assert_eq!(
            DeviceSettings {
                velocity: 90,
                midi_channel: 10,
                midi_thru: true,
                filter_resonance: 0,
                device_mode: 0,
                cc_map,
            },
            settings
        );

        settings.apply(&update(ParamId::Thru, 0, 0));
        assert!(!settings.midi_thru);
    }
}
