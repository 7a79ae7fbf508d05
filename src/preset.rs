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

//! Presets saved to and loaded from JSON files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::{
    protocol::Session,
    settings::{DeviceSettings, CC_SLOTS},
};

/// The file name used when none is given.
pub const DEFAULT_PRESET_NAME: &str = "ascetik-ash-preset";

/// The preset format version written to files.
pub const PRESET_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("Invalid preset file: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A complete preset, as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub version: u32,
    pub velocity: u16,
    pub midi_channel: u16,
    pub midi_thru: bool,
    pub filter_resonance: u16,
    pub cc_map: Vec<u8>,
}

impl Preset {
    pub fn from_settings(settings: &DeviceSettings) -> Preset {
        Preset {
            version: PRESET_VERSION,
            velocity: settings.velocity,
            midi_channel: settings.midi_channel,
            midi_thru: settings.midi_thru,
            filter_resonance: settings.filter_resonance,
            cc_map: settings.cc_map.iter().map(|cc| (*cc).min(127)).collect(),
        }
    }

    /// Writes the preset as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), PresetError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = ?path, "Saved preset.");
        Ok(())
    }
}

/// The file a preset with the given name is saved to. Blank names fall back
/// to [`DEFAULT_PRESET_NAME`] and `.json` is appended when missing.
pub fn preset_path(name: Option<&str>) -> PathBuf {
    let name = name.map(str::trim).filter(|name| !name.is_empty());
    let name = name.unwrap_or(DEFAULT_PRESET_NAME);
    if name.ends_with(".json") {
        PathBuf::from(name)
    } else {
        PathBuf::from(format!("{}.json", name))
    }
}

/// The settings found in a preset file. Fields that are absent or of the
/// wrong type are left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetUpdate {
    pub velocity: Option<i32>,
    pub midi_channel: Option<i32>,
    pub midi_thru: Option<bool>,
    pub filter_resonance: Option<i32>,
    /// Slot index and mapped CC.
    pub cc_map: Vec<(usize, u8)>,
}

impl PresetUpdate {
    /// Parses preset JSON. Only malformed JSON is an error.
    pub fn parse(text: &str) -> Result<PresetUpdate, PresetError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(object) = value else {
            return Ok(PresetUpdate::default());
        };

        let cc_map = match object.get("ccMap") {
            Some(Value::Array(entries)) => entries
                .iter()
                .take(CC_SLOTS)
                .enumerate()
                .filter_map(|(index, entry)| {
                    integer(entry).map(|cc| (index, cc.clamp(0, 127) as u8))
                })
                .collect(),
            _ => Vec::new(),
        };

        Ok(PresetUpdate {
            velocity: object.get("velocity").and_then(integer).map(saturate),
            midi_channel: object.get("midiChannel").and_then(integer).map(saturate),
            midi_thru: object.get("midiThru").and_then(Value::as_bool),
            filter_resonance: object
                .get("filterResonance")
                .and_then(integer)
                .map(|value| value.clamp(0, 127) as i32),
            cc_map,
        })
    }

    /// Reads and parses a preset file.
    pub fn load(path: &Path) -> Result<PresetUpdate, PresetError> {
        PresetUpdate::parse(&fs::read_to_string(path)?)
    }

    /// Sends every setting in the preset to the device.
    pub fn apply(&self, session: &Session) {
        if let Some(velocity) = self.velocity {
            session.set_velocity(velocity);
        }
        if let Some(channel) = self.midi_channel {
            session.set_midi_channel(channel);
        }
        if let Some(thru) = self.midi_thru {
            session.set_midi_thru(thru);
        }
        if let Some(resonance) = self.filter_resonance {
            session.set_filter_resonance(resonance);
        }
        for (index, cc) in self.cc_map.iter() {
            session.set_cc_mapping(*index as i32, *cc as i32);
        }
    }
}

/// Integers, including floats with no fractional part.
fn integer(value: &Value) -> Option<i64> {
    if let Some(value) = value.as_i64() {
        return Some(value);
    }
    match value.as_f64() {
        Some(value) if value.fract() == 0.0 && value.is_finite() => Some(value as i64),
        _ => None,
    }
}

fn saturate(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::{config::Config, midi::mock, testutil::RecordingListener};

    #[test]
    fn test_preset_path() {
        assert_eq!(PathBuf::from("ascetik-ash-preset.json"), preset_path(None));
        assert_eq!(PathBuf::from("ascetik-ash-preset.json"), preset_path(Some("  ")));
        assert_eq!(PathBuf::from("bass.json"), preset_path(Some("bass")));
        assert_eq!(PathBuf::from("bass.json"), preset_path(Some(" bass.json ")));
    }

    #[test]
    fn test_save() -> Result<(), Box<dyn std::error::Error>> {
        let mut settings = DeviceSettings {
            velocity: 100,
            midi_channel: 3,
            midi_thru: true,
            filter_resonance: 40,
            ..Default::default()
        };
        settings.cc_map[12] = 74;

        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("preset.json");
        Preset::from_settings(&settings).save(&path)?;

        let saved: Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(
            serde_json::json!({
                "version": 1,
                "velocity": 100,
                "midiChannel": 3,
                "midiThru": true,
                "filterResonance": 40,
                "ccMap": [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 74],
            }),
            saved
        );

        // A saved preset loads back in full.
        let update = PresetUpdate::load(&path)?;
        assert_eq!(Some(100), update.velocity);
        assert_eq!(Some(3), update.midi_channel);
        assert_eq!(Some(true), update.midi_thru);
        assert_eq!(Some(40), update.filter_resonance);
        assert_eq!(CC_SLOTS, update.cc_map.len());
        Ok(())
    }

    #[test]
    fn test_parse_partial() -> Result<(), PresetError> {
        let update = PresetUpdate::parse(
            r#"{
                "velocity": 64.0,
                "midiChannel": "two",
                "midiThru": 1,
                "filterResonance": 300,
                "ccMap": [1, "x", 200, -5, 2.5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]
            }"#,
        )?;

        assert_eq!(
            PresetUpdate {
                velocity: Some(64),
                midi_channel: None,
                midi_thru: None,
                filter_resonance: Some(127),
                cc_map: vec![
                    (0, 1),
                    (2, 127),
                    (3, 0),
                    (5, 6),
                    (6, 7),
                    (7, 8),
                    (8, 9),
                    (9, 10),
                    (10, 11),
                    (11, 12),
                    (12, 13),
                ],
            },
            update
        );
        Ok(())
    }

    #[test]
    fn test_parse_non_objects() -> Result<(), PresetError> {
        assert_eq!(PresetUpdate::default(), PresetUpdate::parse("[1, 2]")?);
        assert_eq!(PresetUpdate::default(), PresetUpdate::parse("null")?);
        assert!(matches!(
            PresetUpdate::parse("{ not json"),
            Err(PresetError::Invalid(_))
        ));
        Ok(())
    }

    #[test]
    fn test_apply() -> Result<(), PresetError> {
        let transport = mock::Transport::new();
        transport.add_device("ash", "Ascetik Ash");
        let (tx, _rx) = mpsc::channel(16);
        let mut session = Session::new(
            Arc::new(transport.clone()),
            Arc::new(RecordingListener::default()),
            &Config::default(),
            tx,
        );
        session.select_input("ash");
        transport.clear_sent();

        PresetUpdate::parse(r#"{"velocity": 90, "midiThru": false, "ccMap": [5]}"#)?
            .apply(&session);

        assert_eq!(
            vec![
                vec![0xF0, 0x7D, 0x0A, 0x00, 90, 0xF7],
                vec![0xF0, 0x7D, 0x0C, 0x00, 0x00, 0xF7],
                vec![0xF0, 0x7D, 0x10, 0x00, 0x05, 0xF7],
            ],
            transport.sent()
        );
        Ok(())
    }
}
