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
use std::{path::Path, time::Duration};

use duration_string::DurationString;
use serde::Deserialize;

use crate::wavetable::preview::{gain_for_volume, DEFAULT_PITCH_HZ};

mod error;

pub use error::ConfigError;

/// Only ports whose names start with this are considered.
pub const DEFAULT_VENDOR_PREFIX: &str = "Ascetik";

/// The port name preferred over other vendor ports.
pub const DEFAULT_DEVICE_NAME: &str = "Ascetik Ash";

/// How often the port list is checked for changes.
pub const DEFAULT_PORT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The configuration for the control surface. Every field is optional.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Config {
    /// The port name prefix that identifies the vendor's devices.
    vendor_prefix: Option<String>,

    /// The exact port name preferred during discovery.
    device_name: Option<String>,

    /// How often to look for plugged or unplugged devices, e.g. "500ms".
    port_poll_interval: Option<String>,

    /// Local wavetable preview settings.
    preview: Option<Preview>,
}

/// Settings for previewing a wavetable locally.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Preview {
    /// The playback pitch in Hz.
    pitch_hz: Option<f32>,

    /// The playback volume, 0-127.
    volume: Option<i32>,
}

impl Preview {
    pub fn pitch_hz(&self) -> f32 {
        self.pitch_hz.unwrap_or(DEFAULT_PITCH_HZ)
    }

    /// The gain derived from the volume.
    pub fn gain(&self) -> f32 {
        gain_for_volume(self.volume)
    }
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Config, ConfigError> {
        Ok(::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()?
            .try_deserialize::<Config>()?)
    }

    pub fn vendor_prefix(&self) -> &str {
        self.vendor_prefix.as_deref().unwrap_or(DEFAULT_VENDOR_PREFIX)
    }

    pub fn device_name(&self) -> &str {
        self.device_name.as_deref().unwrap_or(DEFAULT_DEVICE_NAME)
    }

    /// Returns the port poll interval from the configuration.
    pub fn port_poll_interval(&self) -> Result<Duration, ConfigError> {
        match &self.port_poll_interval {
            Some(interval) => {
                let interval: Duration = DurationString::from_string(interval.clone())
                    .map_err(|e| ConfigError::Duration(e.to_string()))?
                    .into();
                if interval.is_zero() {
                    return Err(ConfigError::Duration(
                        "port poll interval must be positive".to_string(),
                    ));
                }
                Ok(interval)
            }
            None => Ok(DEFAULT_PORT_POLL_INTERVAL),
        }
    }

    /// Returns the preview settings, defaulted if absent.
    pub fn preview(&self) -> Preview {
        self.preview.clone().unwrap_or_default()
    }
}
