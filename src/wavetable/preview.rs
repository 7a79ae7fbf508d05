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

//! Local preview of a wavetable through the default audio output.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, span, Level};

use super::{Wavetable, WAVETABLE_LEN};

/// The default preview pitch, roughly C3.
pub const DEFAULT_PITCH_HZ: f32 = 131.0;

/// The gain used when no volume is set.
pub const DEFAULT_GAIN: f32 = 0.5;

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("No audio output device available")]
    NoDevice,

    #[error("Unable to get the default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("Unable to build the output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("Unable to start the output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("Unsupported output sample format {0}")]
    UnsupportedFormat(String),
}

/// Maps a 0-127 volume to a gain. No volume means [`DEFAULT_GAIN`].
pub fn gain_for_volume(volume: Option<i32>) -> f32 {
    match volume {
        Some(volume) => volume.clamp(0, 127) as f32 / 127.0,
        None => DEFAULT_GAIN,
    }
}

/// Loops a wavetable at a fixed pitch with linear interpolation between
/// samples.
pub struct LoopVoice {
    samples: Vec<f32>,
    phase: f32,
    step: f32,
    gain: f32,
}

impl LoopVoice {
    pub fn new(wavetable: &Wavetable, sample_rate: f32, pitch_hz: f32, gain: f32) -> LoopVoice {
        LoopVoice {
            samples: wavetable.to_f32(),
            phase: 0.0,
            step: pitch_hz * WAVETABLE_LEN as f32 / sample_rate,
            gain,
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        let index = self.phase as usize % WAVETABLE_LEN;
        let frac = self.phase - self.phase.floor();
        let a = self.samples[index];
        let b = self.samples[(index + 1) % WAVETABLE_LEN];

        self.phase += self.step;
        if self.phase >= WAVETABLE_LEN as f32 {
            self.phase -= WAVETABLE_LEN as f32;
        }

        (a + (b - a) * frac) * self.gain
    }

    /// Fills an interleaved buffer, the same sample on every channel.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        for frame in out.chunks_mut(channels.max(1)) {
            frame.fill(self.next_sample());
        }
    }
}

/// A playing preview. Dropping it stops the sound.
pub struct Preview {
    _stream: cpal::Stream,
}

impl Preview {
    /// Starts looping the wavetable on the default output device.
    pub fn play(wavetable: &Wavetable, pitch_hz: f32, gain: f32) -> Result<Preview, PreviewError> {
        let span = span!(Level::INFO, "preview");
        let _enter = span.enter();

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(PreviewError::NoDevice)?;
        let config = device.default_output_config()?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        let mut voice = LoopVoice::new(wavetable, sample_rate, pitch_hz, gain);
        info!(sample_rate, channels, pitch_hz, gain, "Starting preview.");

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    voice.render(data, channels);
                },
                |err| error!(err = err.to_string(), "Preview stream error."),
                None,
            )?,
            cpal::SampleFormat::I16 => {
                let mut scratch = Vec::new();
                device.build_output_stream(
                    &config.into(),
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        scratch.resize(data.len(), 0.0f32);
                        voice.render(&mut scratch, channels);
                        for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                            *out = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                        }
                    },
                    |err| error!(err = err.to_string(), "Preview stream error."),
                    None,
                )?
            }
            format => return Err(PreviewError::UnsupportedFormat(format.to_string())),
        };

        stream.play()?;
        Ok(Preview { _stream: stream })
    }
}
