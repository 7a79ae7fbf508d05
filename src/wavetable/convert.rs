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

//! Turns decoded audio into a wavetable: downmix, resample, normalize, quantize.

use super::{ConvertError, Wavetable, WAVETABLE_LEN};

/// Decoded audio, one vector of samples per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl PcmBuffer {
    /// Creates a new buffer. Channels are truncated to the shortest one.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> PcmBuffer {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        channels.iter_mut().for_each(|channel| channel.truncate(frames));
        PcmBuffer {
            channels,
            sample_rate,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// The number of samples per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }
}

/// Converts the buffer into a wavetable.
pub fn convert(buffer: &PcmBuffer) -> Result<Wavetable, ConvertError> {
    if buffer.frames() == 0 {
        return Err(ConvertError::NoAudio("decoded buffer".to_string()));
    }

    let mut samples = resample(&downmix(buffer), WAVETABLE_LEN);
    normalize(&mut samples);

    // The resampler always produces WAVETABLE_LEN samples.
    Wavetable::new(quantize(&samples))
        .ok_or_else(|| ConvertError::Unsupported("resampled buffer".to_string()))
}

/// Averages all channels into one.
pub fn downmix(buffer: &PcmBuffer) -> Vec<f32> {
    if buffer.channel_count() == 1 {
        return buffer.channels[0].clone();
    }

    let count = buffer.channel_count() as f32;
    let mut mono = vec![0.0f32; buffer.frames()];
    for channel in buffer.channels.iter() {
        for (mixed, sample) in mono.iter_mut().zip(channel.iter()) {
            *mixed += sample / count;
        }
    }
    mono
}

/// Linearly interpolates `data` onto `len` points spread over the source.
/// The point past the last sample clamps to the last sample.
pub fn resample(data: &[f32], len: usize) -> Vec<f32> {
    if data.len() == len || data.is_empty() {
        return data.to_vec();
    }

    let last = data.len() - 1;
    let scale = data.len() as f64 / len as f64;
    (0..len)
        .map(|i| {
            let position = i as f64 * scale;
            let index = (position.floor() as usize).min(last);
            let frac = (position - index as f64) as f32;
            let a = data[index];
            let b = data[(index + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}

/// Scales so the loudest sample reaches 1.0. Silence is left alone.
pub fn normalize(data: &mut [f32]) {
    let peak = data.iter().fold(0.0f32, |peak, sample| peak.max(sample.abs()));
    if peak <= 0.0 {
        return;
    }

    let scale = 1.0 / peak;
    data.iter_mut().for_each(|sample| *sample *= scale);
}

/// Quantizes to signed 8-bit. Negative samples scale by 128 and the rest by
/// 127 so both ends of the range are reachable.
pub fn quantize(data: &[f32]) -> Vec<i8> {
    data.iter()
        .map(|sample| {
            let scaled = if *sample < 0.0 {
                sample * 128.0
            } else {
                sample * 127.0
            };
            // Halves round up.
            (scaled + 0.5).floor().clamp(-128.0, 127.0) as i8
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_downmix() {
        let buffer = PcmBuffer::new(vec![vec![1.0, -1.0], vec![1.0, -1.0]], 44100);
        assert_eq!(vec![1.0, -1.0], downmix(&buffer));

        let buffer = PcmBuffer::new(vec![vec![1.0, 0.5], vec![0.0, -0.5]], 44100);
        assert_eq!(vec![0.5, 0.0], downmix(&buffer));

        let buffer = PcmBuffer::new(vec![vec![0.25, 0.5, 0.75]], 44100);
        assert_eq!(vec![0.25, 0.5, 0.75], downmix(&buffer));
    }

    #[test]
    fn test_uneven_channels_truncate() {
        let buffer = PcmBuffer::new(vec![vec![1.0, 1.0, 1.0], vec![1.0, 1.0]], 48000);
        assert_eq!(2, buffer.frames());
        assert_eq!(2, buffer.channel_count());
    }

    #[test]
    fn test_resample_interpolates() {
        let resampled = resample(&[0.0, 1.0], 4);
        assert_eq!(vec![0.0, 0.5, 1.0, 1.0], resampled);

        let resampled = resample(&[0.0, 2.0, 4.0, 6.0], 2);
        assert_eq!(vec![0.0, 4.0], resampled);

        let same = resample(&[0.1, 0.2, 0.3], 3);
        assert_eq!(vec![0.1, 0.2, 0.3], same);
    }

    #[test]
    fn test_resample_length() {
        let data = (0..44100).map(|i| (i as f32 / 44100.0).sin()).collect::<Vec<f32>>();
        assert_eq!(WAVETABLE_LEN, resample(&data, WAVETABLE_LEN).len());
        assert_eq!(WAVETABLE_LEN, resample(&[0.3], WAVETABLE_LEN).len());
    }

    #[test]
    fn test_normalize() {
        let mut data = vec![0.25, -0.5, 0.125];
        normalize(&mut data);
        assert_eq!(vec![0.5, -1.0, 0.25], data);

        let mut silence = vec![0.0; 8];
        normalize(&mut silence);
        assert_eq!(vec![0.0; 8], silence);
    }

    #[test]
    fn test_quantize() {
        assert_eq!(
            vec![-128, -64, 0, 64, 127],
            quantize(&[-1.0, -0.5, 0.0, 0.5039, 1.0])
        );
        // Out of range input clamps.
        assert_eq!(vec![-128, 127], quantize(&[-3.0, 3.0]));
        // Halves round toward positive infinity.
        assert_eq!(vec![-1, 1], quantize(&[-1.5 / 128.0, 0.5 / 127.0]));
    }

    #[test]
    fn test_convert_stereo() {
        let buffer = PcmBuffer::new(vec![vec![1.0, -1.0], vec![1.0, -1.0]], 44100);
        let wavetable = convert(&buffer).expect("conversion should succeed");
        let samples = wavetable.samples();

        assert_eq!(WAVETABLE_LEN, samples.len());
        assert_eq!(127, samples[0]);
        // The midpoint of the ramp from 1 to -1.
        assert_eq!(0, samples[256]);
        // Past the last source sample everything clamps to it.
        assert!(samples[512..].iter().all(|sample| *sample == -128));
    }

    #[test]
    fn test_convert_silence() {
        let buffer = PcmBuffer::new(vec![vec![0.0; 300], vec![0.0; 300]], 44100);
        let wavetable = convert(&buffer).expect("conversion should succeed");
        assert!(wavetable.samples().iter().all(|sample| *sample == 0));
    }

    #[test]
    fn test_convert_normalizes_quiet_audio() {
        let data = (0..2048)
            .map(|i| 0.1 * (2.0 * std::f32::consts::PI * i as f32 / 2048.0).sin())
            .collect::<Vec<f32>>();
        let wavetable = convert(&PcmBuffer::new(vec![data], 48000)).expect("conversion");

        assert_eq!(Some(&127), wavetable.samples().iter().max());
        assert_eq!(Some(&-128), wavetable.samples().iter().min());
    }

    #[test]
    fn test_convert_empty() {
        assert!(matches!(
            convert(&PcmBuffer::new(vec![], 44100)),
            Err(ConvertError::NoAudio(_))
        ));
        assert!(matches!(
            convert(&PcmBuffer::new(vec![vec![]], 44100)),
            Err(ConvertError::NoAudio(_))
        ));
    }
}
