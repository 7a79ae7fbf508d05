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
use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use super::{ConvertError, PcmBuffer};

/// Decodes an entire audio file (WAV, MP3, FLAC, OGG and anything else
/// symphonia handles) into per-channel f32 samples.
pub fn decode_file(path: &Path) -> Result<PcmBuffer, ConvertError> {
    let file_path = path.to_string_lossy().to_string();
    let file = File::open(path).map_err(|e| {
        ConvertError::IoError(std::io::Error::new(
            e.kind(),
            format!("{}: {}", file_path, e),
        ))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| ConvertError::Unsupported(format!("'{}': {}", file_path, e)))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ConvertError::NoAudio(file_path.clone()))?;
    let track_id = track.id;
    let sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| ConvertError::Unsupported(format!("'{}': {}", file_path, e)))?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    let mut sample_rate = sample_rate;
    while let Some(packet) = next_packet(format_reader.as_mut(), decoder.as_mut(), track_id)? {
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                decoder.decode(&packet)?
            }
            // A corrupt packet is skipped rather than failing the whole file.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(err = e, "Skipping undecodable packet.");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if sample_rate == 0 {
            sample_rate = decoded.spec().rate;
        }
        append_planes(decoded, &mut channels);
    }

    let buffer = PcmBuffer::new(channels, sample_rate);
    if buffer.frames() == 0 {
        return Err(ConvertError::NoAudio(file_path));
    }
    Ok(buffer)
}

/// Reads the next packet for the given track. Returns None at the end of the
/// stream.
fn next_packet(
    format_reader: &mut dyn FormatReader,
    decoder: &mut dyn Decoder,
    track_id: u32,
) -> Result<Option<Packet>, ConvertError> {
    loop {
        match format_reader.next_packet() {
            Ok(packet) if packet.track_id() == track_id => return Ok(Some(packet)),
            Ok(_) => continue,
            Err(SymphoniaError::ResetRequired) => decoder.reset(),
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None)
            }
            // Some readers report the end of the stream as a decode error.
            Err(SymphoniaError::DecodeError(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        }
    }
}

/// Appends a decoded buffer to the per-channel sample vectors.
fn append_planes(decoded: AudioBufferRef, channels: &mut Vec<Vec<f32>>) {
    match decoded {
        AudioBufferRef::F32(buf) => append(&buf, channels, |sample| sample),
        AudioBufferRef::F64(buf) => append(&buf, channels, |sample| sample as f32),
        AudioBufferRef::S8(buf) => append(&buf, channels, scale_s8),
        AudioBufferRef::S16(buf) => append(&buf, channels, scale_s16),
        AudioBufferRef::S24(buf) => append(&buf, channels, |sample| scale_s24(sample.inner())),
        AudioBufferRef::S32(buf) => append(&buf, channels, scale_s32),
        AudioBufferRef::U8(buf) => append(&buf, channels, scale_u8),
        AudioBufferRef::U16(buf) => append(&buf, channels, scale_u16),
        AudioBufferRef::U24(buf) => append(&buf, channels, |sample| scale_u24(sample.inner())),
        AudioBufferRef::U32(buf) => append(&buf, channels, scale_u32),
    }
}

fn append<T, F>(buf: &AudioBuffer<T>, channels: &mut Vec<Vec<f32>>, convert: F)
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let count = buf.spec().channels.count();
    if channels.len() < count {
        channels.resize_with(count, Vec::new);
    }

    let planes = buf.planes();
    for (channel, plane) in channels.iter_mut().zip(planes.planes().iter()) {
        channel.extend(plane[..buf.frames()].iter().map(|sample| convert(*sample)));
    }
}

#[inline]
fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
fn scale_s32(sample: i32) -> f32 {
    sample as f32 / (1i64 << 31) as f32
}

#[inline]
fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u24(sample: u32) -> f32 {
    let max = (1u32 << 24) - 1;
    (sample as f32 / max as f32) * 2.0 - 1.0
}

#[inline]
fn scale_u32(sample: u32) -> f32 {
    (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_decode_stereo_wav() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("stereo.wav");
        write_wav(
            &path,
            vec![vec![i16::MAX, 0, i16::MIN], vec![0, 16384, 0]],
            48000,
        )?;

        let buffer = decode_file(&path)?;
        assert_eq!(2, buffer.channel_count());
        assert_eq!(3, buffer.frames());
        assert_eq!(48000, buffer.sample_rate());

        let left = buffer.channel(0).expect("left channel");
        let right = buffer.channel(1).expect("right channel");
        assert!((left[0] - 1.0).abs() < 0.001);
        assert_eq!(0.0, left[1]);
        assert_eq!(-1.0, left[2]);
        assert_eq!(vec![0.0, 0.5, 0.0], right.to_vec());
        Ok(())
    }

    #[test]
    fn test_decode_long_mono_wav() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("mono.wav");
        let samples = (0..10000).map(|i| (i % 100) as i16).collect::<Vec<i16>>();
        write_wav(&path, vec![samples], 44100)?;

        let buffer = decode_file(&path)?;
        assert_eq!(1, buffer.channel_count());
        assert_eq!(10000, buffer.frames());
        Ok(())
    }

    #[test]
    fn test_decode_missing_file() {
        let result = decode_file(Path::new("/nonexistent/audio.wav"));
        assert!(matches!(result, Err(ConvertError::IoError(_))));
    }

    #[test]
    fn test_decode_garbage() -> Result<(), Box<dyn std::error::Error>> {
        let tempdir = tempfile::tempdir()?;
        let path = tempdir.path().join("garbage.wav");
        let mut file = File::create(&path)?;
        file.write_all(b"this is not audio at all")?;
        drop(file);

        assert!(decode_file(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_scaling() {
        assert_eq!(-1.0, scale_s8(i8::MIN));
        assert_eq!(-1.0, scale_s16(i16::MIN));
        assert_eq!(0.5, scale_s24(1 << 22));
        assert_eq!(-1.0, scale_s32(i32::MIN));
        assert_eq!(-1.0, scale_u8(0));
        assert_eq!(1.0, scale_u16(u16::MAX));
        assert_eq!(1.0, scale_u24((1 << 24) - 1));
        assert_eq!(-1.0, scale_u32(0));
    }
}
