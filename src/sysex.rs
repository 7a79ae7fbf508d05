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

//! The Ash SysEx vocabulary.
//!
//! Every frame is `[0xF0, 0x7D, ..., 0xF7]`. Device info, log and status
//! messages carry a kind byte after the manufacturer id. Parameter messages
//! carry the parameter id in that position instead, followed by two 7-bit
//! data bytes.

use std::fmt;

pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;
pub const MANUFACTURER_ID: u8 = 0x7D;

const KIND_DEVICE_INFO: u8 = 0x01;
const KIND_LOG: u8 = 0x02;
const KIND_STATUS: u8 = 0x03;

/// The largest value that fits into two 7-bit data bytes.
pub const MAX_U14: u16 = 0x3FFF;

/// The parameters the device understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ParamId {
    Velocity = 0x0A,
    Channel = 0x0B,
    Thru = 0x0C,
    DelayFeedback = 0x0D,
    DelayMix = 0x0E,
    FilterResonance = 0x0F,
    CcMapping = 0x10,
    SaveSettings = 0x11,
    DumpSettings = 0x12,
    DumpWavetable = 0x13,
    DeviceMode = 0x14,
}

impl ParamId {
    /// Returns the wire code for the parameter.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ParamId {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0x0A => ParamId::Velocity,
            0x0B => ParamId::Channel,
            0x0C => ParamId::Thru,
            0x0D => ParamId::DelayFeedback,
            0x0E => ParamId::DelayMix,
            0x0F => ParamId::FilterResonance,
            0x10 => ParamId::CcMapping,
            0x11 => ParamId::SaveSettings,
            0x12 => ParamId::DumpSettings,
            0x13 => ParamId::DumpWavetable,
            0x14 => ParamId::DeviceMode,
            _ => return Err(code),
        })
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:02x})", self, self.code())
    }
}

/// Identification the device reports in response to a device info request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: u8,
    pub hardware: u8,
    pub firmware: u8,
    pub serial: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model {} (hw {}, fw {}, serial {})",
            self.model, self.hardware, self.firmware, self.serial
        )
    }
}

/// A decoded vendor SysEx message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SysExMessage {
    DeviceInfo(DeviceInfo),
    Log { name: String, value: String },
    Status(String),
    /// A parameter message. The two data bytes are kept raw because the same
    /// shape carries both 14-bit values and (index, value) pairs.
    Param { id: ParamId, a: u8, b: u8 },
}

impl SysExMessage {
    /// Decodes a complete frame, including the 0xF0/0xF7 framing bytes.
    /// Returns None for anything that isn't a recognized Ash message.
    pub fn decode(frame: &[u8]) -> Option<SysExMessage> {
        match frame {
            [SYSEX_START, payload @ .., SYSEX_END] => Self::decode_payload(payload),
            _ => None,
        }
    }

    /// Decodes the bytes strictly between the framing bytes.
    pub fn decode_payload(payload: &[u8]) -> Option<SysExMessage> {
        decode_device_info(payload)
            .or_else(|| decode_status(payload))
            .or_else(|| decode_log(payload))
            .or_else(|| decode_param(payload))
    }

    /// Encodes the message into a complete frame. Numeric fields are
    /// saturated to what the wire can carry.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            SysExMessage::DeviceInfo(info) => {
                let (serial_hi, serial_lo) = split_u14(info.serial);
                frame(&[
                    KIND_DEVICE_INFO,
                    to_u7(info.model),
                    to_u7(info.hardware),
                    to_u7(info.firmware),
                    serial_hi,
                    serial_lo,
                ])
            }
            SysExMessage::Log { name, value } => {
                let mut body = vec![KIND_LOG];
                body.extend(ascii_bytes(name));
                body.push(0x00);
                body.extend(ascii_bytes(value));
                body.push(0x00);
                frame(&body)
            }
            SysExMessage::Status(message) => {
                let mut body = vec![KIND_STATUS];
                body.extend(ascii_bytes(message));
                body.push(0x00);
                frame(&body)
            }
            SysExMessage::Param { id, a, b } => param_pair_frame(*id, *a as i32, *b as i32),
        }
    }
}

/// The request that asks the device to identify itself.
pub fn device_info_request() -> Vec<u8> {
    frame(&[KIND_DEVICE_INFO])
}

/// Encodes a single-value parameter, splitting the value into two 7-bit bytes.
pub fn param_frame(id: ParamId, value: i32) -> Vec<u8> {
    let (msb, lsb) = split_u14(value.clamp(0, MAX_U14 as i32) as u16);
    frame(&[id.code(), msb, lsb])
}

/// Encodes a dual-value parameter as two independent 7-bit bytes.
pub fn param_pair_frame(id: ParamId, first: i32, second: i32) -> Vec<u8> {
    frame(&[id.code(), first.clamp(0, 0x7F) as u8, second.clamp(0, 0x7F) as u8])
}

/// Splits a 14-bit value into (msb, lsb). Values above 14 bits saturate.
pub fn split_u14(value: u16) -> (u8, u8) {
    let value = value.min(MAX_U14);
    (((value >> 7) & 0x7F) as u8, (value & 0x7F) as u8)
}

/// Rebuilds a 14-bit value from its two 7-bit halves.
pub fn join_u14(msb: u8, lsb: u8) -> u16 {
    (((msb & 0x7F) as u16) << 7) | (lsb & 0x7F) as u16
}

/// Renders bytes the way outbound frames are traced: `0xf0 0x7d ...`.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("0x{:02x}", byte))
        .collect::<Vec<String>>()
        .join(" ")
}

/// Wraps a body in the framing bytes and manufacturer id.
pub(crate) fn frame(body: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(body.len() + 3);
    frame.push(SYSEX_START);
    frame.push(MANUFACTURER_ID);
    frame.extend_from_slice(body);
    frame.push(SYSEX_END);
    frame
}

fn to_u7(value: u8) -> u8 {
    value.min(0x7F)
}

fn ascii_bytes(value: &str) -> impl Iterator<Item = u8> + '_ {
    value.chars().map(|c| (c as u32).min(0x7F) as u8).filter(|b| *b != 0x00)
}

// Bytes map one to one onto chars so that stray high bytes never fail a decode.
fn ascii(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| *byte as char).collect()
}

fn has_header(payload: &[u8], kind: u8) -> bool {
    payload.len() >= 2 && payload[0] == MANUFACTURER_ID && payload[1] == kind
}

fn find_nul(payload: &[u8], from: usize) -> Option<usize> {
    payload
        .get(from..)?
        .iter()
        .position(|byte| *byte == 0x00)
        .map(|pos| pos + from)
}

fn decode_device_info(payload: &[u8]) -> Option<SysExMessage> {
    if !has_header(payload, KIND_DEVICE_INFO) || payload.len() < 7 {
        return None;
    }

    Some(SysExMessage::DeviceInfo(DeviceInfo {
        model: payload[2],
        hardware: payload[3],
        firmware: payload[4],
        serial: ((payload[5] as u16) << 7) | payload[6] as u16,
    }))
}

fn decode_status(payload: &[u8]) -> Option<SysExMessage> {
    if !has_header(payload, KIND_STATUS) {
        return None;
    }

    let end = find_nul(payload, 2)?;
    Some(SysExMessage::Status(ascii(&payload[2..end])))
}

fn decode_log(payload: &[u8]) -> Option<SysExMessage> {
    if !has_header(payload, KIND_LOG) {
        return None;
    }

    let name_end = find_nul(payload, 2)?;
    // The value terminator is optional.
    let value_end = find_nul(payload, name_end + 1).unwrap_or(payload.len());
    Some(SysExMessage::Log {
        name: ascii(&payload[2..name_end]),
        value: ascii(&payload[name_end + 1..value_end]),
    })
}

fn decode_param(payload: &[u8]) -> Option<SysExMessage> {
    match payload {
        [MANUFACTURER_ID, id, a, b] => Some(SysExMessage::Param {
            id: ParamId::try_from(*id).ok()?,
            a: *a,
            b: *b,
        }),
        _ => None,
    }
}
