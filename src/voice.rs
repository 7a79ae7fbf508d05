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

use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage,
};

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;

/// Whether a note started or stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteState {
    On,
    Off,
}

impl fmt::Display for NoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoteState::On => write!(f, "on"),
            NoteState::Off => write!(f, "off"),
        }
    }
}

/// A note event. The channel is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub note: u8,
    pub velocity: u8,
    pub channel: u8,
    pub state: NoteState,
}

/// A control change. The channel is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlChange {
    pub controller: u8,
    pub value: u8,
    pub channel: u8,
}

/// The channel voice messages the monitor cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelVoice {
    Note(NoteEvent),
    ControlChange(ControlChange),
}

/// Classifies a raw message by its status byte. Messages shorter than three
/// bytes and message types other than notes and CCs are ignored.
pub fn parse(bytes: &[u8]) -> Option<ChannelVoice> {
    let [status, first, second, ..] = *bytes else {
        return None;
    };

    let channel = (status & 0x0F) + 1;
    match status & 0xF0 {
        NOTE_ON if second > 0 => Some(ChannelVoice::Note(NoteEvent {
            note: first,
            velocity: second,
            channel,
            state: NoteState::On,
        })),
        // A note on with zero velocity is a note off.
        NOTE_ON | NOTE_OFF => Some(ChannelVoice::Note(NoteEvent {
            note: first,
            velocity: second,
            channel,
            state: NoteState::Off,
        })),
        CONTROL_CHANGE => Some(ChannelVoice::ControlChange(ControlChange {
            controller: first,
            value: second,
            channel,
        })),
        _ => None,
    }
}

/// Encodes a control change. Inputs are clamped: controller and value to
/// [0,127], channel to [1,16].
pub fn control_change(controller: i32, value: i32, channel: i32) -> Vec<u8> {
    let event = LiveEvent::Midi {
        channel: u4::from((channel.clamp(1, 16) - 1) as u8),
        message: MidiMessage::Controller {
            controller: u7::from(controller.clamp(0, 127) as u8),
            value: u7::from(value.clamp(0, 127) as u8),
        },
    };

    let mut buf: Vec<u8> = Vec::with_capacity(3);
    // Writing a channel message into a Vec can't fail.
    let _ = event.write(&mut buf);
    buf
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_note_on() {
        assert_eq!(
            Some(ChannelVoice::Note(NoteEvent {
                note: 60,
                velocity: 100,
                channel: 1,
                state: NoteState::On,
            })),
            parse(&[0x90, 60, 100])
        );
        assert_eq!(
            Some(ChannelVoice::Note(NoteEvent {
                note: 61,
                velocity: 1,
                channel: 16,
                state: NoteState::On,
            })),
            parse(&[0x9F, 61, 1])
        );
    }

    #[test]
    fn test_zero_velocity_note_on_is_note_off() {
        assert_eq!(
            Some(ChannelVoice::Note(NoteEvent {
                note: 60,
                velocity: 0,
                channel: 1,
                state: NoteState::Off,
            })),
            parse(&[0x90, 60, 0])
        );
    }

    #[test]
    fn test_note_off() {
        assert_eq!(
            Some(ChannelVoice::Note(NoteEvent {
                note: 40,
                velocity: 64,
                channel: 3,
                state: NoteState::Off,
            })),
            parse(&[0x82, 40, 64])
        );
    }

    #[test]
    fn test_control_change() {
        assert_eq!(
            Some(ChannelVoice::ControlChange(ControlChange {
                controller: 74,
                value: 12,
                channel: 10,
            })),
            parse(&[0xB9, 74, 12])
        );
    }

    #[test]
    fn test_ignored() {
        assert_eq!(None, parse(&[]));
        assert_eq!(None, parse(&[0x90, 60]));
        // Program change.
        assert_eq!(None, parse(&[0xC0, 1, 2]));
        // SysEx.
        assert_eq!(None, parse(&[0xF0, 0x7D, 0x0A, 0, 1, 0xF7]));
    }

    #[test]
    fn test_control_change_encoding() {
        assert_eq!(vec![0xB0, 74, 100], control_change(74, 100, 1));
        assert_eq!(vec![0xBF, 127, 0], control_change(200, -3, 40));
        assert_eq!(vec![0xB0, 0, 127], control_change(-1, 128, 0));
    }
}
