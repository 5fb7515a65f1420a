// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI I/O abstraction layer.
//!
//! This module provides the raw Control Change codec and a trait-based
//! abstraction for MIDI output, so the router can talk to midir ports in
//! production and to in-memory mocks in tests.

pub mod input;
pub mod output;

use thiserror::Error;

pub use input::{list_sources, print_sources, SourceConnection, SourceSelection};
pub use output::{list_destinations, print_destinations, MidirOutput};

/// Errors raised by the device layer.
///
/// These never escape the core: callers log them and carry on.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("MIDI source {index} not found ({available} available)")]
    InvalidSource { index: usize, available: usize },
    #[error("MIDI destination {index} not found ({available} available)")]
    InvalidDestination { index: usize, available: usize },
    #[error("MIDI backend error: {0}")]
    Backend(String),
}

/// Trait for MIDI output implementations.
///
/// Sending is fire-and-forget: implementations must not block waiting on the
/// device, and callers never retry a failed send.
pub trait MidiOutput: Send {
    /// Send a raw MIDI message immediately.
    fn send(&mut self, message: &[u8]) -> Result<(), DeviceError>;

    /// Human readable port name, for logging.
    fn name(&self) -> &str {
        "output"
    }
}

/// MIDI message constants
pub mod messages {
    /// Control Change status nibble (lower nibble is channel 0-15)
    pub const CONTROL_CHANGE: u8 = 0xB0;
    /// Mask selecting the message type nibble
    pub const STATUS_MASK: u8 = 0xF0;
    /// Mask selecting the channel nibble
    pub const CHANNEL_MASK: u8 = 0x0F;
    /// Highest valid 7-bit data byte
    pub const DATA_MAX: u8 = 0x7F;
}

/// A decoded Control Change message.
///
/// `channel` is 1-16 and `number` is the controller number 1-128, which is
/// the wire controller byte plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlChange {
    pub channel: u8,
    pub number: u8,
    pub value: u8,
}

impl ControlChange {
    /// Decode a raw 3-byte message. Anything that is not a well formed
    /// Control Change yields `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let &[status, controller, value] = data else {
            return None;
        };

        if status & messages::STATUS_MASK != messages::CONTROL_CHANGE {
            return None;
        }
        if controller > messages::DATA_MAX || value > messages::DATA_MAX {
            return None;
        }

        Some(Self {
            channel: (status & messages::CHANNEL_MASK) + 1,
            number: controller + 1,
            value,
        })
    }

    /// Encode as raw bytes. A channel of 0 ("any") is sent on channel 1.
    pub fn to_bytes(&self) -> [u8; 3] {
        let channel = self.channel.saturating_sub(1) & messages::CHANNEL_MASK;
        [
            messages::CONTROL_CHANGE | channel,
            self.number.saturating_sub(1) & messages::DATA_MAX,
            self.value & messages::DATA_MAX,
        ]
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockMidiOutput;
    use super::*;

    #[test]
    fn test_mock_midi_output_send() {
        let mut output = MockMidiOutput::new();

        output.send(&[messages::CONTROL_CHANGE, 7, 127]).unwrap();

        let messages = output.get_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], vec![0xB0, 7, 127]);
    }

    #[test]
    fn test_parse_control_change() {
        let cc = ControlChange::parse(&[0xB3, 0, 64]).unwrap();
        assert_eq!(cc.channel, 4);
        assert_eq!(cc.number, 1);
        assert_eq!(cc.value, 64);

        let cc = ControlChange::parse(&[0xBF, 127, 0]).unwrap();
        assert_eq!(cc.channel, 16);
        assert_eq!(cc.number, 128);
    }

    #[test]
    fn test_parse_rejects_other_messages() {
        // Note On
        assert_eq!(ControlChange::parse(&[0x90, 60, 100]), None);
        // Program Change
        assert_eq!(ControlChange::parse(&[0xC0, 5]), None);
        // Clock
        assert_eq!(ControlChange::parse(&[0xF8]), None);
    }

    #[test]
    fn test_parse_rejects_malformed_bytes() {
        assert_eq!(ControlChange::parse(&[]), None);
        assert_eq!(ControlChange::parse(&[0xB0, 1]), None);
        assert_eq!(ControlChange::parse(&[0xB0, 1, 2, 3]), None);
        assert_eq!(ControlChange::parse(&[0xB0, 0x80, 2]), None);
        assert_eq!(ControlChange::parse(&[0xB0, 1, 0xFF]), None);
    }

    #[test]
    fn test_encode_round_trip() {
        let cc = ControlChange {
            channel: 10,
            number: 33,
            value: 99,
        };
        assert_eq!(cc.to_bytes(), [0xB9, 32, 99]);
        assert_eq!(ControlChange::parse(&cc.to_bytes()), Some(cc));
    }

    #[test]
    fn test_encode_any_channel() {
        let cc = ControlChange {
            channel: 0,
            number: 1,
            value: 5,
        };
        assert_eq!(cc.to_bytes(), [0xB0, 0, 5]);
    }
}
