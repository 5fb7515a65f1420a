// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Time-indexed replay of a recorded session.
//!
//! [`TimeIndex`] is built once per loaded session and answers "what was
//! every controller's value at time t" without rescanning the log.
//! [`Scrubber`] turns transport time changes into dispatches: a full
//! resync on seeks, incremental replay while playing.

pub mod index;
pub mod scrubber;

pub use index::{Snapshot, TimeIndex, PRECISION};
pub use scrubber::{PlayState, ScrubError, Scrubber, ADVANCE_WINDOW};

/// Receiver of replayed controller values.
pub trait ControllerSink {
    fn send_message(&mut self, console: u8, number: u8, value: u8);
}

/// Sink that records every dispatch, for inspection and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingSink {
    pub messages: Vec<(u8, u8, u8)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest value dispatched for a controller
    pub fn value(&self, console: u8, number: u8) -> Option<u8> {
        self.messages
            .iter()
            .rev()
            .find(|(c, n, _)| *c == console && *n == number)
            .map(|(_, _, v)| *v)
    }
}

impl ControllerSink for RecordingSink {
    fn send_message(&mut self, console: u8, number: u8, value: u8) {
        self.messages.push((console, number, value));
    }
}
