// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transport driven replay.
//!
//! Two ways to reach a new transport time:
//! - [`Scrubber::seek`] resends the full controller state at that time,
//!   whichever direction time moved.
//! - [`Scrubber::advance`] replays the individual events passed since the
//!   last tick. Only valid for small forward steps while playing.
//!
//! [`Scrubber::on_time_changed`] picks between them.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use super::{ControllerSink, TimeIndex};
use crate::session::EventLog;

/// Largest time step still treated as continuous playback. Assumes the
/// transport ticks about every millisecond; anything bigger is a jump.
pub const ADVANCE_WINDOW: f32 = 1.0;

/// Replay errors. None of them are fatal; the caller falls back to a seek.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScrubError {
    #[error("advance requires playback to be running")]
    NotPlaying,
    #[error("jump from {from:.3}s to {to:.3}s is too large for incremental replay")]
    JumpTooLarge { from: f32, to: f32 },
    #[error("time index does not match the event log")]
    StaleIndex,
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
}

/// Replays a loaded session against a [`ControllerSink`].
#[derive(Debug)]
pub struct Scrubber {
    log: Arc<EventLog>,
    index: TimeIndex,
    state: PlayState,
    /// Events already dispatched; the current event index is one less
    consumed: usize,
    previous_time: f32,
}

impl Scrubber {
    /// Pair a log with the index built from it.
    pub fn new(log: Arc<EventLog>, index: TimeIndex) -> Result<Self, ScrubError> {
        if !index.is_valid_for(&log) {
            return Err(ScrubError::StaleIndex);
        }
        Ok(Self {
            log,
            index,
            state: PlayState::Stopped,
            consumed: 0,
            previous_time: 0.0,
        })
    }

    /// Build the index and the scrubber in one go
    pub fn load(log: Arc<EventLog>, duration: f32) -> Self {
        let index = TimeIndex::build(&log, duration);
        Self {
            log,
            index,
            state: PlayState::Stopped,
            consumed: 0,
            previous_time: 0.0,
        }
    }

    pub fn log(&self) -> &Arc<EventLog> {
        &self.log
    }

    pub fn index(&self) -> &TimeIndex {
        &self.index
    }

    pub fn duration(&self) -> f32 {
        self.index.duration()
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayState::Playing
    }

    /// Index of the last dispatched event, -1 if none
    pub fn current_event_index(&self) -> i64 {
        self.consumed as i64 - 1
    }

    /// Time of the last seek or advance
    pub fn previous_time(&self) -> f32 {
        self.previous_time
    }

    /// Start playing from `time`, resynchronizing first.
    pub fn play(&mut self, time: f32, sink: &mut impl ControllerSink) -> usize {
        self.state = PlayState::Playing;
        self.seek(time, sink)
    }

    /// Stop playing. The event pointer resets so the next start resyncs.
    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.consumed = 0;
    }

    /// Resend every recorded controller value as of `time`.
    ///
    /// Returns the number of dispatched messages.
    pub fn seek(&mut self, time: f32, sink: &mut impl ControllerSink) -> usize {
        let time = self.index.clamp_time(time);
        let (snapshot, consumed) = self.index.snapshot_at(&self.log, time);

        let mut sent = 0;
        for (console, values) in snapshot.iter().enumerate() {
            for (number, value) in values.iter().enumerate() {
                if let Some(value) = value {
                    sink.send_message(console as u8, number as u8, *value);
                    sent += 1;
                }
            }
        }

        debug!(time, sent, event = consumed as i64 - 1, "seek");
        self.consumed = consumed;
        self.previous_time = time;
        sent
    }

    /// Replay, in log order, every event between the last position and
    /// `time`. Intermediate values are dispatched, not collapsed.
    pub fn advance(&mut self, time: f32, sink: &mut impl ControllerSink) -> Result<usize, ScrubError> {
        if self.state != PlayState::Playing {
            return Err(ScrubError::NotPlaying);
        }
        let time = self.index.clamp_time(time);
        if (time - self.previous_time).abs() >= ADVANCE_WINDOW {
            return Err(ScrubError::JumpTooLarge {
                from: self.previous_time,
                to: time,
            });
        }

        let target = self.index.consumed_at(&self.log, time);
        let mut sent = 0;
        if target > self.consumed {
            for event in &self.log.events()[self.consumed..target] {
                sink.send_message(event.console, event.number, event.value);
            }
            sent = target - self.consumed;
            trace!(time, sent, "advance");
            self.consumed = target;
        }
        self.previous_time = time;
        Ok(sent)
    }

    /// React to a transport time change: small forward steps while playing
    /// replay incrementally, everything else resyncs.
    pub fn on_time_changed(&mut self, time: f32, sink: &mut impl ControllerSink) -> usize {
        let forward = time >= self.previous_time;
        if self.is_playing() && forward {
            if let Ok(sent) = self.advance(time, sink) {
                return sent;
            }
        }
        self.seek(time, sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ControllerEvent;
    use crate::timeline::RecordingSink;

    fn scenario() -> Scrubber {
        let log = EventLog::from_events(vec![
            ControllerEvent::new(0.0, 0, 1, 1, 0),
            ControllerEvent::new(1.0, 0, 1, 1, 64),
            ControllerEvent::new(2.5, 0, 1, 1, 127),
        ]);
        Scrubber::load(Arc::new(log), 3.0)
    }

    #[test]
    fn test_seek_scenario() {
        let mut scrubber = scenario();
        let mut sink = RecordingSink::new();
        assert_eq!(scrubber.current_event_index(), -1);

        scrubber.seek(1.2, &mut sink);
        assert_eq!(sink.value(0, 1), Some(64));
        assert_eq!(scrubber.current_event_index(), 1);

        scrubber.seek(0.5, &mut sink);
        assert_eq!(sink.value(0, 1), Some(0));
        assert_eq!(scrubber.current_event_index(), 0);

        scrubber.seek(2.6, &mut sink);
        assert_eq!(sink.value(0, 1), Some(127));
        assert_eq!(scrubber.current_event_index(), 2);
    }

    #[test]
    fn test_seek_only_sends_recorded_controllers() {
        let mut scrubber = scenario();
        let mut sink = RecordingSink::new();
        assert_eq!(scrubber.seek(1.5, &mut sink), 1);
        assert_eq!(sink.messages, vec![(0, 1, 64)]);
    }

    #[test]
    fn test_advance_replays_every_intermediate_event() {
        let log = EventLog::from_events(vec![
            ControllerEvent::new(0.10, 0, 1, 5, 10),
            ControllerEvent::new(0.15, 0, 1, 5, 20),
            ControllerEvent::new(0.20, 0, 1, 5, 30),
            ControllerEvent::new(0.25, 1, 1, 9, 99),
        ]);
        let mut scrubber = Scrubber::load(Arc::new(log), 1.0);
        let mut sink = RecordingSink::new();

        scrubber.play(0.0, &mut sink);
        assert!(sink.messages.is_empty());

        assert_eq!(scrubber.advance(0.3, &mut sink), Ok(4));
        assert_eq!(
            sink.messages,
            vec![(0, 5, 10), (0, 5, 20), (0, 5, 30), (1, 9, 99)]
        );
        assert_eq!(scrubber.current_event_index(), 3);
    }

    #[test]
    fn test_advance_requires_playing() {
        let mut scrubber = scenario();
        let mut sink = RecordingSink::new();
        assert_eq!(scrubber.advance(0.1, &mut sink), Err(ScrubError::NotPlaying));
    }

    #[test]
    fn test_advance_rejects_large_jump() {
        let mut scrubber = scenario();
        let mut sink = RecordingSink::new();
        scrubber.play(0.0, &mut sink);
        assert!(matches!(
            scrubber.advance(1.5, &mut sink),
            Err(ScrubError::JumpTooLarge { .. })
        ));
    }

    #[test]
    fn test_on_time_changed_routes_backward_to_seek() {
        let mut scrubber = scenario();
        let mut sink = RecordingSink::new();
        scrubber.play(2.7, &mut sink);
        sink.messages.clear();

        scrubber.on_time_changed(2.2, &mut sink);
        assert_eq!(sink.messages, vec![(0, 1, 64)]);
        assert_eq!(scrubber.current_event_index(), 1);
    }

    #[test]
    fn test_on_time_changed_routes_large_jump_to_seek() {
        let mut scrubber = scenario();
        let mut sink = RecordingSink::new();
        scrubber.play(0.0, &mut sink);
        sink.messages.clear();

        scrubber.on_time_changed(2.9, &mut sink);
        // A seek sends the final value only, not the history
        assert_eq!(sink.messages, vec![(0, 1, 127)]);
    }

    #[test]
    fn test_stop_resets_event_index() {
        let mut scrubber = scenario();
        let mut sink = RecordingSink::new();
        scrubber.play(2.0, &mut sink);
        assert_eq!(scrubber.current_event_index(), 1);

        scrubber.stop();
        assert_eq!(scrubber.current_event_index(), -1);
        assert_eq!(scrubber.state(), PlayState::Stopped);
    }

    #[test]
    fn test_stale_index_rejected() {
        let mut log = EventLog::from_events(vec![ControllerEvent::new(0.0, 0, 1, 1, 0)]);
        let index = TimeIndex::build(&log, 1.0);
        log.append(ControllerEvent::new(0.5, 0, 1, 1, 5));
        assert!(matches!(
            Scrubber::new(Arc::new(log), index),
            Err(ScrubError::StaleIndex)
        ));
    }
}
