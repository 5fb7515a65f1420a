// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Controller events and the append-only event log.

use serde::{Deserialize, Serialize};

/// Number of independent consoles (A, B, C)
pub const CONSOLE_COUNT: usize = 3;

/// Highest controller number. Arrays indexed by controller number have
/// `CONTROLLER_SLOTS` entries with index 0 unused.
pub const MAX_CONTROLLER: u8 = 128;

/// Size of per-controller arrays (index 0 unused)
pub const CONTROLLER_SLOTS: usize = MAX_CONTROLLER as usize + 1;

/// Display name of a console index
pub fn console_name(console: u8) -> char {
    match console {
        0 => 'A',
        1 => 'B',
        2 => 'C',
        _ => '?',
    }
}

/// A single captured controller movement.
///
/// Serialized as a `(timestamp, console, channel, number, value)` tuple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "EventTuple", into = "EventTuple")]
pub struct ControllerEvent {
    /// Seconds since the start of the session
    pub timestamp: f32,
    /// Console index (0-2)
    pub console: u8,
    /// MIDI channel (1-16, 0 = any)
    pub channel: u8,
    /// Controller number (1-128)
    pub number: u8,
    /// Controller value (0-127)
    pub value: u8,
}

type EventTuple = (f32, u8, u8, u8, u8);

impl From<EventTuple> for ControllerEvent {
    fn from((timestamp, console, channel, number, value): EventTuple) -> Self {
        Self {
            timestamp,
            console,
            channel,
            number,
            value,
        }
    }
}

impl From<ControllerEvent> for EventTuple {
    fn from(e: ControllerEvent) -> Self {
        (e.timestamp, e.console, e.channel, e.number, e.value)
    }
}

impl ControllerEvent {
    /// Create an event, clamping every field into its valid range.
    pub fn new(timestamp: f32, console: u8, channel: u8, number: u8, value: u8) -> Self {
        Self {
            timestamp: if timestamp.is_finite() { timestamp.max(0.0) } else { 0.0 },
            console: console.min(CONSOLE_COUNT as u8 - 1),
            channel: channel.min(16),
            number: number.clamp(1, MAX_CONTROLLER),
            value: value.min(127),
        }
    }

    /// Whether every field is inside its valid range
    pub fn is_valid(&self) -> bool {
        self.timestamp.is_finite()
            && self.timestamp >= 0.0
            && (self.console as usize) < CONSOLE_COUNT
            && self.channel <= 16
            && (1..=MAX_CONTROLLER).contains(&self.number)
            && self.value <= 127
    }
}

/// Chronologically ordered, append-only list of controller events.
///
/// Every append bumps the generation counter, which is how a
/// [`TimeIndex`](crate::timeline::TimeIndex) knows whether it still
/// describes this log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    events: Vec<ControllerEvent>,
    generation: u64,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from events that may be out of order.
    ///
    /// Events are stably sorted by timestamp so equal timestamps keep their
    /// original order; invalid events are dropped.
    pub fn from_events(mut events: Vec<ControllerEvent>) -> Self {
        events.retain(ControllerEvent::is_valid);
        events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self {
            events,
            generation: 1,
        }
    }

    /// Append an event.
    ///
    /// A timestamp earlier than the last one is raised to it so the log
    /// stays non-decreasing.
    pub fn append(&mut self, mut event: ControllerEvent) {
        if let Some(last) = self.events.last() {
            if event.timestamp < last.timestamp {
                event.timestamp = last.timestamp;
            }
        }
        self.events.push(event);
        self.generation += 1;
    }

    /// Remove every event
    pub fn clear(&mut self) {
        self.events.clear();
        self.generation += 1;
    }

    pub fn events(&self) -> &[ControllerEvent] {
        &self.events
    }

    pub fn get(&self, index: usize) -> Option<&ControllerEvent> {
        self.events.get(index)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Mutation counter
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Timestamp of the last event, or 0 for an empty log
    pub fn last_timestamp(&self) -> f32 {
        self.events.last().map(|e| e.timestamp).unwrap_or(0.0)
    }

    /// Iterate over the events of one controller on one console
    pub fn controller(&self, console: u8, number: u8) -> impl Iterator<Item = &ControllerEvent> {
        self.events
            .iter()
            .filter(move |e| e.console == console && e.number == number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order() {
        let mut log = EventLog::new();
        log.append(ControllerEvent::new(1.0, 0, 1, 1, 10));
        log.append(ControllerEvent::new(0.5, 0, 1, 1, 20));

        assert_eq!(log.len(), 2);
        assert_eq!(log.events()[1].timestamp, 1.0);
        assert_eq!(log.events()[1].value, 20);
    }

    #[test]
    fn test_generation_changes_on_mutation() {
        let mut log = EventLog::new();
        let g0 = log.generation();
        log.append(ControllerEvent::new(0.0, 0, 1, 1, 10));
        assert!(log.generation() > g0);

        let g1 = log.generation();
        log.clear();
        assert!(log.generation() > g1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_from_events_sorts_stably() {
        let log = EventLog::from_events(vec![
            ControllerEvent::new(2.0, 0, 1, 1, 1),
            ControllerEvent::new(1.0, 0, 1, 1, 2),
            ControllerEvent::new(1.0, 0, 1, 1, 3),
        ]);

        let values: Vec<u8> = log.events().iter().map(|e| e.value).collect();
        assert_eq!(values, vec![2, 3, 1]);
    }

    #[test]
    fn test_from_events_drops_invalid() {
        let bad = ControllerEvent {
            timestamp: 0.0,
            console: 7,
            channel: 1,
            number: 1,
            value: 0,
        };
        let log = EventLog::from_events(vec![bad, ControllerEvent::new(0.0, 0, 1, 1, 0)]);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_new_clamps_fields() {
        let e = ControllerEvent::new(-1.0, 9, 20, 0, 200);
        assert!(e.is_valid());
        assert_eq!(e.timestamp, 0.0);
        assert_eq!(e.console, 2);
        assert_eq!(e.channel, 16);
        assert_eq!(e.number, 1);
        assert_eq!(e.value, 127);
    }

    #[test]
    fn test_controller_filter_iter() {
        let log = EventLog::from_events(vec![
            ControllerEvent::new(0.0, 0, 1, 1, 1),
            ControllerEvent::new(0.1, 1, 1, 1, 2),
            ControllerEvent::new(0.2, 0, 1, 2, 3),
            ControllerEvent::new(0.3, 0, 1, 1, 4),
        ]);
        let values: Vec<u8> = log.controller(0, 1).map(|e| e.value).collect();
        assert_eq!(values, vec![1, 4]);
    }

    #[test]
    fn test_console_names() {
        assert_eq!(console_name(0), 'A');
        assert_eq!(console_name(2), 'C');
    }
}
