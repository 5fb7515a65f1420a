// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Bucketed time index over an event log.
//!
//! The session is cut into `max(1, floor(duration * PRECISION))` buckets.
//! Bucket `n` starts at `n * duration / count` and stores the number of
//! events with timestamp <= that boundary plus the full per-console value
//! snapshot after those events.

use tracing::{debug, info};

use crate::session::{ControllerEvent, EventLog, CONSOLE_COUNT, CONTROLLER_SLOTS};

/// Buckets per second (100ms resolution)
pub const PRECISION: f32 = 10.0;

/// Last known value of every controller on every console. `None` means the
/// controller has not been recorded yet.
pub type Snapshot = [[Option<u8>; CONTROLLER_SLOTS]; CONSOLE_COUNT];

const EMPTY_SNAPSHOT: Snapshot = [[None; CONTROLLER_SLOTS]; CONSOLE_COUNT];

#[derive(Debug, Clone)]
struct Bucket {
    boundary: f32,
    /// Events consumed up to and including the boundary
    consumed: usize,
    snapshot: Box<Snapshot>,
}

/// Lookup table from time to controller state.
#[derive(Debug, Clone)]
pub struct TimeIndex {
    duration: f32,
    buckets: Vec<Bucket>,
    generation: u64,
    event_count: usize,
}

/// Number of buckets for a session of `duration` seconds
pub fn bucket_count(duration: f32) -> usize {
    if !duration.is_finite() || duration <= 0.0 {
        return 1;
    }
    ((duration * PRECISION).floor() as usize).max(1)
}

fn apply(snapshot: &mut Snapshot, event: &ControllerEvent) {
    if let Some(slot) = snapshot
        .get_mut(event.console as usize)
        .and_then(|c| c.get_mut(event.number as usize))
    {
        *slot = Some(event.value);
    }
}

impl TimeIndex {
    /// Build the index for `log` in one forward pass.
    ///
    /// A non-positive duration or an empty log yields a single bucket with
    /// empty snapshots.
    pub fn build(log: &EventLog, duration: f32) -> Self {
        let events = log.events();
        let degenerate = log.is_empty() || !duration.is_finite() || duration <= 0.0;

        if degenerate {
            debug!(duration, events = events.len(), "building degenerate time index");
            return Self {
                duration: if duration.is_finite() { duration.max(0.0) } else { 0.0 },
                buckets: vec![Bucket {
                    boundary: 0.0,
                    consumed: 0,
                    snapshot: Box::new(EMPTY_SNAPSHOT),
                }],
                generation: log.generation(),
                event_count: events.len(),
            };
        }

        let count = bucket_count(duration);
        let mut buckets = Vec::with_capacity(count);
        let mut snapshot = EMPTY_SNAPSHOT;
        let mut cursor = 0;

        for n in 0..count {
            let boundary = n as f32 * duration / count as f32;
            while let Some(event) = events.get(cursor) {
                if event.timestamp > boundary {
                    break;
                }
                apply(&mut snapshot, event);
                cursor += 1;
            }
            buckets.push(Bucket {
                boundary,
                consumed: cursor,
                snapshot: Box::new(snapshot),
            });
        }

        info!(buckets = count, events = events.len(), duration, "time index built");
        Self {
            duration,
            buckets,
            generation: log.generation(),
            event_count: events.len(),
        }
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Whether this index was built from exactly this version of `log`
    pub fn is_valid_for(&self, log: &EventLog) -> bool {
        self.generation == log.generation() && self.event_count == log.len()
    }

    /// Clamp a transport time into the session
    pub fn clamp_time(&self, time: f32) -> f32 {
        if time.is_nan() {
            return 0.0;
        }
        time.clamp(0.0, self.duration)
    }

    /// Bucket holding `time`: `clamp(floor(time * count / duration))`,
    /// stepped back if float rounding put its boundary past `time`.
    pub fn bucket_for(&self, time: f32) -> usize {
        let last = self.buckets.len() - 1;
        if self.duration <= 0.0 {
            return 0;
        }
        let time = self.clamp_time(time);
        let raw = (time * self.buckets.len() as f32 / self.duration).floor();
        let mut bucket = if raw <= 0.0 { 0 } else { (raw as usize).min(last) };
        while bucket > 0 && self.buckets[bucket].boundary > time {
            bucket -= 1;
        }
        bucket
    }

    /// Start time of a bucket
    pub fn boundary(&self, bucket: usize) -> Option<f32> {
        self.buckets.get(bucket).map(|b| b.boundary)
    }

    /// Snapshot stored at a bucket boundary
    pub fn bucket_snapshot(&self, bucket: usize) -> Option<&Snapshot> {
        self.buckets.get(bucket).map(|b| b.snapshot.as_ref())
    }

    /// Events consumed at a bucket boundary
    pub fn bucket_consumed(&self, bucket: usize) -> Option<usize> {
        self.buckets.get(bucket).map(|b| b.consumed)
    }

    /// Number of events with timestamp <= `time`.
    ///
    /// Starts from the bucket pointer and walks at most one bucket's worth
    /// of events forward.
    pub fn consumed_at(&self, log: &EventLog, time: f32) -> usize {
        let time = self.clamp_time(time);
        let bucket = &self.buckets[self.bucket_for(time)];
        let events = log.events();
        let mut cursor = bucket.consumed;
        while cursor < events.len() && events[cursor].timestamp <= time {
            cursor += 1;
        }
        cursor
    }

    /// Controller state at `time` and the number of events it reflects.
    pub fn snapshot_at(&self, log: &EventLog, time: f32) -> (Snapshot, usize) {
        let time = self.clamp_time(time);
        let bucket = &self.buckets[self.bucket_for(time)];
        let events = log.events();
        let mut snapshot = *bucket.snapshot;
        let mut cursor = bucket.consumed;
        while cursor < events.len() && events[cursor].timestamp <= time {
            apply(&mut snapshot, &events[cursor]);
            cursor += 1;
        }
        (snapshot, cursor)
    }
}
