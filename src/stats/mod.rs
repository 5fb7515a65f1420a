// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-controller statistics over a recorded session.
//!
//! Everything is recomputed from the event log on each call.

use crate::session::{EventLog, CONSOLE_COUNT, CONTROLLER_SLOTS};

/// Values at or below this count as a fader at rest
pub const MOTION_THRESHOLD: u8 = 10;

/// Aggregate statistics of one controller
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerStats {
    /// Number of events
    pub count: usize,
    pub min: u8,
    pub max: u8,
    /// Arithmetic mean of values
    pub mean: f64,
    /// Quadratic mean (RMS) of values
    pub rms: f64,
    /// Population variance of values
    pub variance: f64,
    /// Seconds spent above [`MOTION_THRESHOLD`]: the interval from each such
    /// event to the controller's next event. The last event's interval runs
    /// to the end of the session, so a controller left above the threshold
    /// keeps accruing time after its final event.
    pub active_duration: f64,
    /// Events per second of session
    pub frequency: f64,
}

/// Statistics for every controller of every console.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    duration: f32,
    consoles: Vec<Vec<ControllerStats>>,
}

impl SessionStats {
    /// Session duration the statistics were computed for
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Statistics of one controller. Unrecorded controllers and
    /// out-of-range lookups give all-zero statistics.
    pub fn get(&self, console: u8, number: u8) -> ControllerStats {
        self.consoles
            .get(console as usize)
            .and_then(|c| c.get(number as usize))
            .copied()
            .unwrap_or_default()
    }

    /// Controllers with at least one event on `console`, ascending
    pub fn recorded(&self, console: u8) -> impl Iterator<Item = (u8, &ControllerStats)> + '_ {
        self.consoles
            .get(console as usize)
            .into_iter()
            .flat_map(|c| c.iter().enumerate())
            .filter(|(_, s)| s.count > 0)
            .map(|(n, s)| (n as u8, s))
    }
}

#[derive(Default, Clone, Copy)]
struct Accumulator {
    count: usize,
    min: u8,
    max: u8,
    sum: f64,
    sum_squares: f64,
    active: f64,
    /// Timestamp and value of the previous event
    previous: Option<(f32, u8)>,
}

impl Accumulator {
    fn push(&mut self, timestamp: f32, value: u8) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value as f64;
        self.sum_squares += (value as f64) * (value as f64);

        if let Some((t, v)) = self.previous {
            if v > MOTION_THRESHOLD {
                self.active += (timestamp - t).max(0.0) as f64;
            }
        }
        self.previous = Some((timestamp, value));
    }

    fn finish(mut self, duration: f32) -> ControllerStats {
        if self.count == 0 {
            return ControllerStats::default();
        }
        if let Some((t, v)) = self.previous {
            if v > MOTION_THRESHOLD {
                self.active += (duration - t).max(0.0) as f64;
            }
        }

        let n = self.count as f64;
        let mean = self.sum / n;
        let mean_square = self.sum_squares / n;
        let frequency = if duration > 0.0 { n / duration as f64 } else { 0.0 };

        ControllerStats {
            count: self.count,
            min: self.min,
            max: self.max,
            mean,
            rms: mean_square.sqrt(),
            // Clamp away tiny negative rounding error
            variance: (mean_square - mean * mean).max(0.0),
            active_duration: self.active,
            frequency,
        }
    }
}

/// Compute statistics for every controller in `log`.
pub fn compute(log: &EventLog, duration: f32) -> SessionStats {
    let duration = if duration.is_finite() { duration } else { 0.0 };
    let mut accumulators = vec![[Accumulator::default(); CONTROLLER_SLOTS]; CONSOLE_COUNT];

    for event in log.events() {
        if let Some(acc) = accumulators
            .get_mut(event.console as usize)
            .and_then(|c| c.get_mut(event.number as usize))
        {
            acc.push(event.timestamp, event.value);
        }
    }

    let consoles = accumulators
        .into_iter()
        .map(|console| console.into_iter().map(|acc| acc.finish(duration)).collect())
        .collect();

    SessionStats { duration, consoles }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ControllerEvent;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_zero_event_controller() {
        let stats = compute(&EventLog::new(), 10.0);
        let s = stats.get(0, 1);
        assert_eq!(s.count, 0);
        assert_eq!(s.min, 0);
        assert_eq!(s.max, 0);
        assert_eq!(s.mean, 0.0);
        assert_eq!(s.rms, 0.0);
        assert_eq!(s.variance, 0.0);
        assert_eq!(s.frequency, 0.0);
        assert_eq!(s.active_duration, 0.0);
        assert!(!s.mean.is_nan());
    }

    #[test]
    fn test_basic_aggregates() {
        let log = EventLog::from_events(vec![
            ControllerEvent::new(0.0, 0, 1, 1, 0),
            ControllerEvent::new(1.0, 0, 1, 1, 64),
            ControllerEvent::new(2.5, 0, 1, 1, 127),
        ]);
        let s = compute(&log, 3.0).get(0, 1);

        assert_eq!(s.count, 3);
        assert_eq!(s.min, 0);
        assert_eq!(s.max, 127);
        assert!(approx(s.mean, 191.0 / 3.0));
        let mean_square = (64.0f64 * 64.0 + 127.0 * 127.0) / 3.0;
        assert!(approx(s.rms, mean_square.sqrt()));
        assert!(approx(s.variance, mean_square - (191.0f64 / 3.0).powi(2)));
        assert!(approx(s.frequency, 1.0));
        // Above threshold from 1.0 to 2.5 and from 2.5 to the end at 3.0
        assert!(approx(s.active_duration, 2.0));
    }

    #[test]
    fn test_active_duration_includes_tail_to_session_end() {
        let log = EventLog::from_events(vec![
            ControllerEvent::new(2.0, 0, 1, 1, 100),
            ControllerEvent::new(1.0, 0, 1, 2, 100),
            ControllerEvent::new(4.0, 0, 1, 2, 0),
        ]);
        let stats = compute(&log, 10.0);

        // Held high after its only event
        assert!(approx(stats.get(0, 1).active_duration, 8.0));
        // Dropped to rest, so no tail
        assert!(approx(stats.get(0, 2).active_duration, 3.0));
    }

    #[test]
    fn test_consoles_are_separate() {
        let log = EventLog::from_events(vec![
            ControllerEvent::new(0.0, 0, 1, 1, 10),
            ControllerEvent::new(0.0, 1, 1, 1, 90),
        ]);
        let stats = compute(&log, 1.0);
        assert_eq!(stats.get(0, 1).max, 10);
        assert_eq!(stats.get(1, 1).max, 90);
        assert_eq!(stats.recorded(0).count(), 1);
        assert_eq!(stats.recorded(2).count(), 0);
    }

    #[test]
    fn test_non_positive_duration() {
        let log = EventLog::from_events(vec![ControllerEvent::new(0.0, 0, 1, 1, 50)]);
        let s = compute(&log, 0.0).get(0, 1);
        assert_eq!(s.frequency, 0.0);
        assert_eq!(s.active_duration, 0.0);
        assert_eq!(s.variance, 0.0);
    }

    #[test]
    fn test_out_of_range_lookup() {
        let stats = compute(&EventLog::new(), 1.0);
        assert_eq!(stats.get(9, 200), ControllerStats::default());
    }
}
