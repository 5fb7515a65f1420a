// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transport position clock.
//!
//! Holds the single "current time" of the session. While running the
//! position is derived from a monotonic `Instant` so tick jitter never
//! accumulates into drift.

use std::time::Instant;

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running,
    Paused,
}

/// Session time in seconds, clamped to `[0, duration]`
#[derive(Debug, Clone)]
pub struct TransportClock {
    state: ClockState,
    duration: f32,
    /// Position when the clock was last started or moved
    base: f32,
    /// When the clock was last started, while running
    started_at: Option<Instant>,
}

impl TransportClock {
    pub fn new(duration: f32) -> Self {
        Self {
            state: ClockState::Stopped,
            duration: if duration.is_finite() { duration.max(0.0) } else { 0.0 },
            base: 0.0,
            started_at: None,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// Current position
    pub fn position(&self, now: Instant) -> f32 {
        let position = match (self.state, self.started_at) {
            (ClockState::Running, Some(start)) => {
                self.base + now.saturating_duration_since(start).as_secs_f32()
            }
            _ => self.base,
        };
        position.clamp(0.0, self.duration)
    }

    /// Whether a running clock has reached the end of the session
    pub fn is_finished(&self, now: Instant) -> bool {
        self.is_running() && self.position(now) >= self.duration
    }

    /// Start or resume. Starting at the end rewinds first.
    pub fn play(&mut self, now: Instant) {
        if self.is_running() {
            return;
        }
        if self.base >= self.duration {
            self.base = 0.0;
        }
        self.started_at = Some(now);
        self.state = ClockState::Running;
    }

    /// Freeze at the current position
    pub fn pause(&mut self, now: Instant) {
        if self.is_running() {
            self.base = self.position(now);
            self.started_at = None;
            self.state = ClockState::Paused;
        }
    }

    /// Stop and rewind to the start
    pub fn stop(&mut self) {
        self.base = 0.0;
        self.started_at = None;
        self.state = ClockState::Stopped;
    }

    /// Move to `time` (clamped), keeping the running state
    pub fn seek(&mut self, time: f32, now: Instant) {
        self.base = if time.is_nan() { 0.0 } else { time.clamp(0.0, self.duration) };
        if self.is_running() {
            self.started_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_clock_runs_from_instant() {
        let mut clock = TransportClock::new(10.0);
        let t0 = Instant::now();
        assert_eq!(clock.position(t0), 0.0);

        clock.play(t0);
        assert!(clock.is_running());
        let p = clock.position(t0 + Duration::from_millis(1500));
        assert!((p - 1.5).abs() < 1e-3);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut clock = TransportClock::new(10.0);
        let t0 = Instant::now();
        clock.play(t0);
        clock.pause(t0 + Duration::from_secs(2));
        assert_eq!(clock.state(), ClockState::Paused);

        // Paused time does not advance
        let p = clock.position(t0 + Duration::from_secs(5));
        assert!((p - 2.0).abs() < 1e-3);

        clock.play(t0 + Duration::from_secs(5));
        let p = clock.position(t0 + Duration::from_secs(6));
        assert!((p - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_seek_clamps() {
        let mut clock = TransportClock::new(4.0);
        let t0 = Instant::now();
        clock.seek(9.0, t0);
        assert_eq!(clock.position(t0), 4.0);
        clock.seek(-1.0, t0);
        assert_eq!(clock.position(t0), 0.0);
    }

    #[test]
    fn test_finishes_at_end() {
        let mut clock = TransportClock::new(1.0);
        let t0 = Instant::now();
        clock.play(t0);
        assert!(!clock.is_finished(t0 + Duration::from_millis(500)));
        assert!(clock.is_finished(t0 + Duration::from_secs(2)));
        assert_eq!(clock.position(t0 + Duration::from_secs(2)), 1.0);
    }

    #[test]
    fn test_stop_rewinds() {
        let mut clock = TransportClock::new(10.0);
        let t0 = Instant::now();
        clock.play(t0);
        clock.stop();
        assert_eq!(clock.state(), ClockState::Stopped);
        assert_eq!(clock.position(t0 + Duration::from_secs(3)), 0.0);
    }
}
