// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Output value-range correction.
//!
//! Some consoles only respond to part of the 0-127 range (a fader whose
//! travel ends at 100, say). A [`ValueRange`] linearly maps recorded values
//! onto the console's usable range.

use serde::{Deserialize, Serialize};

/// Usable value range of a console, inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u8; 2]", into = "[u8; 2]")]
pub struct ValueRange {
    min: u8,
    max: u8,
}

impl ValueRange {
    /// Bounds are clamped to 0-127 and swapped if reversed.
    pub fn new(min: u8, max: u8) -> Self {
        let (a, b) = (min.min(127), max.min(127));
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    pub fn is_identity(&self) -> bool {
        self.min == 0 && self.max == 127
    }

    /// Map a 0-127 value into the range. Monotonic, never leaves 0-127.
    pub fn correct(&self, value: u8) -> u8 {
        let value = value.min(127) as u32;
        let span = (self.max - self.min) as u32;
        // Integer rounding keeps the mapping monotonic
        let scaled = (value * span + 63) / 127;
        self.min + scaled as u8
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self { min: 0, max: 127 }
    }
}

impl From<[u8; 2]> for ValueRange {
    fn from([min, max]: [u8; 2]) -> Self {
        Self::new(min, max)
    }
}

impl From<ValueRange> for [u8; 2] {
    fn from(range: ValueRange) -> Self {
        [range.min, range.max]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let range = ValueRange::default();
        assert!(range.is_identity());
        for v in 0..=127u8 {
            assert_eq!(range.correct(v), v);
        }
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let ranges = [
            ValueRange::new(0, 127),
            ValueRange::new(0, 100),
            ValueRange::new(20, 90),
            ValueRange::new(64, 64),
            ValueRange::new(127, 0),
            ValueRange::new(200, 255),
        ];
        for range in ranges {
            let mut previous = 0u8;
            for v in 0..=127u8 {
                let corrected = range.correct(v);
                assert!(corrected <= 127);
                assert!(corrected >= previous, "{:?} not monotonic at {}", range, v);
                previous = corrected;
            }
            assert_eq!(range.correct(0), range.min());
            assert_eq!(range.correct(127), range.max());
        }
    }

    #[test]
    fn test_out_of_range_input_clamped() {
        assert_eq!(ValueRange::new(10, 20).correct(255), 20);
    }

    #[test]
    fn test_reversed_bounds_swapped() {
        let range = ValueRange::new(90, 10);
        assert_eq!(range.min(), 10);
        assert_eq!(range.max(), 90);
    }
}
