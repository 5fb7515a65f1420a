// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Controller number masks and their compact range-string form.
//!
//! A mask is edited by users as a string such as `"1-25 40"`. Converting a
//! mask to a string always produces the canonical form: ascending, minimal
//! ranges, single spaces.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::session::{CONTROLLER_SLOTS, MAX_CONTROLLER};

/// Errors from parsing a range string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterParseError {
    #[error("'{0}' is not a controller number")]
    NotANumber(String),
    #[error("controller {0} is outside 1-128")]
    OutOfRange(u32),
    #[error("range {0}-{1} is reversed")]
    Reversed(u8, u8),
}

/// Boolean mask over controller numbers 1-128 (index 0 unused).
#[derive(Clone, PartialEq, Eq)]
pub struct ControllerFilter {
    mask: [bool; CONTROLLER_SLOTS],
}

impl ControllerFilter {
    /// A mask with nothing enabled
    pub fn empty() -> Self {
        Self {
            mask: [false; CONTROLLER_SLOTS],
        }
    }

    /// A mask with every controller enabled
    pub fn all() -> Self {
        let mut filter = Self::empty();
        for number in 1..=MAX_CONTROLLER {
            filter.set(number, true);
        }
        filter
    }

    /// Build from a raw mask. Index 0 is ignored.
    pub fn from_mask(mut mask: [bool; CONTROLLER_SLOTS]) -> Self {
        mask[0] = false;
        Self { mask }
    }

    /// Build from a list of controller numbers; out of range numbers are
    /// ignored.
    pub fn from_numbers(numbers: impl IntoIterator<Item = u8>) -> Self {
        let mut filter = Self::empty();
        for number in numbers {
            filter.set(number, true);
        }
        filter
    }

    /// The raw mask
    pub fn mask(&self) -> &[bool; CONTROLLER_SLOTS] {
        &self.mask
    }

    pub fn contains(&self, number: u8) -> bool {
        self.mask.get(number as usize).copied().unwrap_or(false) && number != 0
    }

    /// Enable or disable one controller. Number 0 and numbers above 128 are
    /// ignored.
    pub fn set(&mut self, number: u8, enabled: bool) {
        if (1..=MAX_CONTROLLER).contains(&number) {
            self.mask[number as usize] = enabled;
        }
    }

    pub fn clear(&mut self) {
        self.mask = [false; CONTROLLER_SLOTS];
    }

    pub fn is_empty(&self) -> bool {
        self.mask.iter().all(|enabled| !enabled)
    }

    /// Number of enabled controllers
    pub fn count(&self) -> usize {
        self.mask.iter().filter(|enabled| **enabled).count()
    }

    /// Enabled controller numbers in ascending order
    pub fn numbers(&self) -> impl Iterator<Item = u8> + '_ {
        (1..=MAX_CONTROLLER).filter(move |n| self.mask[*n as usize])
    }

    /// Parse a range string such as `"1-3 5 7-9"`.
    ///
    /// Tokens are separated by whitespace or commas. Overlapping and
    /// unordered tokens are accepted.
    pub fn parse(text: &str) -> Result<Self, FilterParseError> {
        let mut filter = Self::empty();

        for token in text.split(|c: char| c.is_whitespace() || c == ',') {
            if token.is_empty() {
                continue;
            }

            let (start, end) = match token.split_once('-') {
                Some((a, b)) => (parse_number(a)?, parse_number(b)?),
                None => {
                    let n = parse_number(token)?;
                    (n, n)
                }
            };

            if start > end {
                return Err(FilterParseError::Reversed(start, end));
            }
            for number in start..=end {
                filter.set(number, true);
            }
        }

        Ok(filter)
    }

    /// Canonical compact form, e.g. `"1-3 5 7-9"`. An empty mask gives an
    /// empty string.
    pub fn to_range_string(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut number = 1usize;

        while number < CONTROLLER_SLOTS {
            if !self.mask[number] {
                number += 1;
                continue;
            }
            let start = number;
            while number + 1 < CONTROLLER_SLOTS && self.mask[number + 1] {
                number += 1;
            }
            if start == number {
                parts.push(start.to_string());
            } else {
                parts.push(format!("{}-{}", start, number));
            }
            number += 1;
        }

        parts.join(" ")
    }
}

fn parse_number(text: &str) -> Result<u8, FilterParseError> {
    let value: u32 = text
        .trim()
        .parse()
        .map_err(|_| FilterParseError::NotANumber(text.to_string()))?;
    if value == 0 || value > MAX_CONTROLLER as u32 {
        return Err(FilterParseError::OutOfRange(value));
    }
    Ok(value as u8)
}

impl Default for ControllerFilter {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ControllerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ControllerFilter({:?})", self.to_range_string())
    }
}

impl fmt::Display for ControllerFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_range_string())
    }
}

impl FromStr for ControllerFilter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_compact_canonical_form() {
        let filter = ControllerFilter::from_numbers([1, 2, 3, 5, 7, 8, 9]);
        assert_eq!(filter.to_range_string(), "1-3 5 7-9");
    }

    #[test]
    fn test_parse_round_trip_mask() {
        let filter = ControllerFilter::from_numbers([1, 2, 3, 5, 7, 8, 9]);
        let reparsed = ControllerFilter::parse(&filter.to_range_string()).unwrap();
        assert_eq!(reparsed.mask(), filter.mask());
        assert_eq!(reparsed.count(), 7);
    }

    #[test]
    fn test_parse_non_canonical_input() {
        let filter = ControllerFilter::parse(" 9, 7-8  1-2 3 5 2 ").unwrap();
        assert_eq!(filter.to_range_string(), "1-3 5 7-9");
    }

    /// Cover every run of `mask` with shuffled, overlapping tokens.
    fn scrambled_tokens(rng: &mut StdRng, mask: &[bool; CONTROLLER_SLOTS]) -> String {
        let mut tokens = Vec::new();
        let mut number = 1;
        while number < CONTROLLER_SLOTS {
            if !mask[number] {
                number += 1;
                continue;
            }
            let start = number;
            while number + 1 < CONTROLLER_SLOTS && mask[number + 1] {
                number += 1;
            }
            let end = number;

            // Split the run into pieces, some widened back over their neighbour.
            let mut piece = start;
            while piece <= end {
                let last = rng.gen_range(piece..=end);
                let first = if piece > start && rng.gen_bool(0.3) {
                    rng.gen_range(start..=piece)
                } else {
                    piece
                };
                if first == last && rng.gen_bool(0.5) {
                    tokens.push(first.to_string());
                } else {
                    tokens.push(format!("{}-{}", first, last));
                }
                if rng.gen_bool(0.1) {
                    tokens.push(last.to_string());
                }
                piece = last + 1;
            }
            number += 1;
        }
        tokens.shuffle(rng);

        let separators = [" ", ",", ", ", "  ", "\t", " ,"];
        let mut text = String::new();
        for token in tokens {
            text.push_str(separators[rng.gen_range(0..separators.len())]);
            text.push_str(&token);
        }
        text
    }

    #[test]
    fn test_random_masks_survive_scrambled_round_trip() {
        let mut rng = StdRng::seed_from_u64(0x0C0C);

        for _ in 0..500 {
            let density = rng.gen_range(0.0..=1.0);
            let mut mask = [false; CONTROLLER_SLOTS];
            for slot in mask.iter_mut().skip(1) {
                *slot = rng.gen_bool(density);
            }
            let expected = ControllerFilter::from_mask(mask);

            let text = scrambled_tokens(&mut rng, &mask);
            let parsed = ControllerFilter::parse(&text).unwrap();
            assert_eq!(parsed, expected, "input {:?}", text);

            let canonical = parsed.to_range_string();
            let reparsed = ControllerFilter::parse(&canonical).unwrap();
            assert_eq!(reparsed, parsed, "canonical {:?}", canonical);
            assert_eq!(reparsed.to_range_string(), canonical);
        }
    }

    #[test]
    fn test_full_and_empty() {
        assert_eq!(ControllerFilter::all().to_range_string(), "1-128");
        assert_eq!(ControllerFilter::empty().to_range_string(), "");
        assert!(ControllerFilter::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            ControllerFilter::parse("0"),
            Err(FilterParseError::OutOfRange(0))
        );
        assert_eq!(
            ControllerFilter::parse("1-129"),
            Err(FilterParseError::OutOfRange(129))
        );
        assert_eq!(
            ControllerFilter::parse("9-7"),
            Err(FilterParseError::Reversed(9, 7))
        );
        assert!(matches!(
            ControllerFilter::parse("a-3"),
            Err(FilterParseError::NotANumber(_))
        ));
    }

    #[test]
    fn test_index_zero_unused() {
        let mut mask = [true; CONTROLLER_SLOTS];
        mask[0] = true;
        let filter = ControllerFilter::from_mask(mask);
        assert!(!filter.contains(0));
        assert_eq!(filter.count(), 128);
    }

    #[test]
    fn test_edges() {
        let filter = ControllerFilter::from_numbers([1, 128]);
        assert_eq!(filter.to_range_string(), "1 128");
        let filter = ControllerFilter::from_numbers([127, 128]);
        assert_eq!(filter.to_range_string(), "127-128");
    }

    #[test]
    fn test_from_str_and_display() {
        let filter: ControllerFilter = "1-25 40".parse().unwrap();
        assert!(filter.contains(25));
        assert!(!filter.contains(26));
        assert_eq!(filter.to_string(), "1-25 40");
    }
}
