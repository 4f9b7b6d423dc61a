// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Threshold classification
//!
//! Maps an observed count onto a three-state verdict. The direction decides
//! which side of the thresholds is unhealthy:
//!
//! - `Descending` (direction < 0): alert when the value is too low.
//!   Requires `warning >= critical`.
//! - `Ascending` (direction > 0): alert when the value is too high.
//!   Requires `warning <= critical`.
//! - `Equality` (direction == 0): anything other than `critical` is CRITICAL,
//!   the warning level is ignored.

use serde::Serialize;
use std::fmt;

use crate::error::ConfigError;

/// Which side of the thresholds is unhealthy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
    Equality,
}

impl Direction {
    /// Interpret the signed `--threshold-direction` flag
    pub fn from_sign(direction: i64) -> Self {
        match direction.signum() {
            0 => Direction::Equality,
            -1 => Direction::Descending,
            _ => Direction::Ascending,
        }
    }

    /// How warning relates to critical when the pair is inverted for this direction
    pub fn inverted_relation(&self) -> &'static str {
        match self {
            Direction::Descending => "less",
            Direction::Ascending => "bigger",
            Direction::Equality => "different",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ascending => write!(f, "> 0"),
            Direction::Descending => write!(f, "< 0"),
            Direction::Equality => write!(f, "0"),
        }
    }
}

/// Health verdict of a check run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Ok,
    Warning,
    Critical,
}

impl Verdict {
    /// Process exit code following the monitoring plugin convention
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Ok => 0,
            Verdict::Warning => 1,
            Verdict::Critical => 2,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Ok => write!(f, "OK"),
            Verdict::Warning => write!(f, "WARNING"),
            Verdict::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Warning/critical levels plus direction, validated on construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThresholdSpec {
    pub critical: i64,
    pub warning: i64,
    pub direction: Direction,
}

impl ThresholdSpec {
    pub fn new(critical: i64, warning: i64, direction: Direction) -> Result<Self, ConfigError> {
        validate(critical, warning, direction)?;
        Ok(Self {
            critical,
            warning,
            direction,
        })
    }

    /// Classify an observed value against these thresholds
    pub fn classify(&self, value: i64) -> Verdict {
        match self.direction {
            Direction::Equality => {
                if value == self.critical {
                    Verdict::Ok
                } else {
                    Verdict::Critical
                }
            }
            Direction::Descending => {
                if value < self.critical {
                    Verdict::Critical
                } else if value < self.warning {
                    Verdict::Warning
                } else {
                    Verdict::Ok
                }
            }
            Direction::Ascending => {
                if value > self.critical {
                    Verdict::Critical
                } else if value > self.warning {
                    Verdict::Warning
                } else {
                    Verdict::Ok
                }
            }
        }
    }
}

fn validate(critical: i64, warning: i64, direction: Direction) -> Result<(), ConfigError> {
    let inverted = match direction {
        Direction::Equality => false,
        Direction::Descending => warning < critical,
        Direction::Ascending => warning > critical,
    };
    if inverted {
        return Err(ConfigError::InvertedThresholds {
            direction,
            warning,
            critical,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(
        value: i64,
        critical: i64,
        warning: i64,
        direction: Direction,
    ) -> Result<Verdict, ConfigError> {
        Ok(ThresholdSpec::new(critical, warning, direction)?.classify(value))
    }

    #[test]
    fn test_direction_from_sign() {
        assert_eq!(Direction::from_sign(-1), Direction::Descending);
        assert_eq!(Direction::from_sign(-42), Direction::Descending);
        assert_eq!(Direction::from_sign(0), Direction::Equality);
        assert_eq!(Direction::from_sign(1), Direction::Ascending);
        assert_eq!(Direction::from_sign(7), Direction::Ascending);
    }

    #[test]
    fn test_equality_mode() {
        assert_eq!(classify(5, 5, 0, Direction::Equality), Ok(Verdict::Ok));
        assert_eq!(classify(4, 5, 0, Direction::Equality), Ok(Verdict::Critical));
        assert_eq!(classify(6, 5, 0, Direction::Equality), Ok(Verdict::Critical));
        // warning level is not validated in equality mode
        assert_eq!(classify(5, 5, 100, Direction::Equality), Ok(Verdict::Ok));
        assert_eq!(classify(5, 5, -100, Direction::Equality), Ok(Verdict::Ok));
    }

    #[test]
    fn test_descending_boundaries() {
        let (critical, warning) = (2, 4);
        let at = |v| classify(v, critical, warning, Direction::Descending).unwrap();

        assert_eq!(at(0), Verdict::Critical);
        assert_eq!(at(critical - 1), Verdict::Critical);
        assert_eq!(at(critical), Verdict::Warning);
        assert_eq!(at(warning - 1), Verdict::Warning);
        assert_eq!(at(warning), Verdict::Ok);
        assert_eq!(at(warning + 10), Verdict::Ok);
    }

    #[test]
    fn test_descending_equal_thresholds_skip_warning() {
        // critical == warning: there is no WARNING band
        let at = |v| classify(v, 3, 3, Direction::Descending).unwrap();
        assert_eq!(at(2), Verdict::Critical);
        assert_eq!(at(3), Verdict::Ok);
    }

    #[test]
    fn test_descending_is_monotonic() {
        let (critical, warning) = (-3, 5);
        let mut previous = Verdict::Critical;
        for value in -10..=10 {
            let verdict = classify(value, critical, warning, Direction::Descending).unwrap();
            assert!(verdict <= previous, "severity increased at {value}");
            previous = verdict;
        }
    }

    #[test]
    fn test_ascending_boundaries() {
        let (critical, warning) = (10, 5);
        let at = |v| classify(v, critical, warning, Direction::Ascending).unwrap();

        assert_eq!(at(0), Verdict::Ok);
        assert_eq!(at(warning), Verdict::Ok);
        assert_eq!(at(warning + 1), Verdict::Warning);
        assert_eq!(at(critical), Verdict::Warning);
        assert_eq!(at(critical + 1), Verdict::Critical);
    }

    #[test]
    fn test_ascending_is_monotonic() {
        let (critical, warning) = (4, -2);
        let mut previous = Verdict::Ok;
        for value in -10..=10 {
            let verdict = classify(value, critical, warning, Direction::Ascending).unwrap();
            assert!(verdict >= previous, "severity decreased at {value}");
            previous = verdict;
        }
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        assert_eq!(
            classify(0, 3, 5, Direction::Ascending),
            Err(ConfigError::InvertedThresholds {
                direction: Direction::Ascending,
                warning: 5,
                critical: 3,
            })
        );
        assert_eq!(
            classify(0, 5, 3, Direction::Descending),
            Err(ConfigError::InvertedThresholds {
                direction: Direction::Descending,
                warning: 3,
                critical: 5,
            })
        );
    }

    #[test]
    fn test_verdict_exit_codes() {
        assert_eq!(Verdict::Ok.exit_code(), 0);
        assert_eq!(Verdict::Warning.exit_code(), 1);
        assert_eq!(Verdict::Critical.exit_code(), 2);
        assert_eq!(Verdict::Warning.to_string(), "WARNING");
    }

    #[test]
    fn test_verdict_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&Verdict::Critical).unwrap(),
            "\"CRITICAL\""
        );
    }
}
