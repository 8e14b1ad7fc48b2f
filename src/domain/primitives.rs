//! Domain primitives: Nmi, IntervalMinutes, and row identifiers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minutes in one calendar day.
pub const MINUTES_PER_DAY: u32 = 1440;

/// National Metering Identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Nmi(pub i64);

impl Nmi {
    /// Create an Nmi from its numeric value.
    pub fn new(nmi: i64) -> Self {
        Nmi(nmi)
    }

    /// Get the underlying numeric value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Nmi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interval length {0} minutes must be positive and divide 1440")]
pub struct InvalidInterval(pub u32);

/// Length of one metering interval, in minutes.
///
/// Always positive and an exact divisor of a day, so a day splits into a
/// whole number of readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct IntervalMinutes(u32);

impl IntervalMinutes {
    pub fn new(minutes: u32) -> Result<Self, InvalidInterval> {
        if minutes == 0 || MINUTES_PER_DAY % minutes != 0 {
            return Err(InvalidInterval(minutes));
        }
        Ok(IntervalMinutes(minutes))
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Number of readings that make up one day at this interval length.
    pub fn readings_per_day(&self) -> usize {
        (MINUTES_PER_DAY / self.0) as usize
    }

    pub fn as_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.0))
    }
}

impl TryFrom<u32> for IntervalMinutes {
    type Error = InvalidInterval;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        IntervalMinutes::new(minutes)
    }
}

impl From<IntervalMinutes> for u32 {
    fn from(value: IntervalMinutes) -> Self {
        value.0
    }
}

impl std::fmt::Display for IntervalMinutes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Database identity of a persisted MeterBlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MeterBlockId(pub i64);

/// Database identity of a persisted IntervalBlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntervalBlockId(pub i64);
