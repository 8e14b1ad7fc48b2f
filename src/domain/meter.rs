//! MeterBlock: one metering point, sourced from a NEM12 `200` record.

use crate::domain::{IntervalMinutes, MeterBlockId, Nmi};
use serde::{Deserialize, Serialize};

/// The only unit of measure accepted on a `200` record.
pub const SUPPORTED_UNIT: &str = "KWH";

/// A MeterBlock parsed from a file but not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMeterBlock {
    pub nmi: Nmi,
    pub meter_serial: String,
    pub unit_of_measure: String,
    pub interval_minutes: IntervalMinutes,
}

/// A persisted MeterBlock.
///
/// Unique per `nmi` and never mutated once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterBlock {
    pub id: MeterBlockId,
    pub nmi: Nmi,
    pub meter_serial: String,
    pub unit_of_measure: String,
    pub interval_minutes: IntervalMinutes,
}

impl MeterBlock {
    /// Number of readings each of this meter's IntervalBlocks must carry.
    pub fn expected_reading_count(&self) -> usize {
        self.interval_minutes.readings_per_day()
    }
}
