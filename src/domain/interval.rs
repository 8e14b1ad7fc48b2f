//! IntervalBlock and Reading: one day of interval data, sourced from a NEM12
//! `300` record.
//!
//! Children reference their parent by id only; parents never hold their
//! children in memory. Navigation downwards goes through the store.

use crate::domain::{IntervalBlockId, MeterBlockId};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Longest accepted quality method code.
pub const MAX_QUALITY_METHOD_LEN: usize = 3;
/// Longest accepted reason description.
pub const MAX_REASON_DESCRIPTION_LEN: usize = 240;

/// Header fields of a `300` record, not yet linked to a meter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIntervalBlock {
    pub interval_date: NaiveDate,
    pub quality_method: String,
    pub reason_code: Option<i32>,
    pub reason_description: Option<String>,
    /// Natural key component together with the owning meter.
    pub update_timestamp: NaiveDateTime,
    pub msats_load_timestamp: Option<NaiveDateTime>,
}

/// A persisted IntervalBlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalBlock {
    pub id: IntervalBlockId,
    pub meter_block_id: MeterBlockId,
    pub interval_date: NaiveDate,
    pub quality_method: String,
    pub reason_code: Option<i32>,
    pub reason_description: Option<String>,
    pub update_timestamp: NaiveDateTime,
    pub msats_load_timestamp: Option<NaiveDateTime>,
}

/// A reading produced by timestamp reconstruction, not yet persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewReading {
    pub timestamp: NaiveDateTime,
    /// Energy in kWh.
    pub value: f64,
}

/// A persisted reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub interval_block_id: IntervalBlockId,
    pub timestamp: NaiveDateTime,
    pub value: f64,
}
