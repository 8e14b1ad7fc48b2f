//! Domain types for NEM12 interval metering data.
//!
//! This module provides:
//! - Validated primitives: Nmi, IntervalMinutes, row identifiers
//! - The MeterBlock -> IntervalBlock -> Reading hierarchy
//! - Timestamp reconstruction for a day of interval values
//! - Import run bookkeeping

pub mod import_run;
pub mod interval;
pub mod meter;
pub mod primitives;
pub mod timeline;

pub use import_run::{ImportRun, RunCounts, RunOutcome};
pub use interval::{
    IntervalBlock, NewIntervalBlock, NewReading, Reading, MAX_QUALITY_METHOD_LEN,
    MAX_REASON_DESCRIPTION_LEN,
};
pub use meter::{MeterBlock, NewMeterBlock, SUPPORTED_UNIT};
pub use primitives::{
    IntervalBlockId, IntervalMinutes, InvalidInterval, MeterBlockId, Nmi, MINUTES_PER_DAY,
};
pub use timeline::{interval_timestamps, pair_readings, TimelineError};
