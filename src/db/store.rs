//! Storage seam used by the ingestion engine.

use crate::domain::{
    ImportRun, IntervalBlock, MeterBlock, MeterBlockId, NewIntervalBlock, NewMeterBlock,
    NewReading, Nmi,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Outcome of a natural-key upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upserted<T> {
    /// No row with the natural key existed; this one was stored.
    Created(T),
    /// A row with the natural key already existed and was left untouched.
    Existing(T),
}

impl<T> Upserted<T> {
    pub fn was_created(&self) -> bool {
        matches!(self, Upserted::Created(_))
    }

    pub fn get(&self) -> &T {
        match self {
            Upserted::Created(v) | Upserted::Existing(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Upserted::Created(v) | Upserted::Existing(v) => v,
        }
    }
}

/// Persistence operations the ingestion engine needs.
///
/// Both upserts perform lookup and insert as one atomic unit, so concurrent
/// imports of the same file cannot create duplicate blocks.
#[async_trait]
pub trait MeterStore: Send + Sync {
    async fn find_meter_block(&self, nmi: Nmi) -> Result<Option<MeterBlock>, sqlx::Error>;

    async fn find_interval_block(
        &self,
        meter_block_id: MeterBlockId,
        update_timestamp: NaiveDateTime,
    ) -> Result<Option<IntervalBlock>, sqlx::Error>;

    /// Return the MeterBlock for `meter.nmi`, storing `meter` if none exists.
    async fn upsert_meter_block(
        &self,
        meter: &NewMeterBlock,
    ) -> Result<Upserted<MeterBlock>, sqlx::Error>;

    /// Return the IntervalBlock keyed by (`meter_block_id`,
    /// `block.update_timestamp`), storing `block` and `readings` together if
    /// none exists. Readings are ignored when the block already exists.
    async fn upsert_interval_block(
        &self,
        meter_block_id: MeterBlockId,
        block: &NewIntervalBlock,
        readings: &[NewReading],
    ) -> Result<Upserted<IntervalBlock>, sqlx::Error>;

    async fn record_import_run(&self, run: &ImportRun) -> Result<(), sqlx::Error>;

    /// Whether a completed run has already ingested a file with this hash.
    async fn has_imported_sha256(&self, sha256: &str) -> Result<bool, sqlx::Error>;
}
