//! Merging parsed records into the store without duplicating prior imports.

use crate::db::{MeterStore, Upserted};
use crate::domain::{pair_readings, IntervalBlock, MeterBlock, NewMeterBlock};
use crate::nem12::{IntervalRecord, RowError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Row(#[from] RowError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Result of merging one `300` record.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedInterval {
    pub block: Upserted<IntervalBlock>,
    /// Readings written by this merge. Zero when the block already existed.
    pub readings_created: usize,
}

#[derive(Clone)]
pub struct MergeEngine {
    store: Arc<dyn MeterStore>,
}

impl MergeEngine {
    pub fn new(store: Arc<dyn MeterStore>) -> Self {
        Self { store }
    }

    /// Resolve a `200` record to its stored MeterBlock, creating it on first
    /// sighting of the NMI.
    pub async fn merge_meter(
        &self,
        candidate: &NewMeterBlock,
    ) -> Result<Upserted<MeterBlock>, sqlx::Error> {
        let merged = self.store.upsert_meter_block(candidate).await?;
        if !merged.was_created() && merged.get().interval_minutes != candidate.interval_minutes {
            debug!(
                nmi = %candidate.nmi,
                stored = %merged.get().interval_minutes,
                file = %candidate.interval_minutes,
                "Interval length differs from stored meter block; keeping stored value"
            );
        }
        Ok(merged)
    }

    /// Resolve a `300` record under `meter` to its stored IntervalBlock.
    ///
    /// The value run is checked against the meter's interval length before
    /// anything is looked up, so a malformed row is rejected even when its key
    /// was imported before. A new block is stored together with its readings;
    /// an existing block is returned unchanged.
    pub async fn merge_interval(
        &self,
        meter: &MeterBlock,
        record: &IntervalRecord,
    ) -> Result<MergedInterval, MergeError> {
        let readings = pair_readings(
            record.header.interval_date,
            meter.interval_minutes,
            &record.values,
        )
        .map_err(RowError::from)?;

        let block = self
            .store
            .upsert_interval_block(meter.id, &record.header, &readings)
            .await?;

        let readings_created = if block.was_created() { readings.len() } else { 0 };
        Ok(MergedInterval {
            block,
            readings_created,
        })
    }
}
