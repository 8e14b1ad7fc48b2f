//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by concern:
//! - `meters.rs` - MeterBlock, IntervalBlock and Reading persistence
//! - `usage.rs` - Aggregations over readings for downstream consumers
//! - `imports.rs` - Import run bookkeeping

mod imports;
mod meters;
mod usage;

pub use usage::centred_rolling_mean;

use crate::db::store::{MeterStore, Upserted};
use crate::domain::{
    ImportRun, IntervalBlock, IntervalBlockId, IntervalMinutes, MeterBlock, MeterBlockId,
    NewIntervalBlock, NewMeterBlock, NewReading, Nmi,
};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

/// Optional filters for usage aggregation. Date bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageFilter {
    pub nmi: Option<Nmi>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Total energy across all selected meters for one interval timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UsagePoint {
    pub timestamp: NaiveDateTime,
    pub kwh: f64,
}

/// Total energy across all selected meters for one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyUsage {
    pub date: NaiveDate,
    pub kwh: f64,
}

/// A MeterBlock with the span of interval data stored for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeterSummary {
    pub meter: MeterBlock,
    pub interval_block_count: i64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl MeterStore for Repository {
    async fn find_meter_block(&self, nmi: Nmi) -> Result<Option<MeterBlock>, sqlx::Error> {
        self.get_meter_block_by_nmi(nmi).await
    }

    async fn find_interval_block(
        &self,
        meter_block_id: MeterBlockId,
        update_timestamp: NaiveDateTime,
    ) -> Result<Option<IntervalBlock>, sqlx::Error> {
        self.get_interval_block(meter_block_id, update_timestamp).await
    }

    async fn upsert_meter_block(
        &self,
        meter: &NewMeterBlock,
    ) -> Result<Upserted<MeterBlock>, sqlx::Error> {
        self.insert_meter_block_if_absent(meter).await
    }

    async fn upsert_interval_block(
        &self,
        meter_block_id: MeterBlockId,
        block: &NewIntervalBlock,
        readings: &[NewReading],
    ) -> Result<Upserted<IntervalBlock>, sqlx::Error> {
        self.insert_interval_block_if_absent(meter_block_id, block, readings)
            .await
    }

    async fn record_import_run(&self, run: &ImportRun) -> Result<(), sqlx::Error> {
        self.insert_import_run(run).await
    }

    async fn has_imported_sha256(&self, sha256: &str) -> Result<bool, sqlx::Error> {
        self.completed_run_exists_for_sha256(sha256).await
    }
}

// =========================================================================
// Row mapping
// =========================================================================

fn decode_error(e: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(e))
}

fn parse_date_column(raw: &str) -> Result<NaiveDate, sqlx::Error> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(decode_error)
}

fn meter_block_from_row(row: &SqliteRow) -> Result<MeterBlock, sqlx::Error> {
    let interval: i64 = row.try_get("interval_minutes")?;
    let interval_minutes = u32::try_from(interval)
        .map_err(decode_error)
        .and_then(|m| IntervalMinutes::new(m).map_err(decode_error))?;

    Ok(MeterBlock {
        id: MeterBlockId(row.try_get("id")?),
        nmi: Nmi::new(row.try_get("nmi")?),
        meter_serial: row.try_get("meter_serial")?,
        unit_of_measure: row.try_get("unit_of_measure")?,
        interval_minutes,
    })
}

fn interval_block_from_row(row: &SqliteRow) -> Result<IntervalBlock, sqlx::Error> {
    Ok(IntervalBlock {
        id: IntervalBlockId(row.try_get("id")?),
        meter_block_id: MeterBlockId(row.try_get("meter_block_id")?),
        interval_date: row.try_get("interval_date")?,
        quality_method: row.try_get("quality_method")?,
        reason_code: row.try_get("reason_code")?,
        reason_description: row.try_get("reason_description")?,
        update_timestamp: row.try_get("update_timestamp")?,
        msats_load_timestamp: row.try_get("msats_load_timestamp")?,
    })
}
