//! MeterBlock, IntervalBlock and Reading operations for the repository.

use crate::db::store::Upserted;
use crate::domain::{
    IntervalBlock, IntervalBlockId, MeterBlock, MeterBlockId, NewIntervalBlock, NewMeterBlock,
    NewReading, Nmi, Reading,
};
use chrono::NaiveDateTime;
use sqlx::Row;
use tracing::debug;

use super::{interval_block_from_row, meter_block_from_row, parse_date_column, MeterSummary, Repository};

const METER_BLOCK_COLUMNS: &str = "id, nmi, meter_serial, unit_of_measure, interval_minutes";

const INTERVAL_BLOCK_COLUMNS: &str = "id, meter_block_id, interval_date, quality_method, \
     reason_code, reason_description, update_timestamp, msats_load_timestamp";

impl Repository {
    // =========================================================================
    // Meter blocks
    // =========================================================================

    /// Look up a MeterBlock by NMI.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_meter_block_by_nmi(&self, nmi: Nmi) -> Result<Option<MeterBlock>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {METER_BLOCK_COLUMNS} FROM meter_blocks WHERE nmi = ?"
        ))
        .bind(nmi.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(meter_block_from_row).transpose()
    }

    /// Insert a MeterBlock unless one with the same NMI exists.
    ///
    /// An existing row is returned as stored; its serial and interval length
    /// are not overwritten by the candidate.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_meter_block_if_absent(
        &self,
        meter: &NewMeterBlock,
    ) -> Result<Upserted<MeterBlock>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO meter_blocks (nmi, meter_serial, unit_of_measure, interval_minutes)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(nmi) DO NOTHING
            "#,
        )
        .bind(meter.nmi.as_i64())
        .bind(meter.meter_serial.as_str())
        .bind(meter.unit_of_measure.as_str())
        .bind(i64::from(meter.interval_minutes.get()))
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!(
            "SELECT {METER_BLOCK_COLUMNS} FROM meter_blocks WHERE nmi = ?"
        ))
        .bind(meter.nmi.as_i64())
        .fetch_one(&mut *tx)
        .await?;
        let stored = meter_block_from_row(&row)?;

        tx.commit().await?;

        if result.rows_affected() > 0 {
            debug!(nmi = %stored.nmi, id = stored.id.0, "Stored new meter block");
            Ok(Upserted::Created(stored))
        } else {
            Ok(Upserted::Existing(stored))
        }
    }

    /// MeterBlocks with the span of their interval data, ordered by NMI.
    /// Restricted to a single meter when `nmi` is given.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn meter_summaries(&self, nmi: Option<Nmi>) -> Result<Vec<MeterSummary>, sqlx::Error> {
        let nmi = nmi.map(|n| n.as_i64());
        let rows = sqlx::query(
            r#"
            SELECT m.id, m.nmi, m.meter_serial, m.unit_of_measure, m.interval_minutes,
                   COUNT(b.id) AS block_count,
                   MIN(b.interval_date) AS first_date,
                   MAX(b.interval_date) AS last_date
            FROM meter_blocks m
            LEFT JOIN interval_blocks b ON b.meter_block_id = m.id
            WHERE (? IS NULL OR m.nmi = ?)
            GROUP BY m.id
            ORDER BY m.nmi ASC
            "#,
        )
        .bind(nmi)
        .bind(nmi)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let first_date: Option<String> = row.try_get("first_date")?;
                let last_date: Option<String> = row.try_get("last_date")?;
                Ok(MeterSummary {
                    meter: meter_block_from_row(row)?,
                    interval_block_count: row.try_get("block_count")?,
                    first_date: first_date.as_deref().map(parse_date_column).transpose()?,
                    last_date: last_date.as_deref().map(parse_date_column).transpose()?,
                })
            })
            .collect()
    }

    pub async fn count_meter_blocks(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM meter_blocks")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("n")
    }

    // =========================================================================
    // Interval blocks and readings
    // =========================================================================

    /// Look up an IntervalBlock by its natural key.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_interval_block(
        &self,
        meter_block_id: MeterBlockId,
        update_timestamp: NaiveDateTime,
    ) -> Result<Option<IntervalBlock>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {INTERVAL_BLOCK_COLUMNS} FROM interval_blocks \
             WHERE meter_block_id = ? AND update_timestamp = ?"
        ))
        .bind(meter_block_id.0)
        .bind(update_timestamp)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(interval_block_from_row).transpose()
    }

    /// Insert an IntervalBlock and its readings unless the block's natural key
    /// (meter, update timestamp) is already stored.
    ///
    /// The block row and every reading commit together or not at all. When the
    /// key already exists, `readings` are ignored and nothing is written.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; nothing is committed then.
    pub async fn insert_interval_block_if_absent(
        &self,
        meter_block_id: MeterBlockId,
        block: &NewIntervalBlock,
        readings: &[NewReading],
    ) -> Result<Upserted<IntervalBlock>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO interval_blocks (
                meter_block_id, interval_date, quality_method, reason_code,
                reason_description, update_timestamp, msats_load_timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(meter_block_id, update_timestamp) DO NOTHING
            "#,
        )
        .bind(meter_block_id.0)
        .bind(block.interval_date)
        .bind(block.quality_method.as_str())
        .bind(block.reason_code)
        .bind(block.reason_description.as_deref())
        .bind(block.update_timestamp)
        .bind(block.msats_load_timestamp)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let row = sqlx::query(&format!(
                "SELECT {INTERVAL_BLOCK_COLUMNS} FROM interval_blocks \
                 WHERE meter_block_id = ? AND update_timestamp = ?"
            ))
            .bind(meter_block_id.0)
            .bind(block.update_timestamp)
            .fetch_one(&mut *tx)
            .await?;
            let existing = interval_block_from_row(&row)?;
            tx.commit().await?;
            return Ok(Upserted::Existing(existing));
        }

        let id = IntervalBlockId(result.last_insert_rowid());

        for reading in readings {
            sqlx::query(
                r#"
                INSERT INTO readings (interval_block_id, timestamp, value)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(id.0)
            .bind(reading.timestamp)
            .bind(reading.value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(
            interval_block_id = id.0,
            interval_date = %block.interval_date,
            readings = readings.len(),
            "Stored new interval block"
        );

        Ok(Upserted::Created(IntervalBlock {
            id,
            meter_block_id,
            interval_date: block.interval_date,
            quality_method: block.quality_method.clone(),
            reason_code: block.reason_code,
            reason_description: block.reason_description.clone(),
            update_timestamp: block.update_timestamp,
            msats_load_timestamp: block.msats_load_timestamp,
        }))
    }

    /// All IntervalBlocks of a meter, oldest interval date first.
    pub async fn list_interval_blocks(
        &self,
        meter_block_id: MeterBlockId,
    ) -> Result<Vec<IntervalBlock>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {INTERVAL_BLOCK_COLUMNS} FROM interval_blocks \
             WHERE meter_block_id = ? ORDER BY interval_date ASC, update_timestamp ASC"
        ))
        .bind(meter_block_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(interval_block_from_row).collect()
    }

    /// Readings of one IntervalBlock in timestamp order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn readings_for_block(
        &self,
        interval_block_id: IntervalBlockId,
    ) -> Result<Vec<Reading>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT interval_block_id, timestamp, value
            FROM readings
            WHERE interval_block_id = ?
            ORDER BY timestamp ASC
            "#,
        )
        .bind(interval_block_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Reading {
                    interval_block_id: IntervalBlockId(row.try_get("interval_block_id")?),
                    timestamp: row.try_get("timestamp")?,
                    value: row.try_get("value")?,
                })
            })
            .collect()
    }

    pub async fn count_interval_blocks(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM interval_blocks")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("n")
    }

    pub async fn count_readings(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM readings")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("n")
    }
}
