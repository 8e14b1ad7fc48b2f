//! Import run bookkeeping for the repository.

use crate::domain::{ImportRun, RunOutcome};
use sqlx::Row;

use super::Repository;

impl Repository {
    /// Persist the summary of one ingestion run.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_import_run(&self, run: &ImportRun) -> Result<(), sqlx::Error> {
        let c = &run.counts;
        sqlx::query(
            r#"
            INSERT INTO import_runs (
                run_id, source, source_sha256, started_at, finished_at,
                meter_blocks_created, meter_blocks_reused,
                interval_blocks_created, interval_blocks_reused, readings_created,
                rows_unrecognized, rows_rejected, outcome
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(run.run_id.to_string())
        .bind(run.source.as_str())
        .bind(run.source_sha256.as_deref())
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(c.meter_blocks_created as i64)
        .bind(c.meter_blocks_reused as i64)
        .bind(c.interval_blocks_created as i64)
        .bind(c.interval_blocks_reused as i64)
        .bind(c.readings_created as i64)
        .bind(c.rows_unrecognized as i64)
        .bind(c.rows_rejected as i64)
        .bind(run.outcome.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn completed_run_exists_for_sha256(&self, sha256: &str) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM import_runs WHERE source_sha256 = ? AND outcome = ?",
        )
        .bind(sha256)
        .bind(RunOutcome::Completed.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.try_get::<i64, _>("n")? > 0)
    }
}
