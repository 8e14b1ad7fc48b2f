//! File ingestion: rows in file order through the parser and merge engine.

use crate::db::MeterStore;
use crate::domain::{ImportRun, MeterBlock, RunOutcome};
use crate::ingest::merge::{MergeEngine, MergeError};
use crate::ingest::summary::IngestSummary;
use crate::nem12::parser::{parse_interval_data, parse_meter_details};
use crate::nem12::{file_sha256, RecordType, RowError, RowSource, SourceError, SourceRow};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A failure that stops the whole file.
///
/// Each variant carries the summary of rows processed before the failure,
/// when any were.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A `300` record appeared before any `200` record. The file is not
    /// well-formed NEM12; rows up to that point are in `summary`.
    #[error("interval data on line {line} precedes any NMI details record")]
    NoMeterContext {
        line: u64,
        summary: Box<IngestSummary>,
    },
    #[error("failed to read NEM12 source: {source}")]
    Source {
        source: SourceError,
        summary: Option<Box<IngestSummary>>,
    },
    #[error("meter store error: {source}")]
    Db {
        source: sqlx::Error,
        summary: Option<Box<IngestSummary>>,
    },
}

impl IngestError {
    /// Rows processed before the failure.
    pub fn summary(&self) -> Option<&IngestSummary> {
        match self {
            IngestError::NoMeterContext { summary, .. } => Some(&**summary),
            IngestError::Source { summary, .. } | IngestError::Db { summary, .. } => {
                summary.as_deref()
            }
        }
    }
}

impl From<SourceError> for IngestError {
    fn from(source: SourceError) -> Self {
        IngestError::Source {
            source,
            summary: None,
        }
    }
}

impl From<sqlx::Error> for IngestError {
    fn from(source: sqlx::Error) -> Self {
        IngestError::Db {
            source,
            summary: None,
        }
    }
}

/// Meter that subsequent `300` records attach to.
#[derive(Debug, Clone)]
enum MeterContext {
    None,
    Active(MeterBlock),
    /// The latest `200` record was rejected; its interval rows cannot be linked.
    Rejected { line: u64 },
}

enum Abort {
    NoMeterContext { line: u64 },
    Source(SourceError),
    Db(sqlx::Error),
}

#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn MeterStore>,
    engine: MergeEngine,
}

impl Ingestor {
    pub fn new(store: Arc<dyn MeterStore>) -> Self {
        Self {
            engine: MergeEngine::new(store.clone()),
            store,
        }
    }

    /// Ingest a NEM12 file from disk and record the run.
    ///
    /// Re-ingesting a file is safe: blocks already stored are reused and no
    /// readings are duplicated.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestSummary, IngestError> {
        let sha256 = file_sha256(path)?;
        if self.store.has_imported_sha256(&sha256).await? {
            info!(
                path = %path.display(),
                sha256 = %sha256,
                "File was imported before; existing blocks will be reused"
            );
        }

        let rows = RowSource::open(path)?;
        self.run(&path.display().to_string(), Some(sha256), rows)
            .await
    }

    /// Ingest rows from any source, labelled `source` in the run record.
    pub async fn ingest_rows<I>(&self, source: &str, rows: I) -> Result<IngestSummary, IngestError>
    where
        I: IntoIterator<Item = Result<SourceRow, SourceError>>,
    {
        self.run(source, None, rows).await
    }

    async fn run<I>(
        &self,
        source: &str,
        source_sha256: Option<String>,
        rows: I,
    ) -> Result<IngestSummary, IngestError>
    where
        I: IntoIterator<Item = Result<SourceRow, SourceError>>,
    {
        let started_at = Utc::now();
        let mut summary = IngestSummary::new(Uuid::new_v4());

        let result = self.process_rows(rows, &mut summary).await;

        let run = ImportRun {
            run_id: summary.run_id,
            source: source.to_string(),
            source_sha256,
            started_at,
            finished_at: Utc::now(),
            counts: summary.counts,
            outcome: if result.is_ok() {
                RunOutcome::Completed
            } else {
                RunOutcome::Aborted
            },
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.store.record_import_run(&run).await {
                    return Err(IngestError::Db {
                        source: e,
                        summary: Some(Box::new(summary)),
                    });
                }
                let c = &summary.counts;
                info!(
                    run_id = %summary.run_id,
                    source = %source,
                    meter_blocks_created = c.meter_blocks_created,
                    meter_blocks_reused = c.meter_blocks_reused,
                    interval_blocks_created = c.interval_blocks_created,
                    interval_blocks_reused = c.interval_blocks_reused,
                    readings_created = c.readings_created,
                    rows_unrecognized = c.rows_unrecognized,
                    rows_rejected = c.rows_rejected,
                    "NEM12 import completed"
                );
                Ok(summary)
            }
            Err(abort) => {
                if let Err(e) = self.store.record_import_run(&run).await {
                    warn!(run_id = %summary.run_id, error = %e, "Failed to record aborted import run");
                }
                warn!(run_id = %summary.run_id, source = %source, "NEM12 import aborted");
                let summary = Box::new(summary);
                Err(match abort {
                    Abort::NoMeterContext { line } => IngestError::NoMeterContext { line, summary },
                    Abort::Source(source) => IngestError::Source {
                        source,
                        summary: Some(summary),
                    },
                    Abort::Db(source) => IngestError::Db {
                        source,
                        summary: Some(summary),
                    },
                })
            }
        }
    }

    async fn process_rows<I>(&self, rows: I, summary: &mut IngestSummary) -> Result<(), Abort>
    where
        I: IntoIterator<Item = Result<SourceRow, SourceError>>,
    {
        let mut context = MeterContext::None;

        for row in rows {
            let row = match row {
                Ok(row) => row,
                Err(SourceError::InvalidUtf8 { row, field }) => {
                    if RecordType::classify(&row.fields) == Some(RecordType::MeterDetails) {
                        context = MeterContext::Rejected { line: row.line };
                    }
                    let raw = row.fields.get(field).map(String::as_str).unwrap_or_default();
                    let error = RowError::malformed("record text", raw, "not valid UTF-8");
                    reject(summary, row, error);
                    continue;
                }
                Err(e) => return Err(Abort::Source(e)),
            };

            match RecordType::classify(&row.fields) {
                None => continue,
                Some(RecordType::Other) => {
                    debug!(line = row.line, code = %row.fields[0], "Unrecognized record kept for inspection");
                    summary.push_unrecognized(row);
                }
                Some(RecordType::MeterDetails) => {
                    context = self.apply_meter_details(row, summary).await?;
                }
                Some(RecordType::IntervalData) => {
                    let meter = match &context {
                        MeterContext::Active(meter) => meter,
                        MeterContext::Rejected { line } => {
                            let error = RowError::RejectedMeter { meter_line: *line };
                            reject(summary, row, error);
                            continue;
                        }
                        MeterContext::None => {
                            return Err(Abort::NoMeterContext { line: row.line });
                        }
                    };
                    self.apply_interval_data(meter, row, summary).await?;
                }
            }
        }

        Ok(())
    }

    async fn apply_meter_details(
        &self,
        row: SourceRow,
        summary: &mut IngestSummary,
    ) -> Result<MeterContext, Abort> {
        let candidate = match parse_meter_details(&row.fields) {
            Ok(candidate) => candidate,
            Err(error) => {
                let line = row.line;
                reject(summary, row, error);
                return Ok(MeterContext::Rejected { line });
            }
        };

        let merged = self.engine.merge_meter(&candidate).await.map_err(Abort::Db)?;
        if merged.was_created() {
            summary.counts.meter_blocks_created += 1;
        } else {
            summary.counts.meter_blocks_reused += 1;
        }

        let meter = merged.into_inner();
        summary.touch_meter(&meter);
        Ok(MeterContext::Active(meter))
    }

    async fn apply_interval_data(
        &self,
        meter: &MeterBlock,
        row: SourceRow,
        summary: &mut IngestSummary,
    ) -> Result<(), Abort> {
        let record = match parse_interval_data(&row.fields) {
            Ok(record) => record,
            Err(error) => {
                reject(summary, row, error);
                return Ok(());
            }
        };

        match self.engine.merge_interval(meter, &record).await {
            Ok(merged) => {
                if merged.block.was_created() {
                    summary.counts.interval_blocks_created += 1;
                } else {
                    debug!(
                        line = row.line,
                        nmi = %meter.nmi,
                        update_timestamp = %record.header.update_timestamp,
                        "Interval block already stored; skipping"
                    );
                    summary.counts.interval_blocks_reused += 1;
                }
                summary.counts.readings_created += merged.readings_created;
                Ok(())
            }
            Err(MergeError::Row(error)) => {
                reject(summary, row, error);
                Ok(())
            }
            Err(MergeError::Db(e)) => Err(Abort::Db(e)),
        }
    }
}

fn reject(summary: &mut IngestSummary, row: SourceRow, error: RowError) {
    warn!(line = row.line, error = %error, "Rejected NEM12 row");
    summary.push_rejected(row, error);
}
