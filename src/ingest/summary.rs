//! Per-run results returned by the ingestion driver.

use crate::domain::{MeterBlock, RunCounts};
use crate::nem12::{RowError, SourceRow};
use uuid::Uuid;

/// A row that was classified but could not be ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub row: SourceRow,
    pub error: RowError,
}

/// Outcome of one ingestion run.
///
/// Unrecognized rows (record types other than 200/300) and rejected rows are
/// kept separately so callers can tell expected NEM12 framing from bad data.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    pub run_id: Uuid,
    pub counts: RunCounts,
    /// MeterBlocks referenced by the file, in first-seen order.
    pub meters: Vec<MeterBlock>,
    pub unrecognized: Vec<SourceRow>,
    pub rejected: Vec<RejectedRow>,
}

impl IngestSummary {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            counts: RunCounts::default(),
            meters: Vec::new(),
            unrecognized: Vec::new(),
            rejected: Vec::new(),
        }
    }

    pub(crate) fn touch_meter(&mut self, meter: &MeterBlock) {
        if !self.meters.iter().any(|m| m.id == meter.id) {
            self.meters.push(meter.clone());
        }
    }

    pub(crate) fn push_unrecognized(&mut self, row: SourceRow) {
        self.unrecognized.push(row);
        self.counts.rows_unrecognized = self.unrecognized.len();
    }

    pub(crate) fn push_rejected(&mut self, row: SourceRow, error: RowError) {
        self.rejected.push(RejectedRow { row, error });
        self.counts.rows_rejected = self.rejected.len();
    }

    /// True when every classified row was ingested.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}
