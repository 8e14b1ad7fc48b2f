//! Record of one ingestion run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Every row was visited. Some may have been rejected.
    Completed,
    /// Processing stopped early on a file-level error.
    Aborted,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Created/reused tallies for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub meter_blocks_created: usize,
    pub meter_blocks_reused: usize,
    pub interval_blocks_created: usize,
    pub interval_blocks_reused: usize,
    pub readings_created: usize,
    pub rows_unrecognized: usize,
    pub rows_rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRun {
    pub run_id: Uuid,
    /// Path or label of the ingested source.
    pub source: String,
    pub source_sha256: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub counts: RunCounts,
    pub outcome: RunOutcome,
}
