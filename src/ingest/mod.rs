//! NEM12 ingestion pipeline.
//!
//! This module provides:
//! - The merge engine: natural-key upserts of meter and interval blocks
//! - The file driver: row dispatch, meter context, and run summaries

pub mod driver;
pub mod merge;
pub mod summary;

pub use driver::{IngestError, Ingestor};
pub use merge::{MergeEngine, MergeError, MergedInterval};
pub use summary::{IngestSummary, RejectedRow};
