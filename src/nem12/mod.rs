//! NEM12 file handling: row source and record parsing.

pub mod parser;
pub mod source;

pub use parser::{IntervalRecord, RecordType, RowError};
pub use source::{file_sha256, latest_csv_in, RowSource, SourceError, SourceRow};
