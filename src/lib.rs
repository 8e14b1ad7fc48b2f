pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod nem12;

pub use config::Config;
pub use db::{init_db, MeterStore, Repository, Upserted};
pub use domain::{
    IntervalBlock, IntervalMinutes, MeterBlock, NewIntervalBlock, NewMeterBlock, NewReading, Nmi,
    Reading,
};
pub use error::AppError;
pub use ingest::{IngestError, IngestSummary, Ingestor};
