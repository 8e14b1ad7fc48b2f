//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - The `MeterStore` seam and its SQLite `Repository`

pub mod migrations;
pub mod repo;
pub mod store;

pub use migrations::init_db;
pub use repo::{DailyUsage, MeterSummary, Repository, UsageFilter, UsagePoint};
pub use store::{MeterStore, Upserted};
