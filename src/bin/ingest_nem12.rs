//! Ingest NEM12 files into the meter database.
//!
//! Usage: `ingest_nem12 [PATH...]`
//!
//! Each PATH is a NEM12 CSV file or a directory; for a directory the most
//! recently modified `*.csv` inside it is ingested. With no PATH the
//! `NEM12_DROP_DIR` directory is used.

use anyhow::{bail, Context, Result};
use nem12_meter::nem12::latest_csv_in;
use nem12_meter::{config::Config, db::init_db, IngestError, IngestSummary, Ingestor, Repository};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env()?;

    let mut targets: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if targets.is_empty() {
        match &config.drop_dir {
            Some(dir) => targets.push(dir.clone()),
            None => bail!("usage: ingest_nem12 <file_or_dir>... (or set NEM12_DROP_DIR)"),
        }
    }

    let pool = init_db(&config.database_path)
        .await
        .context("failed to open meter database")?;
    let ingestor = Ingestor::new(Arc::new(Repository::new(pool)));

    let mut failed = false;
    for target in targets {
        let file = if target.is_dir() {
            latest_csv_in(&target)?
        } else {
            target
        };

        match ingestor.ingest_file(&file).await {
            Ok(summary) => {
                report_rejected(&file, &summary);
                println!(
                    "{}: {} interval blocks created, {} reused, {} readings, {} unrecognized, {} rejected",
                    file.display(),
                    summary.counts.interval_blocks_created,
                    summary.counts.interval_blocks_reused,
                    summary.counts.readings_created,
                    summary.counts.rows_unrecognized,
                    summary.counts.rows_rejected,
                );
                failed |= !summary.is_clean();
            }
            Err(e) => {
                if let Some(partial) = e.summary() {
                    report_rejected(&file, partial);
                }
                if let IngestError::NoMeterContext { line, .. } = e {
                    eprintln!(
                        "{}: not a NEM12 file, interval data on line {} has no preceding 200 record",
                        file.display(),
                        line
                    );
                    failed = true;
                } else {
                    return Err(e).with_context(|| format!("failed to ingest {}", file.display()));
                }
            }
        }
    }

    if failed {
        std::process::exit(2);
    }
    Ok(())
}

fn report_rejected(file: &Path, summary: &IngestSummary) {
    for rejected in &summary.rejected {
        eprintln!("{}:{}: {}", file.display(), rejected.row.line, rejected.error);
    }
}
