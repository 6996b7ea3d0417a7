//! The single linear snapshot run.
//!
//! System metadata → station catalog → live status → join → one Parquet
//! file. Each invocation is stateless with respect to prior invocations
//! except for the two overwritten side files (catalog CSV, system
//! metadata JSON).

use std::fs;
use std::path::PathBuf;

use chrono::Utc;

use crate::catalog::{self, CatalogError};
use crate::config::AppConfig;
use crate::feed::{FeedClient, FeedError};
use crate::snapshot::{SnapshotError, build, write_snapshot};
use crate::status;

/// Errors that abort a snapshot run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("failed to serialize system information: {0}")]
    SystemInfo(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct RunSummary {
    /// Rows in the written snapshot (one per station in the status feed).
    pub stations: usize,
    /// Path of the snapshot file.
    pub snapshot_path: PathBuf,
}

/// Execute one snapshot run.
///
/// The feed fetches are sequential; the snapshot is assembled fully in
/// memory before the single Parquet write, so a failed run leaves no
/// partial snapshot behind.
pub async fn run(config: &AppConfig) -> Result<RunSummary, RunError> {
    config.ensure_dirs()?;
    let client = FeedClient::new(config.feed_config())?;

    let sysinfo = client.system_information().await?;
    fs::write(config.system_info_json(), serde_json::to_string(&sysinfo)?)?;
    let tzname = sysinfo.timezone().to_string();
    tracing::debug!(timezone = %tzname, ttl = ?sysinfo.ttl(), "system information refreshed");

    let catalog_records = catalog::load(&client, config).await?;
    tracing::info!(stations = catalog_records.len(), "station catalog refreshed");

    let status_records = status::load(&client).await?;
    tracing::info!(stations = status_records.len(), "station status fetched");

    let snapshot = build(&catalog_records, status_records, &tzname, Utc::now());
    let path = write_snapshot(&snapshot, &config.snapshot_dir(), config.compression)?;

    Ok(RunSummary {
        stations: snapshot.len(),
        snapshot_path: path,
    })
}
