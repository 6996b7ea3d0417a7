//! Run configuration.
//!
//! Built once at process start from the environment and passed by reference
//! into each component; there is no module-level mutable state.

use std::path::PathBuf;

use crate::feed::FeedConfig;

/// Default GBFS root published by Vélib' Métropole.
pub const DEFAULT_BASE_URL: &str =
    "https://velib-metropole-opendata.smovengo.cloud/opendata/Velib_Metropole";

/// Default output directory for catalog, system metadata, and snapshots.
pub const DEFAULT_OUT_DIR: &str = "data/raw/velib";

/// Parquet compression codec for snapshot files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnapshotCompression {
    #[default]
    Snappy,
    Gzip,
    Zstd,
}

impl SnapshotCompression {
    /// Parse a codec name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "snappy" => Some(Self::Snappy),
            "gzip" => Some(Self::Gzip),
            "zstd" => Some(Self::Zstd),
            _ => None,
        }
    }
}

/// Configuration for one snapshot run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// GBFS feed root URL.
    pub base_url: String,
    /// Directory receiving catalog, system metadata, and snapshots.
    pub out_dir: PathBuf,
    /// Compression codec for the snapshot file.
    pub compression: SnapshotCompression,
    /// Fetch attempts per feed document.
    pub retries: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            compression: SnapshotCompression::default(),
            retries: 3,
            timeout_secs: 25,
        }
    }
}

impl AppConfig {
    /// Build the configuration from environment variables.
    ///
    /// `VELIB_BASE_URL` overrides the feed root, `OUT_DIR` the output
    /// directory, and `PARQUET_COMPRESSION` the snapshot codec
    /// (snappy | gzip | zstd). An unrecognized codec name logs a warning
    /// and keeps the snappy default rather than aborting the run.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("VELIB_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(dir) = std::env::var("OUT_DIR") {
            config.out_dir = PathBuf::from(dir);
        }
        if let Ok(codec) = std::env::var("PARQUET_COMPRESSION") {
            match SnapshotCompression::parse(&codec) {
                Some(compression) => config.compression = compression,
                None => {
                    tracing::warn!(codec = %codec, "unrecognized PARQUET_COMPRESSION, using snappy");
                }
            }
        }

        config
    }

    /// Set a custom feed root (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set a custom output directory (for testing).
    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    /// Feed client configuration derived from this run configuration.
    pub fn feed_config(&self) -> FeedConfig {
        FeedConfig::new(&self.base_url)
            .with_retries(self.retries)
            .with_timeout(self.timeout_secs)
    }

    /// Path of the station catalog CSV, overwritten every run.
    pub fn station_info_csv(&self) -> PathBuf {
        self.out_dir.join("station_information.csv")
    }

    /// Path of the system metadata document, overwritten every run.
    pub fn system_info_json(&self) -> PathBuf {
        self.out_dir.join("system_information.json")
    }

    /// Directory receiving one snapshot file per run.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.out_dir.join("snapshots")
    }

    /// Create the output directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.out_dir)?;
        std::fs::create_dir_all(self.snapshot_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = AppConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.out_dir, PathBuf::from("data/raw/velib"));
        assert_eq!(config.compression, SnapshotCompression::Snappy);
        assert_eq!(config.retries, 3);
        assert_eq!(config.timeout_secs, 25);
    }

    #[test]
    fn derived_paths() {
        let config = AppConfig::default().with_out_dir("/tmp/velib");
        assert_eq!(
            config.station_info_csv(),
            PathBuf::from("/tmp/velib/station_information.csv")
        );
        assert_eq!(
            config.system_info_json(),
            PathBuf::from("/tmp/velib/system_information.json")
        );
        assert_eq!(config.snapshot_dir(), PathBuf::from("/tmp/velib/snapshots"));
    }

    #[test]
    fn compression_parse_is_case_insensitive() {
        assert_eq!(
            SnapshotCompression::parse("snappy"),
            Some(SnapshotCompression::Snappy)
        );
        assert_eq!(
            SnapshotCompression::parse("GZIP"),
            Some(SnapshotCompression::Gzip)
        );
        assert_eq!(
            SnapshotCompression::parse("Zstd"),
            Some(SnapshotCompression::Zstd)
        );
        assert_eq!(SnapshotCompression::parse("lz77"), None);
        assert_eq!(SnapshotCompression::parse(""), None);
    }

    #[test]
    fn feed_config_inherits_knobs() {
        let config = AppConfig {
            retries: 5,
            timeout_secs: 10,
            ..AppConfig::default()
        }
        .with_base_url("http://localhost:8080");

        let feed = config.feed_config();
        assert_eq!(feed.base_url, "http://localhost:8080");
        assert_eq!(feed.retries, 5);
        assert_eq!(feed.timeout_secs, 10);
    }
}
