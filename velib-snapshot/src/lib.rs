//! Vélib' Métropole GBFS snapshot archiver.
//!
//! One invocation fetches the public bike-share feeds and joins static
//! station metadata with live status, normalizing field-name drift across
//! feed versions along the way. Each run persists one timestamped Parquet
//! snapshot plus a refreshed station catalog and system-metadata document.

pub mod catalog;
pub mod config;
pub mod feed;
pub mod pipeline;
pub mod snapshot;
pub mod status;
