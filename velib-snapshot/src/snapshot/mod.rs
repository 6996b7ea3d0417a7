//! Snapshot assembly and Parquet persistence.

pub mod builder;
pub mod writer;

pub use builder::{CANONICAL_COLUMNS, Snapshot, SnapshotRow, build};
pub use writer::{SnapshotError, snapshot_filename, write_snapshot};
