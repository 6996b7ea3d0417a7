//! Snapshot assembly: join, timestamps, derived metric, column order.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::catalog::StationRecord;
use crate::status::StatusRecord;

/// Canonical snapshot column order. Extra feed columns follow these.
pub const CANONICAL_COLUMNS: [&str; 16] = [
    "ts_utc",
    "ts_local",
    "id",
    "name",
    "lat",
    "lon",
    "capacity",
    "num_bikes_available_norm",
    "num_docks_available_norm",
    "available_mechanical",
    "available_ebike",
    "is_installed",
    "is_renting",
    "is_returning",
    "last_reported",
    "fill_rate",
];

/// One snapshot row: live status joined with catalog metadata.
#[derive(Debug, Clone)]
pub struct SnapshotRow {
    pub station_id: Option<String>,
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub capacity: Option<i64>,
    pub num_bikes_available: Option<i64>,
    pub num_docks_available: Option<i64>,
    pub available_mechanical: Option<i64>,
    pub available_ebike: Option<i64>,
    pub is_installed: Option<bool>,
    pub is_renting: Option<bool>,
    pub is_returning: Option<bool>,
    pub last_reported: Option<DateTime<Utc>>,
    pub fill_rate: Option<f64>,
    /// Extra feed fields, keyed for column lookup at write time.
    pub extra: HashMap<String, Value>,
}

/// One full-system point-in-time table.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The run instant; every row carries it.
    pub ts_utc: DateTime<Utc>,
    /// Zone actually used for the local timestamp (UTC after fallback).
    pub tz: Tz,
    pub rows: Vec<SnapshotRow>,
    /// Extra feed columns in first-seen order.
    pub extra_columns: Vec<String>,
}

impl Snapshot {
    /// The run instant in the feed's local timezone.
    pub fn ts_local(&self) -> DateTime<Tz> {
        self.ts_utc.with_timezone(&self.tz)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Resolve an IANA timezone name, falling back to UTC on failure.
///
/// A feed shipping a bad timezone must not fail the run.
pub fn resolve_timezone(name: &str) -> Tz {
    match Tz::from_str(name) {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(timezone = name, "unknown feed timezone, falling back to UTC");
            Tz::UTC
        }
    }
}

/// Available bikes over capacity, defined only for positive capacity.
pub fn fill_rate(bikes: Option<i64>, capacity: Option<i64>) -> Option<f64> {
    let bikes = bikes?;
    let capacity = capacity?;
    if capacity > 0 {
        Some(bikes as f64 / capacity as f64)
    } else {
        None
    }
}

/// Build the snapshot table: left-join status onto catalog metadata by
/// identifier, stamp the run timestamp, and derive the fill rate.
///
/// The row basis is the status feed: every status row survives the join
/// (with null metadata when the catalog has no match), and catalog-only
/// stations are excluded.
pub fn build(
    catalog: &[StationRecord],
    status: Vec<StatusRecord>,
    tzname: &str,
    now: DateTime<Utc>,
) -> Snapshot {
    let tz = resolve_timezone(tzname);

    // First catalog occurrence wins on duplicate identifiers.
    let mut metadata: HashMap<&str, &StationRecord> = HashMap::new();
    for record in catalog {
        if let Some(id) = record.station_id.as_deref() {
            metadata.entry(id).or_insert(record);
        }
    }

    let mut extra_columns: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for record in &status {
        for (key, _) in &record.extra {
            if seen.insert(key) {
                extra_columns.push(key.clone());
            }
        }
    }

    let rows = status
        .into_iter()
        .map(|record| {
            let station = record
                .station_id
                .as_deref()
                .and_then(|id| metadata.get(id).copied());

            SnapshotRow {
                name: station.and_then(|s| s.name.clone()),
                lat: station.and_then(|s| s.lat),
                lon: station.and_then(|s| s.lon),
                capacity: station.and_then(|s| s.capacity),
                fill_rate: fill_rate(
                    record.num_bikes_available,
                    station.and_then(|s| s.capacity),
                ),
                station_id: record.station_id,
                num_bikes_available: record.num_bikes_available,
                num_docks_available: record.num_docks_available,
                available_mechanical: record.available_mechanical,
                available_ebike: record.available_ebike,
                is_installed: record.is_installed,
                is_renting: record.is_renting,
                is_returning: record.is_returning,
                last_reported: record.last_reported,
                extra: record.extra.into_iter().collect(),
            }
        })
        .collect();

    Snapshot {
        ts_utc: now,
        tz,
        rows,
        extra_columns,
    }
}
