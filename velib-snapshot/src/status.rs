//! Station status loading and normalization.
//!
//! This is where feed schema drift is absorbed. Field names vary between
//! snake-case and camel-case across feed versions, and the availability
//! breakdown arrives as an object or as a list of objects. Everything
//! normalizes to nulls or zeros; nothing here fails a row or the run.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::catalog::canonical_id;
use crate::feed::{FeedClient, FeedError};

/// Source aliases for the canonical bike count, in preference order.
pub const BIKES_AVAILABLE_ALIASES: &[&str] = &["num_bikes_available", "numBikesAvailable"];

/// Source aliases for the canonical dock count, in preference order.
pub const DOCKS_AVAILABLE_ALIASES: &[&str] = &["num_docks_available", "numDocksAvailable"];

/// Availability breakdown field, object or list depending on feed version.
const BREAKDOWN_KEY: &str = "num_bikes_available_types";

/// Source keys consumed into canonical columns; everything else on a status
/// row is preserved as an extra column.
const CONSUMED_KEYS: [&str; 4] = ["is_installed", "is_renting", "is_returning", "last_reported"];

/// Live status of one station, normalized. Exists only for the duration of
/// one run.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    /// Canonical identifier, stringified from the raw `station_id`.
    pub station_id: Option<String>,
    pub num_bikes_available: Option<i64>,
    pub num_docks_available: Option<i64>,
    pub available_mechanical: Option<i64>,
    pub available_ebike: Option<i64>,
    pub is_installed: Option<bool>,
    pub is_renting: Option<bool>,
    pub is_returning: Option<bool>,
    pub last_reported: Option<DateTime<Utc>>,
    /// Source fields not consumed into canonical columns, in source order.
    pub extra: Vec<(String, Value)>,
}

/// Per-row shape of the availability breakdown field.
#[derive(Debug)]
enum Breakdown<'a> {
    Absent,
    Single(&'a serde_json::Map<String, Value>),
    List(&'a [Value]),
}

impl<'a> Breakdown<'a> {
    fn of(row: &'a Value) -> Self {
        match row.get(BREAKDOWN_KEY) {
            Some(Value::Object(map)) => Breakdown::Single(map),
            Some(Value::Array(items)) => Breakdown::List(items),
            _ => Breakdown::Absent,
        }
    }

    /// Sum mechanical and e-bike counts across the breakdown, treating
    /// missing sub-counts as zero. Non-object list elements are skipped.
    fn resolve(&self) -> (i64, i64) {
        match self {
            Breakdown::Absent => (0, 0),
            Breakdown::Single(map) => counts_of(map),
            Breakdown::List(items) => items
                .iter()
                .filter_map(Value::as_object)
                .map(counts_of)
                .fold((0, 0), |(m, e), (dm, de)| (m + dm, e + de)),
        }
    }
}

fn counts_of(map: &serde_json::Map<String, Value>) -> (i64, i64) {
    let count = |key| map.get(key).and_then(as_count).unwrap_or(0);
    (count("mechanical"), count("ebike"))
}

/// Coerce a JSON value to an integer count; non-numeric values are drift
/// and count as absent.
fn as_count(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// First present, non-null value among the aliases.
fn pick_alias<'a>(row: &'a Value, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .find_map(|key| row.get(*key).filter(|v| !v.is_null()))
}

/// Boolean status flag: JSON bool, or the 0/1 numerics of older feed
/// versions.
fn flag(row: &Value, key: &str) -> Option<bool> {
    match row.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}

/// Epoch seconds to a UTC instant; unparsable values become null.
fn epoch_to_utc(value: &Value) -> Option<DateTime<Utc>> {
    let secs = as_count(value)?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Source fields to carry through as extra columns, in source order.
fn extra_fields(row: &Value) -> Vec<(String, Value)> {
    let Some(map) = row.as_object() else {
        return Vec::new();
    };
    map.iter()
        .filter(|(key, _)| !CONSUMED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Normalize raw status rows into status records.
///
/// The availability breakdown distinguishes "not reported" from "reported
/// as zero": when no row in the feed carries the breakdown field, both
/// derived columns are null everywhere; once any row carries it, rows
/// without it resolve to zero.
pub fn normalize_status(rows: &[Value]) -> Vec<StatusRecord> {
    let breakdown_reported = rows.iter().any(|row| row.get(BREAKDOWN_KEY).is_some());

    rows.iter()
        .map(|row| {
            let (mechanical, ebike) = if breakdown_reported {
                let (m, e) = Breakdown::of(row).resolve();
                (Some(m), Some(e))
            } else {
                (None, None)
            };

            StatusRecord {
                station_id: canonical_id(row.get("station_id")),
                num_bikes_available: pick_alias(row, BIKES_AVAILABLE_ALIASES).and_then(as_count),
                num_docks_available: pick_alias(row, DOCKS_AVAILABLE_ALIASES).and_then(as_count),
                available_mechanical: mechanical,
                available_ebike: ebike,
                is_installed: flag(row, "is_installed"),
                is_renting: flag(row, "is_renting"),
                is_returning: flag(row, "is_returning"),
                last_reported: row.get("last_reported").and_then(epoch_to_utc),
                extra: extra_fields(row),
            }
        })
        .collect()
}

/// Fetch and normalize the live station status.
pub async fn load(client: &FeedClient) -> Result<Vec<StatusRecord>, FeedError> {
    let rows = client.station_status().await?;
    Ok(normalize_status(&rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single(row: Value) -> StatusRecord {
        normalize_status(std::slice::from_ref(&row)).remove(0)
    }

    #[test]
    fn snake_case_wins_over_camel_case() {
        let record = single(json!({
            "station_id": 1,
            "num_bikes_available": 4,
            "numBikesAvailable": 9,
            "num_docks_available": 11,
            "numDocksAvailable": 2
        }));
        assert_eq!(record.num_bikes_available, Some(4));
        assert_eq!(record.num_docks_available, Some(11));
    }

    #[test]
    fn camel_case_fills_in_when_snake_case_missing() {
        let record = single(json!({"station_id": 1, "numBikesAvailable": 5}));
        assert_eq!(record.num_bikes_available, Some(5));
        assert_eq!(record.num_docks_available, None);
    }

    #[test]
    fn null_snake_case_falls_through_to_camel_case() {
        let record = single(json!({
            "station_id": 1,
            "num_bikes_available": null,
            "numBikesAvailable": 7
        }));
        assert_eq!(record.num_bikes_available, Some(7));
    }

    #[test]
    fn non_numeric_count_is_null() {
        let record = single(json!({"station_id": 1, "num_bikes_available": "plenty"}));
        assert_eq!(record.num_bikes_available, None);
    }

    #[test]
    fn breakdown_absent_from_feed_is_null_not_zero() {
        let rows = vec![
            json!({"station_id": 1, "num_bikes_available": 3}),
            json!({"station_id": 2, "num_bikes_available": 0}),
        ];
        for record in normalize_status(&rows) {
            assert_eq!(record.available_mechanical, None);
            assert_eq!(record.available_ebike, None);
        }
    }

    #[test]
    fn breakdown_single_object() {
        let record = single(json!({
            "station_id": 1,
            "num_bikes_available_types": {"mechanical": 3, "ebike": 2}
        }));
        assert_eq!(record.available_mechanical, Some(3));
        assert_eq!(record.available_ebike, Some(2));
    }

    #[test]
    fn breakdown_list_sums_across_elements() {
        let record = single(json!({
            "station_id": 1,
            "num_bikes_available_types": [
                {"mechanical": 3},
                {"ebike": 2},
                {"mechanical": 1, "ebike": 4}
            ]
        }));
        assert_eq!(record.available_mechanical, Some(4));
        assert_eq!(record.available_ebike, Some(6));
    }

    #[test]
    fn breakdown_skips_non_object_elements_and_missing_subcounts() {
        let record = single(json!({
            "station_id": 1,
            "num_bikes_available_types": [{"mechanical": 2}, 7, "x", null, {}]
        }));
        assert_eq!(record.available_mechanical, Some(2));
        assert_eq!(record.available_ebike, Some(0));
    }

    #[test]
    fn breakdown_reported_elsewhere_makes_missing_rows_zero() {
        let rows = vec![
            json!({"station_id": 1, "num_bikes_available_types": [{"mechanical": 5, "ebike": 1}]}),
            json!({"station_id": 2}),
        ];
        let records = normalize_status(&rows);
        assert_eq!(records[0].available_mechanical, Some(5));
        assert_eq!(records[1].available_mechanical, Some(0));
        assert_eq!(records[1].available_ebike, Some(0));
    }

    #[test]
    fn flags_accept_bools_and_numerics() {
        let record = single(json!({
            "station_id": 1,
            "is_installed": true,
            "is_renting": 0,
            "is_returning": 1
        }));
        assert_eq!(record.is_installed, Some(true));
        assert_eq!(record.is_renting, Some(false));
        assert_eq!(record.is_returning, Some(true));

        let record = single(json!({"station_id": 1}));
        assert_eq!(record.is_installed, None);
        assert_eq!(record.is_renting, None);
        assert_eq!(record.is_returning, None);
    }

    #[test]
    fn last_reported_converts_epoch_seconds() {
        let record = single(json!({"station_id": 1, "last_reported": 1712345678}));
        let expected = Utc.timestamp_opt(1712345678, 0).single().unwrap();
        assert_eq!(record.last_reported, Some(expected));
    }

    #[test]
    fn last_reported_bad_values_are_null() {
        assert_eq!(
            single(json!({"station_id": 1, "last_reported": "yesterday"})).last_reported,
            None
        );
        assert_eq!(single(json!({"station_id": 1})).last_reported, None);
        assert_eq!(
            single(json!({"station_id": 1, "last_reported": null})).last_reported,
            None
        );
    }

    #[test]
    fn extra_fields_preserve_unconsumed_source_keys() {
        let record = single(json!({
            "station_id": 1,
            "stationCode": "16107",
            "num_bikes_available": 3,
            "is_renting": true,
            "last_reported": 1712345678
        }));

        let keys: Vec<&str> = record.extra.iter().map(|(k, _)| k.as_str()).collect();
        // Consumed keys are gone; raw source variants stay.
        assert!(keys.contains(&"station_id"));
        assert!(keys.contains(&"stationCode"));
        assert!(keys.contains(&"num_bikes_available"));
        assert!(!keys.contains(&"is_renting"));
        assert!(!keys.contains(&"last_reported"));
    }

    #[test]
    fn row_without_identifier_is_retained() {
        let record = single(json!({"num_bikes_available": 2}));
        assert_eq!(record.station_id, None);
        assert_eq!(record.num_bikes_available, Some(2));
    }
}
