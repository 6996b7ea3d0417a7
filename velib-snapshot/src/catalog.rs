//! Station catalog loading and persistence.
//!
//! Normalizes `station_information.json` rows into the canonical catalog
//! table and overwrites the catalog CSV on every run.

use std::path::Path;

use serde_json::Value;

use crate::config::AppConfig;
use crate::feed::{FeedClient, FeedError};

/// Errors from catalog loading or persistence.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Feed fetch failed after retry exhaustion
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// Catalog CSV could not be written
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// Filesystem error while persisting the catalog
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One station of the static catalog.
///
/// Every field is optional: a row missing a source field is retained with
/// nulls rather than dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRecord {
    /// Canonical identifier, stringified from the raw `station_id`.
    pub station_id: Option<String>,
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub capacity: Option<i64>,
}

/// Stringify a raw station identifier.
///
/// The feed has shipped both numeric and string identifiers; anything else
/// is schema drift and normalizes to null.
pub fn canonical_id(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalize raw catalog rows into station records.
pub fn normalize_stations(rows: &[Value]) -> Vec<StationRecord> {
    rows.iter()
        .map(|row| StationRecord {
            station_id: canonical_id(row.get("station_id")),
            name: row
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string),
            lat: row.get("lat").and_then(Value::as_f64),
            lon: row.get("lon").and_then(Value::as_f64),
            capacity: row.get("capacity").and_then(Value::as_i64),
        })
        .collect()
}

/// Write the catalog CSV, header included, overwriting any previous file.
pub fn write_catalog_csv(records: &[StationRecord], path: &Path) -> Result<(), CatalogError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["id", "name", "lat", "lon", "capacity"])?;

    for record in records {
        writer.write_record([
            record.station_id.clone().unwrap_or_default(),
            record.name.clone().unwrap_or_default(),
            record.lat.map(|v| v.to_string()).unwrap_or_default(),
            record.lon.map(|v| v.to_string()).unwrap_or_default(),
            record.capacity.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Fetch, normalize, and persist the station catalog.
pub async fn load(
    client: &FeedClient,
    config: &AppConfig,
) -> Result<Vec<StationRecord>, CatalogError> {
    let rows = client.station_information().await?;
    let records = normalize_stations(&rows);
    write_catalog_csv(&records, &config.station_info_csv())?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_full_row() {
        let rows = vec![json!({
            "station_id": 213688169,
            "name": "Benjamin Godard - Victor Hugo",
            "lat": 48.865983,
            "lon": 2.275725,
            "capacity": 35
        })];

        let records = normalize_stations(&rows);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].station_id.as_deref(), Some("213688169"));
        assert_eq!(records[0].name.as_deref(), Some("Benjamin Godard - Victor Hugo"));
        assert_eq!(records[0].lat, Some(48.865983));
        assert_eq!(records[0].lon, Some(2.275725));
        assert_eq!(records[0].capacity, Some(35));
    }

    #[test]
    fn string_identifier_is_kept_verbatim() {
        let rows = vec![json!({"station_id": "16107", "capacity": 20})];
        let records = normalize_stations(&rows);
        assert_eq!(records[0].station_id.as_deref(), Some("16107"));
    }

    #[test]
    fn missing_fields_become_null_and_row_is_retained() {
        let rows = vec![json!({"name": "Ghost station"})];
        let records = normalize_stations(&rows);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].station_id, None);
        assert_eq!(records[0].name.as_deref(), Some("Ghost station"));
        assert_eq!(records[0].lat, None);
        assert_eq!(records[0].lon, None);
        assert_eq!(records[0].capacity, None);
    }

    #[test]
    fn non_scalar_identifier_is_null() {
        let rows = vec![json!({"station_id": {"nested": 1}}), json!({"station_id": null})];
        let records = normalize_stations(&rows);
        assert_eq!(records[0].station_id, None);
        assert_eq!(records[1].station_id, None);
    }

    #[test]
    fn csv_roundtrip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station_information.csv");

        let first = vec![StationRecord {
            station_id: Some("1".to_string()),
            name: Some("Alpha".to_string()),
            lat: Some(48.85),
            lon: Some(2.35),
            capacity: Some(30),
        }];
        write_catalog_csv(&first, &path).unwrap();

        let second = vec![StationRecord {
            station_id: Some("2".to_string()),
            name: None,
            lat: None,
            lon: None,
            capacity: None,
        }];
        write_catalog_csv(&second, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec!["id,name,lat,lon,capacity", "2,,,,"]);
    }

    #[test]
    fn csv_is_byte_stable() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv");

        let records = normalize_stations(&[
            json!({"station_id": 42, "name": "Quai de la Loire", "lat": 48.887, "lon": 2.37, "capacity": 25}),
        ]);
        write_catalog_csv(&records, &a).unwrap();
        write_catalog_csv(&records, &b).unwrap();

        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }
}
