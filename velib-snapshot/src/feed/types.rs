//! GBFS feed document types.
//!
//! Only the system-level documents get typed representations; station rows
//! stay as raw `serde_json::Value` maps because their field names drift
//! across feed versions and are normalized downstream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level metadata the Vélib' feeds carry alongside `data`.
///
/// Keys are omitted from the persisted document when absent upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedMeta {
    /// Upstream refresh timestamp (epoch seconds).
    #[serde(rename = "lastUpdatedOther", skip_serializing_if = "Option::is_none")]
    pub last_updated_other: Option<i64>,

    /// Cache TTL advertised by the feed, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

/// The `system_information.json` document: raw `data` plus feed metadata.
///
/// Persisted verbatim as the side document each run; the pipeline only
/// reads the timezone out of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInformation {
    pub data: Value,
    pub meta: FeedMeta,
}

impl SystemInformation {
    /// Split a raw feed document into `data` and the metadata fields.
    pub fn from_document(doc: Value) -> Self {
        let meta = FeedMeta {
            last_updated_other: doc.get("lastUpdatedOther").and_then(Value::as_i64),
            ttl: doc.get("ttl").and_then(Value::as_u64),
        };
        let data = doc
            .get("data")
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        Self { data, meta }
    }

    /// Timezone name advertised by the feed, defaulting to "UTC".
    pub fn timezone(&self) -> &str {
        self.data
            .get("timezone")
            .and_then(Value::as_str)
            .unwrap_or("UTC")
    }

    /// Cache TTL in seconds, when advertised.
    pub fn ttl(&self) -> Option<u64> {
        self.meta.ttl
    }
}

/// One entry of the GBFS feed-discovery document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedRef {
    pub name: String,
    pub url: String,
}

/// The `gbfs.json` feed-discovery document (English feed list).
#[derive(Debug, Clone)]
pub struct GbfsFeeds {
    pub feeds: Vec<FeedRef>,
    pub meta: FeedMeta,
}

impl GbfsFeeds {
    /// Extract the feed list under `data.en.feeds`; malformed entries are
    /// skipped rather than failing the document.
    pub fn from_document(doc: Value) -> Self {
        let meta = FeedMeta {
            last_updated_other: doc.get("lastUpdatedOther").and_then(Value::as_i64),
            ttl: doc.get("ttl").and_then(Value::as_u64),
        };
        let feeds = doc
            .get("data")
            .and_then(|d| d.get("en"))
            .and_then(|en| en.get("feeds"))
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Self { feeds, meta }
    }
}
