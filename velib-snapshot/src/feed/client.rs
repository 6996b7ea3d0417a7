//! GBFS feed HTTP client.
//!
//! Fetches the Vélib' Métropole feed documents with a fixed number of
//! attempts and linear backoff. A fetch either yields a complete parsed
//! JSON document or fails with an aggregated error naming the URL and the
//! last underlying cause.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use super::error::FeedError;
use super::types::{GbfsFeeds, SystemInformation};

/// Default number of fetch attempts per document.
const DEFAULT_RETRIES: u32 = 3;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 25;

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Base URL of the GBFS feed root.
    pub base_url: String,
    /// Number of attempts before a fetch fails.
    pub retries: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl FeedConfig {
    /// Create a new config for the given feed root.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            retries: DEFAULT_RETRIES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Set the number of fetch attempts.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Client for the Vélib' GBFS feeds.
///
/// Holds one `reqwest::Client` reused across the run; it carries only
/// default request headers, no data affecting correctness.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    base_url: String,
    retries: u32,
}

impl FeedClient {
    /// Create a new feed client.
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("velib-snapshot/1.0"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            retries: config.retries.max(1),
        })
    }

    /// Fetch a feed document and parse it as JSON, retrying with linear
    /// backoff on any failure.
    pub async fn fetch_json(&self, path: &str) -> Result<Value, FeedError> {
        let url = format!("{}/{}", self.base_url, path);
        with_retries(&url, self.retries, || self.fetch_once(&url)).await
    }

    /// The `system_information.json` document.
    pub async fn system_information(&self) -> Result<SystemInformation, FeedError> {
        let doc = self.fetch_json("system_information.json").await?;
        Ok(SystemInformation::from_document(doc))
    }

    /// Raw station rows from `station_information.json`.
    ///
    /// A missing `data.stations` list yields an empty vector, not an error.
    pub async fn station_information(&self) -> Result<Vec<Value>, FeedError> {
        let doc = self.fetch_json("station_information.json").await?;
        Ok(extract_stations(doc))
    }

    /// Raw station rows from `station_status.json`.
    pub async fn station_status(&self) -> Result<Vec<Value>, FeedError> {
        let doc = self.fetch_json("station_status.json").await?;
        Ok(extract_stations(doc))
    }

    /// The `gbfs.json` feed-discovery document.
    pub async fn gbfs_feeds(&self) -> Result<GbfsFeeds, FeedError> {
        let doc = self.fetch_json("gbfs.json").await?;
        Ok(GbfsFeeds::from_document(doc))
    }

    /// One fetch attempt: GET, status check, body read, JSON parse.
    async fn fetch_once(&self, url: &str) -> Result<Value, FeedError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(FeedError::Api {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| FeedError::Json {
            message: e.to_string(),
        })
    }
}

/// Pull the station list out of a feed document.
fn extract_stations(mut doc: Value) -> Vec<Value> {
    doc.get_mut("data")
        .and_then(|data| data.get_mut("stations"))
        .and_then(Value::as_array_mut)
        .map(std::mem::take)
        .unwrap_or_default()
}

/// Run `op` up to `attempts` times; each failure that leaves another
/// attempt sleeps `1 + attempt_index` seconds first.
async fn with_retries<T, F, Fut>(url: &str, attempts: u32, mut op: F) -> Result<T, FeedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FeedError>>,
{
    let mut failed = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                failed += 1;
                if failed >= attempts {
                    return Err(FeedError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: failed,
                        source: Box::new(e),
                    });
                }
                tracing::debug!(url, attempt = failed, error = %e, "feed fetch failed, retrying");
                tokio::time::sleep(backoff_delay(failed - 1)).await;
            }
        }
    }
}

/// Linear backoff: 1 + attempt_index seconds for the given failed attempt.
fn backoff_delay(failed_attempt: u32) -> Duration {
    Duration::from_secs(1 + u64::from(failed_attempt))
}
