//! Feed client error types.

/// Errors that can occur when fetching a GBFS feed document.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Feed returned an error status code
    #[error("API error {status} for {url}")]
    Api { status: u16, url: String },

    /// Failed to parse the response body as JSON
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// All fetch attempts failed; carries the last underlying cause
    #[error("failed to fetch {url} after {attempts} attempts: {source}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Box<FeedError>,
    },
}
