//! GBFS feed client and document types.
//!
//! Fetches the Vélib' Métropole feed documents over HTTP with retry and
//! linear backoff.

mod client;
mod error;
mod types;

pub use client::{FeedClient, FeedConfig};
pub use error::FeedError;
pub use types::{FeedMeta, FeedRef, GbfsFeeds, SystemInformation};
