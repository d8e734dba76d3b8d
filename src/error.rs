use std::time::Duration;

use thiserror::Error;

/// Failure of the durable store behind the corpus, cache and popularity tables.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Malformed or tampered pagination token.
#[derive(Debug, Error)]
pub enum CursorDecodeError {
    #[error("cursor is empty")]
    Empty,
    #[error("cursor is not url-safe base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("cursor payload is not valid for this ordering: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Cache faults. Always recovered locally: a read fault is a miss, a write
/// fault is logged and dropped.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache read failed: {0}")]
    Read(#[source] StoreError),
    #[error("cache write failed: {0}")]
    Write(#[source] StoreError),
    #[error("cached page for {key} is corrupted: {reason}")]
    Corrupt { key: String, reason: String },
    #[error("page could not be serialized: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Popularity upsert or lookup failed. Never fails a search.
#[derive(Debug, Error)]
#[error("popularity tracking failed: {0}")]
pub struct PopularityError(#[from] pub StoreError);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Maintenance command failures.
#[derive(Debug, Error)]
pub enum HousekeepingError {
    #[error("retention window must be a non-negative number of {unit} within range, got {value}")]
    InvalidWindow { value: i64, unit: &'static str },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The only failures a caller of the search pipeline ever sees.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search backend failed: {0}")]
    Backend(#[source] StoreError),
    #[error("search did not complete within {0:?}")]
    Timeout(Duration),
    #[error("search worker stopped unexpectedly: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl SearchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SearchError::Timeout(_))
    }
}
