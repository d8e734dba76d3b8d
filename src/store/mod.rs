pub mod corpus;
pub mod schema;
pub mod search_cache;
pub mod search_stats;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::cursor::{RankedCursor, TimelineCursor};
use crate::error::StoreError;

pub use corpus::AnswerRow;
pub use search_cache::CacheEntry;
pub use search_stats::PopularityRecord;

/// Parameters of one relevance-ranked fetch.
#[derive(Debug, Clone)]
pub struct RankedFetch<'a> {
    pub match_expr: &'a str,
    pub after: Option<RankedCursor>,
    pub limit: usize,
    pub max_text_len: usize,
    pub fragment_tokens: u32,
}

/// Parameters of one reverse-chronological fetch.
#[derive(Debug, Clone)]
pub struct TimelineFetch {
    pub after: Option<TimelineCursor>,
    pub limit: usize,
    pub min_content_len: usize,
    pub max_text_len: usize,
}

/// The indexed text store the searchers read from.
pub trait CorpusBackend: Send + Sync {
    /// Matches ordered `score DESC, id DESC`, strictly after `fetch.after`.
    fn ranked_answers(&self, fetch: &RankedFetch<'_>) -> Result<Vec<AnswerRow>, StoreError>;
    /// Readable answers ordered `id DESC`, strictly after `fetch.after`.
    fn timeline_answers(&self, fetch: &TimelineFetch) -> Result<Vec<AnswerRow>, StoreError>;
}

/// Per-query search counters.
pub trait PopularityStore: Send + Sync {
    /// Insert with count 1 or increment, in one atomic statement.
    fn increment(&self, query_text: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
    fn search_count(&self, query_text: &str) -> Result<Option<i64>, StoreError>;
}

/// Serialized result pages keyed by query and cursor.
pub trait CacheStore: Send + Sync {
    fn load(&self, cache_key: &str) -> Result<Option<CacheEntry>, StoreError>;
    /// Unconditional overwrite.
    fn save(&self, entry: &CacheEntry) -> Result<(), StoreError>;
}

/// Connections a file-backed store keeps open.
pub const DEFAULT_POOL_SIZE: u32 = 8;

const PRAGMAS: &str = "PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;
     PRAGMA cache_size = -64000;
     PRAGMA foreign_keys = ON;
     PRAGMA busy_timeout = 5000;";

pub struct Store {
    pool: Pool<SqliteConnectionManager>,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        Self::open_pooled(db_path, DEFAULT_POOL_SIZE)
    }

    pub fn open_pooled(db_path: &Path, pool_size: u32) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let manager = SqliteConnectionManager::file(db_path).with_init(Self::configure);
        let pool = Pool::builder().max_size(pool_size.max(1)).build(manager)?;
        Self::from_pool(pool)
    }

    /// Every `:memory:` connection is its own database, so the pool holds
    /// exactly one connection that never expires.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let manager = SqliteConnectionManager::memory().with_init(Self::configure);
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)?;
        Self::from_pool(pool)
    }

    fn from_pool(pool: Pool<SqliteConnectionManager>) -> Result<Self, StoreError> {
        schema::run_migrations(&*pool.get()?)?;
        Ok(Store { pool })
    }

    fn configure(conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(PRAGMAS)
    }

    /// A pooled connection; hold it for one statement or transaction only.
    pub fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StoreError> {
        Ok(self.pool.get()?)
    }
}

pub fn default_db_path() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("civic-search");
    path.push("civic-search.db");
    path
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}
