//! Result-page cache whose freshness window grows with query popularity.

pub mod popularity;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::search::Page;
use crate::store::{CacheEntry, CacheStore};

pub use popularity::{PopularityTracker, TIMELINE_POPULARITY};

/// Source of "now"; injectable so expiry can be tested.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Queries at least this popular are kept for `ttl_minutes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlTier {
    pub min_popularity: i64,
    pub ttl_minutes: i64,
}

pub fn default_tiers() -> Vec<TtlTier> {
    [(0, 5), (5, 15), (20, 30), (100, 45), (1000, 60)]
        .into_iter()
        .map(|(min_popularity, ttl_minutes)| TtlTier {
            min_popularity,
            ttl_minutes,
        })
        .collect()
}

#[derive(Clone)]
pub struct AdaptiveCache {
    store: Arc<dyn CacheStore>,
    /// Sorted by `min_popularity`, TTL non-decreasing.
    tiers: Vec<TtlTier>,
    enabled: bool,
    clock: Clock,
}

impl AdaptiveCache {
    pub fn new(store: Arc<dyn CacheStore>, tiers: Vec<TtlTier>) -> Self {
        AdaptiveCache {
            store,
            tiers,
            enabled: true,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Step function over the tiers; 0 (no caching) below the first tier.
    pub fn ttl_minutes(&self, popularity: i64) -> i64 {
        self.tiers
            .iter()
            .take_while(|tier| tier.min_popularity <= popularity)
            .last()
            .map_or(0, |tier| tier.ttl_minutes)
    }

    /// `normalized` is empty for timeline requests.
    pub fn cache_key(normalized: &str, cursor: &str) -> String {
        if normalized.is_empty() {
            format!("timeline:{cursor}")
        } else {
            format!("search:{normalized}:{cursor}")
        }
    }

    /// Fresh cached page, or `None`. Faults are logged and read as a miss.
    pub fn get(&self, key: &str, ttl_minutes: i64) -> Option<Page> {
        match self.try_get(key, ttl_minutes) {
            Ok(page) => page,
            Err(e) => {
                warn!("Cache lookup for {} degraded to a miss: {}", key, e);
                None
            }
        }
    }

    pub fn try_get(&self, key: &str, ttl_minutes: i64) -> Result<Option<Page>, CacheError> {
        if !self.enabled || ttl_minutes <= 0 {
            return Ok(None);
        }
        let Some(entry) = self.store.load(key).map_err(CacheError::Read)? else {
            return Ok(None);
        };
        let age = (self.clock)() - entry.created_at;
        if age > Duration::minutes(ttl_minutes) {
            debug!("Cache entry {} expired ({}s old)", key, age.num_seconds());
            return Ok(None);
        }
        let page: Page =
            serde_json::from_str(&entry.results_json).map_err(|e| CacheError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?;
        if !page.is_consistent() {
            return Err(CacheError::Corrupt {
                key: key.to_string(),
                reason: "has_next disagrees with next_cursor".to_string(),
            });
        }
        Ok(Some(page))
    }

    /// Store `page` under `key`, last writer wins. Faults are logged.
    pub fn put(&self, key: &str, page: &Page, popularity: i64) {
        if let Err(e) = self.try_put(key, page, popularity) {
            warn!("Cache write for {} dropped: {}", key, e);
        }
    }

    pub fn try_put(&self, key: &str, page: &Page, popularity: i64) -> Result<(), CacheError> {
        // A page that could never be served is not worth writing.
        if !self.enabled || self.ttl_minutes(popularity) <= 0 {
            return Ok(());
        }
        let entry = CacheEntry {
            cache_key: key.to_string(),
            results_json: serde_json::to_string(page)?,
            search_count: popularity,
            created_at: (self.clock)(),
        };
        self.store.save(&entry).map_err(CacheError::Write)
    }
}
