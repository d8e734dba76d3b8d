use std::sync::Arc;

use super::{system_clock, Clock};
use crate::error::PopularityError;
use crate::store::PopularityStore;
use crate::text::normalize_query;

/// Popularity reported for the empty (timeline) query, so that the feed
/// always lands in the longest TTL tier.
pub const TIMELINE_POPULARITY: i64 = 1000;

#[derive(Clone)]
pub struct PopularityTracker {
    store: Arc<dyn PopularityStore>,
    clock: Clock,
}

impl PopularityTracker {
    pub fn new(store: Arc<dyn PopularityStore>) -> Self {
        PopularityTracker {
            store,
            clock: system_clock(),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Count one more search for `query`. Blank queries are not tracked.
    pub fn track(&self, query: &str) -> Result<(), PopularityError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Ok(());
        }
        self.store.increment(&normalized, (self.clock)())?;
        Ok(())
    }

    pub fn popularity(&self, query: &str) -> Result<i64, PopularityError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Ok(TIMELINE_POPULARITY);
        }
        Ok(self.store.search_count(&normalized)?.unwrap_or(0))
    }
}
