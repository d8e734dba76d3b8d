use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use tokio::task::spawn_blocking;
use tokio::time::{timeout, timeout_at, Instant};

use super::{
    fetch_page, resume, Page, RankedSearch, SearchMode, SearchQuery, SearchSettings, Searcher,
    TimelineSearch,
};
use crate::cache::{AdaptiveCache, PopularityTracker};
use crate::cursor;
use crate::error::SearchError;
use crate::store::CorpusBackend;
use crate::text::{match_expression, query_terms};

/// Longest wait for a popularity count before falling back to the shortest TTL.
const POPULARITY_READ_BUDGET: Duration = Duration::from_millis(250);

/// One incoming search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub cursor: Option<String>,
    /// Rendering hint for the caller; ignored here.
    #[serde(default)]
    pub partial: bool,
}

pub struct SearchOrchestrator {
    corpus: Arc<dyn CorpusBackend>,
    cache: AdaptiveCache,
    popularity: PopularityTracker,
    settings: SearchSettings,
}

impl SearchOrchestrator {
    pub fn new(
        corpus: Arc<dyn CorpusBackend>,
        cache: AdaptiveCache,
        popularity: PopularityTracker,
        settings: SearchSettings,
    ) -> Self {
        SearchOrchestrator {
            corpus,
            cache,
            popularity,
            settings,
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Run one request under the configured deadline.
    pub async fn search(&self, request: &SearchRequest) -> Result<Page, SearchError> {
        let deadline = Instant::now() + self.settings.timeout;
        match timeout_at(deadline, self.run(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Search for {:?} exceeded {:?}", request.q, self.settings.timeout);
                Err(SearchError::Timeout(self.settings.timeout))
            }
        }
    }

    async fn run(&self, request: &SearchRequest) -> Result<Page, SearchError> {
        let query = SearchQuery::parse(&request.q);
        let cursor = request.cursor.as_deref();

        match &query.mode {
            SearchMode::Ranked(normalized) => {
                let terms = query_terms(normalized);
                let Some(expr) = match_expression(&terms) else {
                    debug!("Query {:?} has no searchable words", query.text);
                    return Ok(Page::empty());
                };
                debug!("Ranked search for {:?}", expr);
                let searcher = RankedSearch::new(self.corpus.clone(), expr, terms, &self.settings);
                let page = self.paginate(&query, searcher, cursor).await?;
                self.track(normalized.clone());
                Ok(page)
            }
            SearchMode::Timeline => {
                debug!("Timeline search");
                let searcher = TimelineSearch::new(self.corpus.clone(), &self.settings);
                self.paginate(&query, searcher, cursor).await
            }
        }
    }

    /// Cache lookup, then on a miss execute and store.
    async fn paginate<S>(
        &self,
        query: &SearchQuery,
        searcher: S,
        token: Option<&str>,
    ) -> Result<Page, SearchError>
    where
        S: Searcher + Send + 'static,
        S::Cursor: Send + 'static,
    {
        let after: Option<S::Cursor> = resume(token);
        // Re-encoded so equivalent tokens share one cache entry.
        let effective = after
            .as_ref()
            .map(|c| cursor::encode(c))
            .unwrap_or_default();
        let key = AdaptiveCache::cache_key(query.normalized(), &effective);

        let popularity = self.popularity(query.normalized().to_string()).await?;
        let ttl = self.cache.ttl_minutes(popularity);

        let cache = self.cache.clone();
        let lookup_key = key.clone();
        if let Some(page) = spawn_blocking(move || cache.get(&lookup_key, ttl)).await? {
            debug!("Cache hit for {} (ttl {}m)", key, ttl);
            return Ok(page);
        }
        debug!("Cache miss for {} (ttl {}m)", key, ttl);

        let page_size = self.settings.page_size;
        let page = spawn_blocking(move || fetch_page(&searcher, after.as_ref(), page_size))
            .await?
            .map_err(|e| {
                error!("Search backend failed for {}: {}", key, e);
                SearchError::Backend(e)
            })?;

        let cache = self.cache.clone();
        let stored = page.clone();
        spawn_blocking(move || cache.put(&key, &stored, popularity)).await?;
        Ok(page)
    }

    /// Bounded to a slice of the request deadline; a slow or failing read
    /// counts as popularity 0.
    async fn popularity(&self, normalized: String) -> Result<i64, SearchError> {
        let tracker = self.popularity.clone();
        let budget = POPULARITY_READ_BUDGET.min(self.settings.timeout / 4);
        let read = spawn_blocking(move || tracker.popularity(&normalized));
        match timeout(budget, read).await {
            Ok(count) => Ok(count?.unwrap_or_else(|e| {
                warn!("{}", e);
                0
            })),
            Err(_) => {
                warn!("Popularity read exceeded {:?}, using shortest TTL", budget);
                Ok(0)
            }
        }
    }

    /// Detached: the counter write never delays or fails the response.
    fn track(&self, normalized: String) {
        let tracker = self.popularity.clone();
        spawn_blocking(move || {
            if let Err(e) = tracker.track(&normalized) {
                warn!("{}", e);
            }
        });
    }
}
