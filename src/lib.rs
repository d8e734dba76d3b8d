pub mod cache;
pub mod config;
pub mod cursor;
pub mod error;
pub mod housekeeping;
pub mod logging;
pub mod search;
pub mod store;
pub mod text;

use std::sync::Arc;

use crate::cache::{AdaptiveCache, PopularityTracker};
use crate::config::SearchConfig;
use crate::error::StoreError;
use crate::search::SearchOrchestrator;
use crate::store::Store;

pub use error::SearchError;
pub use search::{Page, SearchHit, SearchRequest};

/// Open the configured database and wire a search pipeline over it.
pub fn open_service(config: &SearchConfig) -> Result<(Arc<Store>, SearchOrchestrator), StoreError> {
    let db_path = config.database_path();
    log::info!("Opening search database at {}", db_path.display());
    let store = Arc::new(Store::open_pooled(&db_path, config.pool_size)?);
    Ok((store.clone(), build_orchestrator(store, config)))
}

pub fn build_orchestrator(store: Arc<Store>, config: &SearchConfig) -> SearchOrchestrator {
    let cache = AdaptiveCache::new(store.clone(), config.cache.tiers.clone())
        .enabled(config.cache.enabled);
    SearchOrchestrator::new(
        store.clone(),
        cache,
        PopularityTracker::new(store),
        config.search_settings(),
    )
}
