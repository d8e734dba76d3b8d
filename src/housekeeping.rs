//! Maintenance of the tables the search engine owns. Nothing here runs on the
//! request path.

use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::Serialize;

use crate::error::{HousekeepingError, StoreError};
use crate::store::search_cache::{CacheKeyInfo, CacheSummary};
use crate::store::search_stats::StatsSummary;
use crate::store::{PopularityRecord, Store};

pub const DEFAULT_PURGE_HOURS: i64 = 48;
pub const DEFAULT_PRUNE_DAYS: i64 = 90;
const TOP_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub cache: CacheSummary,
    pub top_keys: Vec<CacheKeyInfo>,
    pub stats: StatsSummary,
    pub top_queries: Vec<PopularityRecord>,
}

/// Outcome of a purge or prune.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cleanup {
    pub cutoff: DateTime<Utc>,
    /// Rows removed, or that would be removed on a dry run.
    pub rows: usize,
    pub dry_run: bool,
}

/// `now` minus a retention window, rejecting negative or unrepresentable spans.
fn cutoff_before(
    now: DateTime<Utc>,
    value: i64,
    unit: &'static str,
    span: fn(i64) -> Option<Duration>,
) -> Result<DateTime<Utc>, HousekeepingError> {
    let invalid = HousekeepingError::InvalidWindow { value, unit };
    if value < 0 {
        return Err(invalid);
    }
    span(value)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or(invalid)
}

pub fn cache_report(store: &Store) -> Result<CacheReport, StoreError> {
    Ok(CacheReport {
        cache: store.cache_summary()?,
        top_keys: store.top_cache_keys(TOP_LIMIT)?,
        stats: store.stats_summary()?,
        top_queries: store.top_queries(TOP_LIMIT)?,
    })
}

/// Drop cached pages written more than `hours` before `now`.
pub fn purge_cache(
    store: &Store,
    hours: i64,
    dry_run: bool,
    now: DateTime<Utc>,
) -> Result<Cleanup, HousekeepingError> {
    let cutoff = cutoff_before(now, hours, "hours", Duration::try_hours)?;
    let rows = store.purge_cache_before(cutoff, dry_run)?;
    info!(
        "Cache purge before {}: {} entries{}",
        cutoff,
        rows,
        if dry_run { " (dry run)" } else { "" }
    );
    Ok(Cleanup {
        cutoff,
        rows,
        dry_run,
    })
}

/// Forget queries nobody searched for in the last `days`.
pub fn prune_stats(
    store: &Store,
    days: i64,
    dry_run: bool,
    now: DateTime<Utc>,
) -> Result<Cleanup, HousekeepingError> {
    let cutoff = cutoff_before(now, days, "days", Duration::try_days)?;
    let rows = store.prune_stats_before(cutoff, dry_run)?;
    info!(
        "Stats prune before {}: {} queries{}",
        cutoff,
        rows,
        if dry_run { " (dry run)" } else { "" }
    );
    Ok(Cleanup {
        cutoff,
        rows,
        dry_run,
    })
}

/// Rebuild the full-text index from the answers table.
pub fn rebuild_index(store: &Store, dry_run: bool) -> Result<i64, StoreError> {
    let answers = store.answer_count()?;
    if !dry_run {
        store.rebuild_fts_index()?;
        info!("Rebuilt full-text index over {} answers", answers);
    }
    Ok(answers)
}
