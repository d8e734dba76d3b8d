use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use serde::Serialize;

use super::{from_millis, to_millis, CacheStore, Store};
use crate::error::StoreError;

/// One serialized result page.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub cache_key: String,
    pub results_json: String,
    /// Popularity of the query when the page was written.
    pub search_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheSummary {
    pub entries: i64,
    pub total_bytes: i64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheKeyInfo {
    pub cache_key: String,
    pub search_count: i64,
    pub bytes: i64,
    pub created_at: DateTime<Utc>,
}

fn read_entry(row: &Row<'_>) -> rusqlite::Result<CacheEntry> {
    let ms: i64 = row.get(3)?;
    Ok(CacheEntry {
        cache_key: row.get(0)?,
        results_json: row.get(1)?,
        search_count: row.get(2)?,
        created_at: from_millis(ms).unwrap_or_default(),
    })
}

impl CacheStore for Store {
    fn load(&self, cache_key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let entry = self
            .conn()?
            .query_row(
                "SELECT cache_key, results_json, search_count, created_at
                 FROM search_cache WHERE cache_key = ?1",
                [cache_key],
                read_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn save(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO search_cache (cache_key, results_json, search_count, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(cache_key) DO UPDATE SET
                results_json = excluded.results_json,
                search_count = excluded.search_count,
                created_at = excluded.created_at",
            (
                &entry.cache_key,
                &entry.results_json,
                entry.search_count,
                to_millis(entry.created_at),
            ),
        )?;
        Ok(())
    }
}

impl Store {
    pub fn cache_summary(&self) -> Result<CacheSummary, StoreError> {
        let (entries, total_bytes, oldest, newest): (i64, i64, Option<i64>, Option<i64>) =
            self.conn()?.query_row(
                "SELECT COUNT(*), COALESCE(SUM(length(results_json)), 0),
                        MIN(created_at), MAX(created_at)
                 FROM search_cache",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;
        Ok(CacheSummary {
            entries,
            total_bytes,
            oldest: oldest.and_then(from_millis),
            newest: newest.and_then(from_millis),
        })
    }

    pub fn top_cache_keys(&self, limit: usize) -> Result<Vec<CacheKeyInfo>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT cache_key, search_count, length(results_json), created_at
             FROM search_cache
             ORDER BY search_count DESC, created_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([limit as i64], |row| {
                let ms: i64 = row.get(3)?;
                Ok(CacheKeyInfo {
                    cache_key: row.get(0)?,
                    search_count: row.get(1)?,
                    bytes: row.get(2)?,
                    created_at: from_millis(ms).unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete (or with `dry_run`, count) entries written before `cutoff`.
    pub fn purge_cache_before(&self, cutoff: DateTime<Utc>, dry_run: bool) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        if dry_run {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM search_cache WHERE created_at < ?1",
                [to_millis(cutoff)],
                |row| row.get(0),
            )?;
            return Ok(n as usize);
        }
        let n = conn.execute(
            "DELETE FROM search_cache WHERE created_at < ?1",
            [to_millis(cutoff)],
        )?;
        Ok(n)
    }
}
