use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{from_millis, to_millis, PopularityStore, Store};
use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularityRecord {
    pub query_text: String,
    pub search_count: i64,
    pub last_searched: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSummary {
    pub queries: i64,
    pub total_searches: i64,
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<PopularityRecord> {
    let ms: i64 = row.get(2)?;
    Ok(PopularityRecord {
        query_text: row.get(0)?,
        search_count: row.get(1)?,
        last_searched: from_millis(ms).unwrap_or_default(),
    })
}

impl PopularityStore for Store {
    fn increment(&self, query_text: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO search_stats (query_text, search_count, last_searched)
             VALUES (?1, 1, ?2)
             ON CONFLICT(query_text) DO UPDATE SET
                search_count = search_count + 1,
                last_searched = excluded.last_searched",
            (query_text, to_millis(at)),
        )?;
        Ok(())
    }

    fn search_count(&self, query_text: &str) -> Result<Option<i64>, StoreError> {
        let count = self
            .conn()?
            .query_row(
                "SELECT search_count FROM search_stats WHERE query_text = ?1",
                [query_text],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count)
    }
}

impl Store {
    pub fn popularity_record(&self, query_text: &str) -> Result<Option<PopularityRecord>, StoreError> {
        let record = self
            .conn()?
            .query_row(
                "SELECT query_text, search_count, last_searched
                 FROM search_stats WHERE query_text = ?1",
                [query_text],
                read_record,
            )
            .optional()?;
        Ok(record)
    }

    pub fn stats_summary(&self) -> Result<StatsSummary, StoreError> {
        let summary = self.conn()?.query_row(
            "SELECT COUNT(*), COALESCE(SUM(search_count), 0) FROM search_stats",
            [],
            |row| {
                Ok(StatsSummary {
                    queries: row.get(0)?,
                    total_searches: row.get(1)?,
                })
            },
        )?;
        Ok(summary)
    }

    pub fn top_queries(&self, limit: usize) -> Result<Vec<PopularityRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT query_text, search_count, last_searched
             FROM search_stats
             ORDER BY search_count DESC, last_searched DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([limit as i64], read_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete (or with `dry_run`, count) queries last searched before `cutoff`.
    pub fn prune_stats_before(&self, cutoff: DateTime<Utc>, dry_run: bool) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        if dry_run {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM search_stats WHERE last_searched < ?1",
                [to_millis(cutoff)],
                |row| row.get(0),
            )?;
            return Ok(n as usize);
        }
        let n = conn.execute(
            "DELETE FROM search_stats WHERE last_searched < ?1",
            [to_millis(cutoff)],
        )?;
        Ok(n)
    }
}
