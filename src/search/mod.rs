pub mod highlight;
pub mod orchestrator;
pub mod ranked;
pub mod timeline;

use std::time::Duration;

use log::warn;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cursor;
use crate::error::StoreError;
use crate::store::AnswerRow;
use crate::text::{clean_preview, normalize_query, postprocess, question_slug};
use highlight::HighlightRange;

pub use orchestrator::{SearchOrchestrator, SearchRequest};
pub use ranked::RankedSearch;
pub use timeline::TimelineSearch;

/// Queries shorter than this (in characters) fall back to the timeline.
pub const MIN_RANKED_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchMode {
    /// Relevance search for the normalized query.
    Ranked(String),
    /// Newest readable answers first.
    Timeline,
}

/// The user's query, decided once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub text: String,
    pub mode: SearchMode,
}

impl SearchQuery {
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim().to_string();
        let mode = if text.chars().count() >= MIN_RANKED_CHARS {
            SearchMode::Ranked(normalize_query(&text))
        } else {
            SearchMode::Timeline
        };
        SearchQuery { text, mode }
    }

    /// Key for popularity and caching; empty in timeline mode.
    pub fn normalized(&self) -> &str {
        match &self.mode {
            SearchMode::Ranked(normalized) => normalized,
            SearchMode::Timeline => "",
        }
    }
}

/// A single search result item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub author_id: Option<i64>,
    pub question_id: i64,
    pub question_title: Option<String>,
    pub question_slug: String,
    pub created_at: Option<String>,
    pub excerpt: String,
    /// The source text was longer than the preview window.
    #[serde(default)]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Query-term matches inside `excerpt`, ranked hits only.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<HighlightRange>,
}

/// One page of results and the token to resume after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<SearchHit>,
    pub has_next: bool,
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn new(items: Vec<SearchHit>, next_cursor: Option<String>) -> Self {
        Page {
            items,
            has_next: next_cursor.is_some(),
            next_cursor,
        }
    }

    pub fn empty() -> Self {
        Page::new(Vec::new(), None)
    }

    pub fn is_consistent(&self) -> bool {
        self.has_next == self.next_cursor.is_some()
    }
}

/// Tunables shared by both search paths.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub page_size: usize,
    pub min_content_len: usize,
    pub max_text_len: usize,
    pub preview_max_len: usize,
    pub fragment_tokens: u32,
    pub timeout: Duration,
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            page_size: 20,
            min_content_len: 40,
            max_text_len: 20_000,
            preview_max_len: 1_000,
            fragment_tokens: 24,
            timeout: Duration::from_millis(29_000),
        }
    }
}

/// A keyset-paginated scan over the corpus.
pub trait Searcher {
    type Cursor: Serialize + DeserializeOwned;

    /// Up to `limit` rows strictly after `after` in this searcher's order.
    fn fetch(&self, after: Option<&Self::Cursor>, limit: usize) -> Result<Vec<AnswerRow>, StoreError>;

    fn cursor_after(&self, row: &AnswerRow) -> Self::Cursor;

    fn to_hit(&self, row: AnswerRow) -> SearchHit;
}

/// Decode a client token for `C`. Anything unusable restarts from the top.
pub fn resume<C: DeserializeOwned>(token: Option<&str>) -> Option<C> {
    let token = token.map(str::trim).filter(|t| !t.is_empty())?;
    match cursor::decode(token) {
        Ok(c) => Some(c),
        Err(e) => {
            warn!("Ignoring unusable cursor, restarting from the first page: {}", e);
            None
        }
    }
}

/// Fetch one extra row to learn whether another page exists; the next
/// cursor points at the last row kept on this page.
pub fn fetch_page<S: Searcher>(
    searcher: &S,
    after: Option<&S::Cursor>,
    page_size: usize,
) -> Result<Page, StoreError> {
    let mut rows = searcher.fetch(after, page_size + 1)?;
    let has_next = rows.len() > page_size;
    rows.truncate(page_size);

    let next_cursor = if has_next {
        rows.last()
            .map(|last| cursor::encode(&searcher.cursor_after(last)))
    } else {
        None
    };

    let items = rows.into_iter().map(|row| searcher.to_hit(row)).collect();
    Ok(Page::new(items, next_cursor))
}

/// Build the display hit for `row` from `raw`, the text to excerpt.
pub(crate) fn build_hit(row: AnswerRow, raw: &str, preview_max_len: usize) -> SearchHit {
    let (preview, truncated) = clean_preview(raw, preview_max_len);
    SearchHit {
        question_slug: question_slug(row.question_title.as_deref(), row.question_id),
        id: row.id,
        author_id: row.author_id,
        question_id: row.question_id,
        question_title: row.question_title,
        created_at: row.submitted_at,
        excerpt: postprocess(&preview),
        truncated,
        score: row.score,
        highlights: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::TimelineCursor;

    /// In-memory rows ordered by descending id.
    struct Ids(Vec<i64>);

    impl Searcher for Ids {
        type Cursor = TimelineCursor;

        fn fetch(&self, after: Option<&TimelineCursor>, limit: usize) -> Result<Vec<AnswerRow>, StoreError> {
            Ok(self
                .0
                .iter()
                .filter(|id| after.map_or(true, |c| **id < c.last_id))
                .take(limit)
                .map(|&id| row(id))
                .collect())
        }

        fn cursor_after(&self, row: &AnswerRow) -> TimelineCursor {
            TimelineCursor { last_id: row.id }
        }

        fn to_hit(&self, row: AnswerRow) -> SearchHit {
            build_hit(row, "texte", 1000)
        }
    }

    fn row(id: i64) -> AnswerRow {
        AnswerRow {
            id,
            author_id: None,
            question_id: 9,
            question_title: None,
            submitted_at: None,
            text: Some("texte".to_string()),
            fragment: None,
            score: None,
        }
    }

    fn ids(page: &Page) -> Vec<i64> {
        page.items.iter().map(|h| h.id).collect()
    }

    #[test]
    fn test_mode_selection() {
        assert_eq!(SearchQuery::parse("").mode, SearchMode::Timeline);
        assert_eq!(SearchQuery::parse("   ").mode, SearchMode::Timeline);
        assert_eq!(SearchQuery::parse(" é ").mode, SearchMode::Timeline);
        assert_eq!(
            SearchQuery::parse(" Éc ").mode,
            SearchMode::Ranked("éc".to_string())
        );
        assert_eq!(SearchQuery::parse(" Éc ").text, "Éc");
    }

    #[test]
    fn test_normalized_empty_for_timeline() {
        assert_eq!(SearchQuery::parse("x").normalized(), "");
        assert_eq!(SearchQuery::parse("Vélo ").normalized(), "vélo");
    }

    #[test]
    fn test_page_invariant() {
        assert!(!Page::empty().has_next);
        let page = Page::new(vec![], Some("abc".to_string()));
        assert!(page.has_next && page.is_consistent());
    }

    #[test]
    fn test_cursor_minted_from_last_kept_row() {
        let searcher = Ids((1..=5).rev().collect());
        let first = fetch_page(&searcher, None, 2).unwrap();
        assert_eq!(ids(&first), vec![5, 4]);
        let cursor: TimelineCursor = resume(first.next_cursor.as_deref()).unwrap();
        assert_eq!(cursor.last_id, 4);

        let second = fetch_page(&searcher, Some(&cursor), 2).unwrap();
        assert_eq!(ids(&second), vec![3, 2]);
        let cursor: TimelineCursor = resume(second.next_cursor.as_deref()).unwrap();

        let last = fetch_page(&searcher, Some(&cursor), 2).unwrap();
        assert_eq!(ids(&last), vec![1]);
        assert!(!last.has_next);
        assert!(last.next_cursor.is_none());
    }

    #[test]
    fn test_exact_multiple_has_no_empty_trailing_page() {
        let searcher = Ids(vec![4, 3, 2, 1]);
        let first = fetch_page(&searcher, None, 2).unwrap();
        let cursor: TimelineCursor = resume(first.next_cursor.as_deref()).unwrap();
        let second = fetch_page(&searcher, Some(&cursor), 2).unwrap();
        assert_eq!(ids(&second), vec![2, 1]);
        assert!(!second.has_next);
    }

    #[test]
    fn test_resume_rejects_garbage() {
        assert!(resume::<TimelineCursor>(None).is_none());
        assert!(resume::<TimelineCursor>(Some("  ")).is_none());
        assert!(resume::<TimelineCursor>(Some("%%%")).is_none());
    }

    #[test]
    fn test_build_hit_fields() {
        let mut r = row(12);
        r.question_title = Some("Quel avenir pour l'école ?".to_string());
        let hit = build_hit(r, "Titre: Mon avis\nsur l'école", 1000);
        assert_eq!(hit.question_slug, "quel-avenir-pour-l-ecole");
        assert_eq!(hit.excerpt, "Mon avis sur l'école");
        assert!(!hit.truncated);
        assert!(hit.score.is_none());
    }

    #[test]
    fn test_build_hit_without_title() {
        let hit = build_hit(row(12), &"a".repeat(50), 10);
        assert_eq!(hit.question_slug, "question-9");
        assert_eq!(hit.excerpt, "aaaaaaaaaa");
        assert!(hit.truncated);
    }
}
