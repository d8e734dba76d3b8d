use std::sync::Arc;

use log::warn;

use super::highlight::find_highlights;
use super::{build_hit, SearchHit, SearchSettings, Searcher};
use crate::cursor::RankedCursor;
use crate::error::StoreError;
use crate::store::{AnswerRow, CorpusBackend, RankedFetch};

/// Full-text search ordered by `score DESC, id DESC`.
pub struct RankedSearch {
    corpus: Arc<dyn CorpusBackend>,
    match_expr: String,
    terms: Vec<String>,
    max_text_len: usize,
    preview_max_len: usize,
    fragment_tokens: u32,
}

impl RankedSearch {
    /// `match_expr` is the backend query, `terms` the words to highlight.
    pub fn new(
        corpus: Arc<dyn CorpusBackend>,
        match_expr: String,
        terms: Vec<String>,
        settings: &SearchSettings,
    ) -> Self {
        RankedSearch {
            corpus,
            match_expr,
            terms,
            max_text_len: settings.max_text_len,
            preview_max_len: settings.preview_max_len,
            fragment_tokens: settings.fragment_tokens,
        }
    }
}

impl Searcher for RankedSearch {
    type Cursor = RankedCursor;

    fn fetch(&self, after: Option<&RankedCursor>, limit: usize) -> Result<Vec<AnswerRow>, StoreError> {
        self.corpus.ranked_answers(&RankedFetch {
            match_expr: &self.match_expr,
            after: after.copied(),
            limit,
            max_text_len: self.max_text_len,
            fragment_tokens: self.fragment_tokens,
        })
    }

    fn cursor_after(&self, row: &AnswerRow) -> RankedCursor {
        let last_score = row.score.unwrap_or_else(|| {
            warn!("Ranked row {} has no score, resuming from 0", row.id);
            0.0
        });
        RankedCursor {
            last_id: row.id,
            last_score,
        }
    }

    fn to_hit(&self, mut row: AnswerRow) -> SearchHit {
        // No fragment from the backend: excerpt the start of the answer instead.
        let raw = match row.fragment.take().filter(|f| !f.trim().is_empty()) {
            Some(fragment) => fragment,
            None => row.text.take().unwrap_or_default(),
        };
        let mut hit = build_hit(row, &raw, self.preview_max_len);
        hit.highlights = find_highlights(&hit.excerpt, &self.terms);
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::fetch_page;
    use crate::store::corpus::fixtures::{answer, question};
    use crate::store::Store;
    use crate::text::{match_expression, query_terms};
    use std::collections::HashSet;

    fn searcher(store: Arc<Store>, query: &str) -> RankedSearch {
        let terms = query_terms(query);
        let expr = match_expression(&terms).unwrap();
        RankedSearch::new(store, expr, terms, &SearchSettings::default())
    }

    fn row(fragment: Option<&str>, text: Option<&str>) -> AnswerRow {
        AnswerRow {
            id: 1,
            author_id: Some(2),
            question_id: 3,
            question_title: Some("Mobilité".to_string()),
            submitted_at: Some("2024-02-01T09:00:00".to_string()),
            text: text.map(str::to_string),
            fragment: fragment.map(str::to_string),
            score: Some(2.5),
        }
    }

    #[test]
    fn test_hit_from_fragment_with_highlights() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let s = searcher(store, "vélo");
        let hit = s.to_hit(row(
            Some("Plus de pistes vélo … Plus de pistes vélo … en ville"),
            Some("texte complet"),
        ));
        assert_eq!(hit.excerpt, "Plus de pistes vélo … en ville");
        assert_eq!(hit.score, Some(2.5));
        assert_eq!(hit.question_slug, "mobilite");
        assert_eq!(hit.highlights.len(), 1);
        let h = &hit.highlights[0];
        assert_eq!(&hit.excerpt[h.start..h.end], "vélo");
    }

    #[test]
    fn test_hit_falls_back_to_text_prefix() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut settings = SearchSettings::default();
        settings.preview_max_len = 12;
        let terms = query_terms("bus");
        let s = RankedSearch::new(store, match_expression(&terms).unwrap(), terms, &settings);
        let hit = s.to_hit(row(Some("   "), Some("Des bus plus fréquents le soir")));
        assert_eq!(hit.excerpt, "Des bus plus");
        assert!(hit.truncated);
    }

    #[test]
    fn test_cursor_after_scoreless_row() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let s = searcher(store, "bus");
        let mut unscored = row(None, Some("bus"));
        unscored.score = None;
        assert_eq!(
            s.cursor_after(&unscored),
            RankedCursor {
                last_id: 1,
                last_score: 0.0,
            }
        );
        assert_eq!(s.cursor_after(&row(None, None)).last_score, 2.5);
    }

    #[test]
    fn test_hit_without_any_text() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let hit = searcher(store, "bus").to_hit(row(None, None));
        assert_eq!(hit.excerpt, "");
        assert!(hit.highlights.is_empty());
    }

    #[test]
    fn test_pages_cover_every_match_once() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        question(&store, 1, "Transports", "text");
        for id in 1..=23 {
            // a few score ties on purpose
            let text = format!("train {}", "mot ".repeat((id % 4) as usize));
            answer(&store, id, 1, &text);
        }
        let s = searcher(store, "train");

        let mut seen = HashSet::new();
        let mut after: Option<RankedCursor> = None;
        let mut previous: Option<(f64, i64)> = None;
        loop {
            let page = fetch_page(&s, after.as_ref(), 5).unwrap();
            for hit in &page.items {
                assert!(seen.insert(hit.id), "duplicate {}", hit.id);
                let key = (hit.score.unwrap(), hit.id);
                if let Some(prev) = previous {
                    assert!(key.0 < prev.0 || (key.0 == prev.0 && key.1 < prev.1));
                }
                previous = Some(key);
            }
            match page.next_cursor {
                Some(token) => after = Some(crate::cursor::decode(&token).unwrap()),
                None => break,
            }
        }
        assert_eq!(seen.len(), 23);
    }
}
