use std::sync::Arc;

use super::{build_hit, SearchHit, SearchSettings, Searcher};
use crate::cursor::TimelineCursor;
use crate::error::StoreError;
use crate::store::{AnswerRow, CorpusBackend, TimelineFetch};

/// Newest readable answers first, ordered by `id DESC`.
pub struct TimelineSearch {
    corpus: Arc<dyn CorpusBackend>,
    min_content_len: usize,
    max_text_len: usize,
    preview_max_len: usize,
}

impl TimelineSearch {
    pub fn new(corpus: Arc<dyn CorpusBackend>, settings: &SearchSettings) -> Self {
        TimelineSearch {
            corpus,
            min_content_len: settings.min_content_len,
            max_text_len: settings.max_text_len,
            preview_max_len: settings.preview_max_len,
        }
    }
}

impl Searcher for TimelineSearch {
    type Cursor = TimelineCursor;

    fn fetch(&self, after: Option<&TimelineCursor>, limit: usize) -> Result<Vec<AnswerRow>, StoreError> {
        self.corpus.timeline_answers(&TimelineFetch {
            after: after.copied(),
            limit,
            min_content_len: self.min_content_len,
            max_text_len: self.max_text_len,
        })
    }

    fn cursor_after(&self, row: &AnswerRow) -> TimelineCursor {
        TimelineCursor { last_id: row.id }
    }

    fn to_hit(&self, mut row: AnswerRow) -> SearchHit {
        let text = row.text.take().unwrap_or_default();
        build_hit(row, &text, self.preview_max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::fetch_page;
    use crate::store::corpus::fixtures::{answer, question};
    use crate::store::Store;

    const LONG: &str = "Une réponse suffisamment longue pour apparaître dans le fil.";

    fn store() -> Arc<Store> {
        let store = Arc::new(Store::open_in_memory().unwrap());
        question(&store, 1, "Votre avis", "text");
        store
    }

    #[test]
    fn test_walks_every_readable_answer_newest_first() {
        let store = store();
        for id in 1..=11 {
            answer(&store, id, 1, &format!("{LONG} ({id})"));
        }
        answer(&store, 12, 1, "trop court");
        let s = TimelineSearch::new(store, &SearchSettings::default());

        let mut ids = Vec::new();
        let mut after: Option<TimelineCursor> = None;
        loop {
            let page = fetch_page(&s, after.as_ref(), 4).unwrap();
            assert!(page.is_consistent());
            ids.extend(page.items.iter().map(|h| h.id));
            match page.next_cursor {
                Some(token) => after = Some(crate::cursor::decode(&token).unwrap()),
                None => break,
            }
        }
        assert_eq!(ids, (1..=11).rev().collect::<Vec<i64>>());
    }

    #[test]
    fn test_hits_have_no_score() {
        let store = store();
        answer(&store, 1, 1, LONG);
        let s = TimelineSearch::new(store, &SearchSettings::default());
        let page = fetch_page(&s, None, 20).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.items[0].score.is_none());
        assert!(page.items[0].highlights.is_empty());
        assert_eq!(page.items[0].excerpt, LONG);
    }
}
