use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{CorpusBackend, RankedFetch, Store, TimelineFetch};
use crate::error::StoreError;

/// Answers to choice questions carry option codes, not prose.
const EXCLUDED_QUESTION_TYPES: &str = "'single_choice', 'multi_choice'";

/// An answer joined with its question and contribution, as read for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRow {
    pub id: i64,
    pub author_id: Option<i64>,
    pub question_id: i64,
    pub question_title: Option<String>,
    pub submitted_at: Option<String>,
    /// Answer text, already capped at the fetch's `max_text_len` characters.
    pub text: Option<String>,
    /// Matched fragments joined by `…`, ranked fetches only.
    pub fragment: Option<String>,
    /// Relevance, higher is better, ranked fetches only.
    pub score: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct QuestionRow {
    pub id: i64,
    pub prompt: String,
    pub question_type: String,
}

#[derive(Debug, Clone)]
pub struct ContributionRow {
    pub id: i64,
    pub author_id: Option<i64>,
    pub submitted_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAnswer {
    pub id: i64,
    pub contribution_id: i64,
    pub question_id: i64,
    pub text: Option<String>,
}

fn read_answer(row: &Row<'_>, ranked: bool) -> rusqlite::Result<AnswerRow> {
    Ok(AnswerRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        question_id: row.get(2)?,
        question_title: row.get(3)?,
        submitted_at: row.get(4)?,
        text: row.get(5)?,
        fragment: None,
        score: if ranked { row.get(6)? } else { None },
    })
}

/// Fill `fragment` for the rows of one page. snippet() is evaluated per kept
/// row rather than for every match of the expression.
fn attach_fragments(
    conn: &Connection,
    rows: &mut [AnswerRow],
    match_expr: &str,
    fragment_tokens: i64,
) -> rusqlite::Result<()> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = conn.prepare(
        "SELECT snippet(answers_fts, 0, '', '', '…', :fragment_tokens)
         FROM answers_fts
         WHERE answers_fts MATCH :match_expr AND rowid = :id",
    )?;
    for row in rows.iter_mut() {
        row.fragment = stmt
            .query_row(
                rusqlite::named_params! {
                    ":fragment_tokens": fragment_tokens,
                    ":match_expr": match_expr,
                    ":id": row.id,
                },
                |r| r.get(0),
            )
            .optional()?
            .flatten();
    }
    Ok(())
}

impl Store {
    pub fn upsert_question(&self, question: &QuestionRow) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO questions (id, prompt, type) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET prompt = excluded.prompt, type = excluded.type",
            (question.id, &question.prompt, &question.question_type),
        )?;
        Ok(())
    }

    pub fn upsert_contribution(&self, contribution: &ContributionRow) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO contributions (id, author_id, submitted_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET
                author_id = excluded.author_id,
                submitted_at = excluded.submitted_at",
            (
                contribution.id,
                contribution.author_id,
                contribution.submitted_at.as_deref(),
            ),
        )?;
        Ok(())
    }

    /// Insert answers in one transaction; the FTS triggers index them.
    pub fn insert_answers_batch(&self, answers: &[NewAnswer]) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO answers (id, contribution_id, question_id, text)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for answer in answers {
                stmt.execute((
                    answer.id,
                    answer.contribution_id,
                    answer.question_id,
                    answer.text.as_deref(),
                ))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn answer_count(&self) -> Result<i64, StoreError> {
        let count = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM answers", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Re-derive the FTS index from the answers table.
    pub fn rebuild_fts_index(&self) -> Result<(), StoreError> {
        self.conn()?
            .execute("INSERT INTO answers_fts (answers_fts) VALUES ('rebuild')", [])?;
        Ok(())
    }
}

impl CorpusBackend for Store {
    fn ranked_answers(&self, fetch: &RankedFetch<'_>) -> Result<Vec<AnswerRow>, StoreError> {
        // The CTE is materialized so bm25() runs inside the FTS scan and the
        // keyset predicate compares the stored, rounded score.
        let cursor_clause = if fetch.after.is_some() {
            "AND (ranked.score < :last_score
                  OR (ranked.score = :last_score AND ranked.id < :last_id))"
        } else {
            ""
        };

        let sql = format!(
            "WITH ranked AS MATERIALIZED (
                SELECT answers_fts.rowid AS id,
                       ROUND(-bm25(answers_fts), 6) AS score
                FROM answers_fts
                WHERE answers_fts MATCH :match_expr
             )
             SELECT a.id, c.author_id, a.question_id, q.prompt, c.submitted_at,
                    substr(a.text, 1, :max_text_len), ranked.score
             FROM ranked
             JOIN answers a ON a.id = ranked.id
             JOIN contributions c ON c.id = a.contribution_id
             JOIN questions q ON q.id = a.question_id
             WHERE q.type NOT IN ({})
             {}
             ORDER BY ranked.score DESC, ranked.id DESC
             LIMIT :limit",
            EXCLUDED_QUESTION_TYPES, cursor_clause
        );

        let max_text_len = fetch.max_text_len as i64;
        let limit = fetch.limit as i64;
        let mut params: Vec<(&str, &dyn ToSql)> = vec![
            (":match_expr", &fetch.match_expr),
            (":max_text_len", &max_text_len),
            (":limit", &limit),
        ];
        if let Some(cursor) = &fetch.after {
            params.push((":last_score", &cursor.last_score));
            params.push((":last_id", &cursor.last_id));
        }

        let conn = self.conn()?;
        let mut rows = {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params.as_slice(), |row| read_answer(row, true))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };
        attach_fragments(
            &conn,
            &mut rows,
            fetch.match_expr,
            i64::from(fetch.fragment_tokens),
        )?;
        Ok(rows)
    }

    fn timeline_answers(&self, fetch: &TimelineFetch) -> Result<Vec<AnswerRow>, StoreError> {
        let cursor_clause = if fetch.after.is_some() {
            "AND a.id < :last_id"
        } else {
            ""
        };

        let sql = format!(
            "SELECT a.id, c.author_id, a.question_id, q.prompt, c.submitted_at,
                    substr(a.text, 1, :max_text_len)
             FROM answers a
             JOIN contributions c ON c.id = a.contribution_id
             JOIN questions q ON q.id = a.question_id
             WHERE a.text IS NOT NULL
               AND trim(a.text) <> ''
               AND length(trim(a.text)) >= :min_len
               AND q.type NOT IN ({})
               {}
             ORDER BY a.id DESC
             LIMIT :limit",
            EXCLUDED_QUESTION_TYPES, cursor_clause
        );

        let min_len = fetch.min_content_len as i64;
        let max_text_len = fetch.max_text_len as i64;
        let limit = fetch.limit as i64;
        let mut params: Vec<(&str, &dyn ToSql)> = vec![
            (":max_text_len", &max_text_len),
            (":min_len", &min_len),
            (":limit", &limit),
        ];
        if let Some(cursor) = &fetch.after {
            params.push((":last_id", &cursor.last_id));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params.as_slice(), |row| read_answer(row, false))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn question(store: &Store, id: i64, prompt: &str, question_type: &str) {
        store
            .upsert_question(&QuestionRow {
                id,
                prompt: prompt.to_string(),
                question_type: question_type.to_string(),
            })
            .unwrap();
    }

    /// One contribution per answer, authored by `1000 + id`.
    pub fn answer(store: &Store, id: i64, question_id: i64, text: &str) {
        store
            .upsert_contribution(&ContributionRow {
                id,
                author_id: Some(1000 + id),
                submitted_at: Some(format!("2024-01-{:02}T10:00:00", (id % 28) + 1)),
            })
            .unwrap();
        store
            .insert_answers_batch(&[NewAnswer {
                id,
                contribution_id: id,
                question_id,
                text: Some(text.to_string()),
            }])
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{answer, question};
    use super::*;
    use crate::cursor::{RankedCursor, TimelineCursor};

    fn ranked<'a>(expr: &'a str, after: Option<RankedCursor>, limit: usize) -> RankedFetch<'a> {
        RankedFetch {
            match_expr: expr,
            after,
            limit,
            max_text_len: 20_000,
            fragment_tokens: 16,
        }
    }

    fn timeline(after: Option<TimelineCursor>, limit: usize) -> TimelineFetch {
        TimelineFetch {
            after,
            limit,
            min_content_len: 10,
            max_text_len: 20_000,
        }
    }

    fn seeded() -> Store {
        let store = Store::open_in_memory().unwrap();
        question(&store, 1, "Que pensez-vous des transports ?", "text");
        question(&store, 2, "Choix du mode", "single_choice");
        store
    }

    #[test]
    fn test_insert_and_count() {
        let store = seeded();
        answer(&store, 1, 1, "Les transports en commun sont rares.");
        answer(&store, 2, 1, "Plus de bus le soir.");
        assert_eq!(store.answer_count().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_insert_ignored() {
        let store = seeded();
        answer(&store, 1, 1, "premier texte");
        answer(&store, 1, 1, "second texte");
        assert_eq!(store.answer_count().unwrap(), 1);
    }

    #[test]
    fn test_ranked_matches_accent_insensitive() {
        let store = seeded();
        answer(&store, 1, 1, "Mon expérience des transports est mauvaise.");
        answer(&store, 2, 1, "Rien à signaler.");
        let rows = store
            .ranked_answers(&ranked("\"experience\"", None, 10))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 1);
        assert!(rows[0].score.unwrap() > 0.0);
        assert!(rows[0].fragment.as_deref().unwrap().contains("expérience"));
        assert_eq!(
            rows[0].question_title.as_deref(),
            Some("Que pensez-vous des transports ?")
        );
        assert_eq!(rows[0].author_id, Some(1001));
    }

    #[test]
    fn test_ranked_order_and_keyset() {
        let store = seeded();
        answer(&store, 1, 1, "bus");
        answer(&store, 2, 1, "bus bus bus et encore des bus");
        answer(&store, 3, 1, "bus");
        answer(&store, 4, 1, "un long texte qui parle vaguement du bus parmi beaucoup d'autres mots");

        let all = store.ranked_answers(&ranked("\"bus\"", None, 10)).unwrap();
        assert_eq!(all.len(), 4);
        for pair in all.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let (sa, sb) = (a.score.unwrap(), b.score.unwrap());
            assert!(sa > sb || (sa == sb && a.id > b.id));
        }

        let first = &all[0];
        let rest = store
            .ranked_answers(&ranked(
                "\"bus\"",
                Some(RankedCursor {
                    last_id: first.id,
                    last_score: first.score.unwrap(),
                }),
                10,
            ))
            .unwrap();
        let rest_ids: Vec<i64> = rest.iter().map(|r| r.id).collect();
        let expected: Vec<i64> = all[1..].iter().map(|r| r.id).collect();
        assert_eq!(rest_ids, expected);
    }

    #[test]
    fn test_fragments_follow_each_page() {
        let store = seeded();
        for id in 1..=6 {
            answer(
                &store,
                id,
                1,
                &format!("réponse numéro {id} : le tramway devrait passer plus souvent"),
            );
        }
        let first = store.ranked_answers(&ranked("\"tramway\"", None, 3)).unwrap();
        assert_eq!(first.len(), 3);
        let last = first.last().unwrap();
        let second = store
            .ranked_answers(&ranked(
                "\"tramway\"",
                Some(RankedCursor {
                    last_id: last.id,
                    last_score: last.score.unwrap(),
                }),
                3,
            ))
            .unwrap();
        assert_eq!(second.len(), 3);
        for row in first.iter().chain(second.iter()) {
            let fragment = row.fragment.as_deref().unwrap();
            assert!(fragment.contains("tramway"));
            assert!(fragment.contains(&format!("numéro {}", row.id)));
        }
    }

    #[test]
    fn test_ranked_excludes_choice_questions() {
        let store = seeded();
        answer(&store, 1, 2, "velo");
        answer(&store, 2, 1, "velo electrique");
        let rows = store.ranked_answers(&ranked("\"velo\"", None, 10)).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 2);
    }

    #[test]
    fn test_timeline_filters_and_orders() {
        let store = seeded();
        answer(&store, 1, 1, "court");
        answer(&store, 2, 1, "assez long pour compter");
        answer(&store, 3, 1, "          ");
        answer(&store, 4, 2, "réponse à choix assez longue");
        answer(&store, 5, 1, "encore une réponse lisible");

        let rows = store.timeline_answers(&timeline(None, 10)).unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 2]);
        assert!(rows.iter().all(|r| r.score.is_none() && r.fragment.is_none()));

        let after = store
            .timeline_answers(&timeline(Some(TimelineCursor { last_id: 5 }), 10))
            .unwrap();
        assert_eq!(after.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_text_capped_in_sql() {
        let store = seeded();
        answer(&store, 1, 1, &"abcdefghij".repeat(10));
        let mut fetch = timeline(None, 10);
        fetch.max_text_len = 15;
        let rows = store.timeline_answers(&fetch).unwrap();
        assert_eq!(rows[0].text.as_deref().unwrap().chars().count(), 15);
    }

    #[test]
    fn test_rebuild_index_keeps_matches() {
        let store = seeded();
        answer(&store, 1, 1, "participation citoyenne");
        store.rebuild_fts_index().unwrap();
        let rows = store
            .ranked_answers(&ranked("\"citoyenne\"", None, 10))
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}
