use rusqlite::Connection;

/// Corpus tables are owned by the ingestion pipeline in production; they are
/// created here only when missing so a fresh database is usable on its own.
pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS questions (
            id            INTEGER PRIMARY KEY,
            prompt        TEXT NOT NULL,
            type          TEXT NOT NULL DEFAULT 'text'
        );

        CREATE TABLE IF NOT EXISTS contributions (
            id            INTEGER PRIMARY KEY,
            author_id     INTEGER,
            submitted_at  TEXT
        );

        CREATE TABLE IF NOT EXISTS answers (
            id              INTEGER PRIMARY KEY,
            contribution_id INTEGER NOT NULL,
            question_id     INTEGER NOT NULL,
            text            TEXT,
            FOREIGN KEY (contribution_id) REFERENCES contributions(id),
            FOREIGN KEY (question_id) REFERENCES questions(id)
        );

        CREATE INDEX IF NOT EXISTS idx_answers_question
            ON answers (question_id);

        CREATE VIRTUAL TABLE IF NOT EXISTS answers_fts USING fts5(
            text,
            content = 'answers',
            content_rowid = 'id',
            tokenize = 'unicode61 remove_diacritics 2'
        );

        CREATE TRIGGER IF NOT EXISTS answers_fts_insert AFTER INSERT ON answers BEGIN
            INSERT INTO answers_fts (rowid, text) VALUES (new.id, new.text);
        END;

        CREATE TRIGGER IF NOT EXISTS answers_fts_delete AFTER DELETE ON answers BEGIN
            INSERT INTO answers_fts (answers_fts, rowid, text) VALUES ('delete', old.id, old.text);
        END;

        CREATE TRIGGER IF NOT EXISTS answers_fts_update AFTER UPDATE ON answers BEGIN
            INSERT INTO answers_fts (answers_fts, rowid, text) VALUES ('delete', old.id, old.text);
            INSERT INTO answers_fts (rowid, text) VALUES (new.id, new.text);
        END;

        CREATE TABLE IF NOT EXISTS search_stats (
            query_text    TEXT PRIMARY KEY,
            search_count  INTEGER NOT NULL DEFAULT 1,
            last_searched INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_search_stats_count
            ON search_stats (search_count DESC, last_searched DESC);

        CREATE TABLE IF NOT EXISTS search_cache (
            cache_key     TEXT PRIMARY KEY,
            results_json  TEXT NOT NULL,
            search_count  INTEGER NOT NULL DEFAULT 0,
            created_at    INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_search_cache_created_at
            ON search_cache (created_at);
        ",
    )?;
    Ok(())
}
