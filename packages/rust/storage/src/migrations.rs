//! SQL migration definitions for the Bellgrid database.
//!
//! Applied in ascending version order on [`crate::Storage::open`]. Each
//! migration records its own version in `schema_migrations`.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial schema: schedule_entries",
            sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per class period. Times are school-local, ISO 8601 without offset.
CREATE TABLE IF NOT EXISTS schedule_entries (
    id         TEXT PRIMARY KEY,
    document   TEXT NOT NULL,
    name       TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time   TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_start ON schedule_entries(start_time);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
        },
        Migration {
            version: 2,
            description: "Document provenance",
            sql: r#"
CREATE TABLE IF NOT EXISTS documents (
    name         TEXT PRIMARY KEY,
    source_url   TEXT,
    content_hash TEXT NOT NULL,
    entry_count  INTEGER NOT NULL,
    ingested_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_document ON schedule_entries(document);

INSERT INTO schema_migrations (version) VALUES (2);
"#,
        },
        Migration {
            version: 3,
            description: "Academic year on document provenance",
            sql: r#"
ALTER TABLE documents ADD COLUMN academic_year_start INTEGER;

INSERT INTO schema_migrations (version) VALUES (3);
"#,
        },
    ]
}
