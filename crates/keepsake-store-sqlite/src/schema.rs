//! SQL schema for the Keepsake SQLite archive.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Session summaries are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS session_summaries (
    session_id         TEXT PRIMARY KEY,
    subject_key        TEXT NOT NULL,
    interviewee_key    TEXT NOT NULL,
    seq                INTEGER NOT NULL,   -- 0-based position within the pair
    mode               TEXT NOT NULL,
    started_at         TEXT NOT NULL,      -- RFC 3339 UTC
    closed_at          TEXT NOT NULL,
    turn_count         INTEGER NOT NULL,
    themes             TEXT NOT NULL DEFAULT '[]',
    relationship       TEXT,               -- JSON RelationshipFact or NULL
    unresolved_threads TEXT NOT NULL DEFAULT '[]',
    conclusion         TEXT NOT NULL,
    recorded_at        TEXT NOT NULL,
    UNIQUE (subject_key, interviewee_key, seq)
);

PRAGMA user_version = 1;
";
