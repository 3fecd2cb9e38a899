use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lectern_core::time::parse_ts;
use lectern_core::types::{LessonStatus, ProgramStatus};
use rusqlite::{types::Type, Connection, Result, Row};

use crate::types::{Lesson, Program, Term};

/// Column order expected by [`row_to_program`].
pub(crate) const PROGRAM_COLUMNS: &str = "id, title, description, language_primary, status, \
     published_at, created_at, updated_at";

/// Column order expected by [`row_to_term`].
pub(crate) const TERM_COLUMNS: &str =
    "id, program_id, term_number, title, created_at, updated_at";

/// Column order expected by [`row_to_lesson`].
pub(crate) const LESSON_COLUMNS: &str = "id, term_id, lesson_number, title, content_type, \
     duration_ms, is_paid, content_urls, status, publish_at, published_at, created_at, updated_at";

/// Open a store connection the way every lectern process does: WAL so
/// readers never block the publisher, foreign keys on, and a bounded wait
/// when another connection holds the write lock.
pub fn open(path: &str, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn, busy_timeout)?;
    Ok(conn)
}

/// Apply connection settings to an already opened connection.
pub fn configure(conn: &Connection, busy_timeout: Duration) -> Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(())
}

/// Initialise all catalog tables. Safe to call on every startup,
/// CREATE IF NOT EXISTS makes it idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_programs_table(conn)?;
    create_terms_table(conn)?;
    create_lessons_table(conn)?;
    Ok(())
}

fn create_programs_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS programs (
            id                TEXT    NOT NULL PRIMARY KEY,
            title             TEXT    NOT NULL,
            description       TEXT,
            language_primary  TEXT    NOT NULL DEFAULT 'en',
            status            TEXT    NOT NULL DEFAULT 'draft'
                              CHECK (status IN ('draft', 'published')),
            published_at      TEXT,
            created_at        TEXT    NOT NULL,
            updated_at        TEXT    NOT NULL,
            CHECK ((status = 'published') = (published_at IS NOT NULL))
        ) STRICT;",
    )
}

fn create_terms_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS terms (
            id           TEXT    NOT NULL PRIMARY KEY,
            program_id   TEXT    NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
            term_number  INTEGER NOT NULL,
            title        TEXT    NOT NULL,
            created_at   TEXT    NOT NULL,
            updated_at   TEXT    NOT NULL,
            UNIQUE (program_id, term_number)
        ) STRICT;",
    )
}

fn create_lessons_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS lessons (
            id                TEXT    NOT NULL PRIMARY KEY,
            term_id           TEXT    NOT NULL REFERENCES terms(id) ON DELETE CASCADE,
            lesson_number     INTEGER NOT NULL,
            title             TEXT    NOT NULL,
            content_type      TEXT    NOT NULL DEFAULT 'article',
            duration_ms       INTEGER,
            is_paid           INTEGER NOT NULL DEFAULT 0,
            content_urls      TEXT    NOT NULL DEFAULT '{}',  -- JSON object
            status            TEXT    NOT NULL DEFAULT 'draft'
                              CHECK (status IN ('draft', 'scheduled', 'published')),
            publish_at        TEXT,
            published_at      TEXT,
            claimed_by        TEXT,   -- publisher worker id holding the claim
            claim_expires_at  TEXT,   -- claim is void at or after this instant
            created_at        TEXT    NOT NULL,
            updated_at        TEXT    NOT NULL,
            CHECK ((status = 'published') = (published_at IS NOT NULL)),
            UNIQUE (term_id, lesson_number)
        ) STRICT;

        -- Due-work scan: WHERE status = 'scheduled' AND publish_at <= ?
        CREATE INDEX IF NOT EXISTS idx_lessons_due ON lessons (status, publish_at);",
    )
}

// ── row mapping ──────────────────────────────────────────────────────────────

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

pub(crate) fn ts_at(row: &Row<'_>, idx: usize) -> Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw).ok_or_else(|| conversion_error(idx, format!("bad timestamp: {raw}")))
}

pub(crate) fn opt_ts_at(row: &Row<'_>, idx: usize) -> Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_ts(&raw)
            .map(Some)
            .ok_or_else(|| conversion_error(idx, format!("bad timestamp: {raw}"))),
        None => Ok(None),
    }
}

pub(crate) fn row_to_program(row: &Row<'_>) -> Result<Program> {
    let status_raw: String = row.get(4)?;
    let status = ProgramStatus::from_str(&status_raw).map_err(|e| conversion_error(4, e))?;
    Ok(Program {
        id: row.get::<_, String>(0)?.into(),
        title: row.get(1)?,
        description: row.get(2)?,
        language_primary: row.get(3)?,
        status,
        published_at: opt_ts_at(row, 5)?,
        created_at: ts_at(row, 6)?,
        updated_at: ts_at(row, 7)?,
    })
}

pub(crate) fn row_to_term(row: &Row<'_>) -> Result<Term> {
    Ok(Term {
        id: row.get::<_, String>(0)?.into(),
        program_id: row.get::<_, String>(1)?.into(),
        term_number: row.get(2)?,
        title: row.get(3)?,
        created_at: ts_at(row, 4)?,
        updated_at: ts_at(row, 5)?,
    })
}

pub(crate) fn row_to_lesson(row: &Row<'_>) -> Result<Lesson> {
    let status_raw: String = row.get(8)?;
    let status = LessonStatus::from_str(&status_raw).map_err(|e| conversion_error(8, e))?;
    // A malformed URL map should not hide the lesson; treat it as empty.
    let content_urls = serde_json::from_str(&row.get::<_, String>(7)?).unwrap_or_default();
    Ok(Lesson {
        id: row.get::<_, String>(0)?.into(),
        term_id: row.get::<_, String>(1)?.into(),
        lesson_number: row.get(2)?,
        title: row.get(3)?,
        content_type: row.get(4)?,
        duration_ms: row.get(5)?,
        is_paid: row.get::<_, i64>(6)? != 0,
        content_urls,
        status,
        publish_at: opt_ts_at(row, 9)?,
        published_at: opt_ts_at(row, 10)?,
        created_at: ts_at(row, 11)?,
        updated_at: ts_at(row, 12)?,
    })
}
