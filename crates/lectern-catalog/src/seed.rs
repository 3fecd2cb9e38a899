//! Demo data for local runs: one published program and one draft program
//! whose lessons exercise the publisher (one due, one in the future).
//! Fixed ids and INSERT OR IGNORE make reseeding a no-op.

use chrono::{DateTime, Duration, TimeZone, Utc};
use lectern_core::time::format_ts;
use rusqlite::{params, Connection};
use tracing::info;

use crate::error::Result;

/// Rows actually inserted by one [`seed_demo`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub programs: usize,
    pub terms: usize,
    pub lessons: usize,
}

/// Insert the demo catalog relative to `now`.
pub fn seed_demo(conn: &mut Connection, now: DateTime<Utc>) -> Result<SeedSummary> {
    let created = format_ts(now);
    let launched = Utc
        .with_ymd_and_hms(2023, 1, 1, 0, 0, 0)
        .single()
        .map(format_ts)
        .unwrap_or_else(|| created.clone());
    let due = format_ts(now - Duration::minutes(1));
    let future = format_ts(now + Duration::days(1));

    let tx = conn.transaction()?;
    let mut summary = SeedSummary::default();

    summary.programs += tx.execute(
        "INSERT OR IGNORE INTO programs
         (id, title, description, language_primary, status, published_at, created_at, updated_at)
         VALUES ('prog-001', 'Full Stack Web Development', 'Servers, browsers and the wire between.',
                 'en', 'published', ?1, ?1, ?1)",
        params![launched],
    )?;
    summary.programs += tx.execute(
        "INSERT OR IGNORE INTO programs
         (id, title, description, language_primary, status, published_at, created_at, updated_at)
         VALUES ('prog-002', 'Systems Programming', 'Memory, threads and syscalls.',
                 'en', 'draft', NULL, ?1, ?1)",
        params![created],
    )?;

    summary.terms += tx.execute(
        "INSERT OR IGNORE INTO terms (id, program_id, term_number, title, created_at, updated_at)
         VALUES ('term-001', 'prog-001', 1, 'Frontend Fundamentals', ?1, ?1),
                ('term-002', 'prog-002', 1, 'Processes and Memory', ?1, ?1)",
        params![created],
    )?;

    summary.lessons += tx.execute(
        "INSERT OR IGNORE INTO lessons
         (id, term_id, lesson_number, title, content_type, duration_ms, is_paid, content_urls,
          status, publish_at, published_at, created_at, updated_at)
         VALUES ('lesson-001', 'term-001', 1, 'Introduction to HTML', 'video', 600000, 1,
                 '{\"en\":\"https://example.com/video_en.mp4\",\"hi\":\"https://example.com/video_hi.mp4\"}',
                 'published', NULL, ?1, ?1, ?1)",
        params![launched],
    )?;
    summary.lessons += tx.execute(
        "INSERT OR IGNORE INTO lessons
         (id, term_id, lesson_number, title, content_type, status, publish_at, created_at, updated_at)
         VALUES ('lesson-002', 'term-002', 1, 'Virtual Memory', 'article', 'scheduled', ?1, ?3, ?3),
                ('lesson-003', 'term-002', 2, 'Threads and Locks', 'article', 'scheduled', ?2, ?3, ?3)",
        params![due, future, created],
    )?;

    tx.commit()?;
    info!(
        programs = summary.programs,
        terms = summary.terms,
        lessons = summary.lessons,
        "demo catalog seeded"
    );
    Ok(summary)
}
