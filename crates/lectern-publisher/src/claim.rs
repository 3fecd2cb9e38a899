//! Claim selection: turn "due" into "mine".
//!
//! SQLite has no row locks, so a claim is a lease stamped onto the row
//! (`claimed_by`, `claim_expires_at`) by a single `BEGIN IMMEDIATE`
//! statement. Rows under another worker's live lease are filtered out by
//! the same statement rather than waited on, which is what lets several
//! workers poll the same table and come away with disjoint batches.
//! A lease ends when the lesson is published, when its holder releases it
//! after a failure, or when it expires because the holder died.

use chrono::{DateTime, Duration, Utc};
use lectern_core::time::format_ts;
use lectern_core::types::LessonId;
use rusqlite::{params, Connection, TransactionBehavior};
use tracing::{debug, warn};

use crate::error::{PublisherError, Result};

/// Lease up to `limit` lessons that are scheduled at or before `now` and
/// not held by a live claim. Returns the claimed ids, earliest due first.
///
/// The claim commits immediately; the write lock is held for one statement.
/// A `ttl` that is not positive, or that pushes the expiry past the end of
/// the calendar, is rejected before anything is written.
pub fn claim_due(
    conn: &mut Connection,
    worker_id: &str,
    now: DateTime<Utc>,
    limit: u32,
    ttl: Duration,
) -> Result<Vec<LessonId>> {
    if ttl <= Duration::zero() {
        return Err(PublisherError::InvalidConfig(format!(
            "claim ttl must be positive, got {ttl}"
        )));
    }
    let expires = now.checked_add_signed(ttl).ok_or_else(|| {
        PublisherError::InvalidConfig(format!("claim ttl {ttl} overflows the clock"))
    })?;
    let now_str = format_ts(now);
    let expires = format_ts(expires);

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let ids = {
        let mut stmt = tx.prepare_cached(
            "UPDATE lessons
             SET claimed_by = ?1, claim_expires_at = ?2
             WHERE id IN (
                 SELECT id FROM lessons
                 WHERE status = 'scheduled'
                   AND publish_at IS NOT NULL AND publish_at <= ?3
                   AND (claim_expires_at IS NULL OR claim_expires_at <= ?3)
                 ORDER BY publish_at, id
                 LIMIT ?4)
             RETURNING id, publish_at",
        )?;
        let mut rows: Vec<(String, String)> = stmt
            .query_map(params![worker_id, expires, now_str, limit], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .collect::<rusqlite::Result<_>>()?;
        // RETURNING order is unspecified; restore due order for the caller.
        rows.sort_by(|a, b| (&a.1, &a.0).cmp(&(&b.1, &b.0)));
        rows.into_iter().map(|(id, _)| LessonId::from(id)).collect::<Vec<_>>()
    };
    tx.commit()?;

    debug!(worker_id, claimed = ids.len(), "claim pass complete");
    Ok(ids)
}

/// Drop this worker's claim on `id` so the lesson is eligible again on the
/// next tick. Returns false when the claim was already gone (published,
/// rescheduled, or expired and taken by someone else).
pub fn release_claim(conn: &Connection, id: &LessonId, worker_id: &str) -> Result<bool> {
    let n = conn.execute(
        "UPDATE lessons SET claimed_by = NULL, claim_expires_at = NULL
         WHERE id = ?1 AND claimed_by = ?2 AND status = 'scheduled'",
        params![id.as_str(), worker_id],
    )?;
    if n == 0 {
        warn!(lesson_id = %id, worker_id, "claim already gone on release");
    }
    Ok(n == 1)
}
