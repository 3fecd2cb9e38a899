//! The lesson write of a publication: `scheduled → published` in one UPDATE.

use chrono::{DateTime, Utc};
use lectern_core::time::format_ts;
use lectern_core::types::{LessonId, TermId};
use rusqlite::{params, OptionalExtension, Transaction};
use serde::Serialize;

use crate::error::Result;

/// What the cascade needs from a lesson that was just published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedUnit {
    pub id: LessonId,
    pub term_id: TermId,
    pub title: String,
    pub published_at: DateTime<Utc>,
}

/// `scheduled → published` for a lesson this worker holds a claim on.
///
/// Status, `published_at` and the claim release land in one UPDATE, so no
/// reader ever sees one without the others. Returns `None` when the claim
/// no longer belongs to `worker_id` or the lesson left `scheduled` (it was
/// published manually, rescheduled, or another worker took over an expired
/// claim). `published_at` is therefore written at most once.
pub fn publish_claimed(
    tx: &Transaction<'_>,
    id: &LessonId,
    worker_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<PublishedUnit>> {
    let unit = tx
        .query_row(
            "UPDATE lessons
             SET status = 'published', published_at = ?3,
                 claimed_by = NULL, claim_expires_at = NULL, updated_at = ?3
             WHERE id = ?1 AND status = 'scheduled' AND claimed_by = ?2
             RETURNING id, term_id, title",
            params![id.as_str(), worker_id, format_ts(now)],
            |row| row_to_unit(row, now),
        )
        .optional()?;
    Ok(unit)
}

/// Manual path: `draft | scheduled → published` regardless of claims.
///
/// A worker holding a claim on the same lesson will find it gone and skip it.
pub fn publish_unclaimed(
    tx: &Transaction<'_>,
    id: &LessonId,
    now: DateTime<Utc>,
) -> Result<Option<PublishedUnit>> {
    let unit = tx
        .query_row(
            "UPDATE lessons
             SET status = 'published', published_at = ?2,
                 claimed_by = NULL, claim_expires_at = NULL, updated_at = ?2
             WHERE id = ?1 AND status IN ('draft', 'scheduled')
             RETURNING id, term_id, title",
            params![id.as_str(), format_ts(now)],
            |row| row_to_unit(row, now),
        )
        .optional()?;
    Ok(unit)
}

fn row_to_unit(row: &rusqlite::Row<'_>, now: DateTime<Utc>) -> rusqlite::Result<PublishedUnit> {
    Ok(PublishedUnit {
        id: row.get::<_, String>(0)?.into(),
        term_id: row.get::<_, String>(1)?.into(),
        title: row.get(2)?,
        published_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use lectern_catalog::db::init_db;
    use rusqlite::{Connection, TransactionBehavior};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    fn conn_with(status: &str, claimed_by: Option<&str>) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO programs (id, title, status, created_at, updated_at)
             VALUES ('p1', 'Program', 'draft', 'x', 'x');
             INSERT INTO terms (id, program_id, term_number, title, created_at, updated_at)
             VALUES ('t1', 'p1', 1, 'Term', 'x', 'x');",
        )
        .unwrap();
        let published_at = (status == "published").then(|| format_ts(t0() - Duration::days(1)));
        conn.execute(
            "INSERT INTO lessons (id, term_id, lesson_number, title, status, publish_at,
                                  published_at, claimed_by, created_at, updated_at)
             VALUES ('l1', 't1', 1, 'Lifetimes', ?1, ?2, ?3, ?4, 'x', 'x')",
            params![status, format_ts(t0()), published_at, claimed_by],
        )
        .unwrap();
        conn
    }

    fn row(conn: &Connection) -> (String, Option<String>, Option<String>) {
        conn.query_row(
            "SELECT status, published_at, claimed_by FROM lessons WHERE id = 'l1'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap()
    }

    #[test]
    fn claimed_lesson_is_published_and_released() {
        let mut conn = conn_with("scheduled", Some("w1"));
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .unwrap();
        let unit = publish_claimed(&tx, &LessonId::from("l1"), "w1", t0())
            .unwrap()
            .unwrap();
        tx.commit().unwrap();

        assert_eq!(unit.term_id, TermId::from("t1"));
        assert_eq!(unit.title, "Lifetimes");
        assert_eq!(
            row(&conn),
            ("published".to_string(), Some(format_ts(t0())), None)
        );
    }

    #[test]
    fn foreign_claim_is_not_published() {
        let mut conn = conn_with("scheduled", Some("w2"));
        let tx = conn.transaction().unwrap();
        assert!(publish_claimed(&tx, &LessonId::from("l1"), "w1", t0())
            .unwrap()
            .is_none());
        drop(tx);
        assert_eq!(row(&conn).0, "scheduled");
    }

    #[test]
    fn published_at_is_never_rewritten() {
        let mut conn = conn_with("published", Some("w1"));
        let before = row(&conn);
        let tx = conn.transaction().unwrap();
        assert!(publish_claimed(&tx, &LessonId::from("l1"), "w1", t0())
            .unwrap()
            .is_none());
        assert!(publish_unclaimed(&tx, &LessonId::from("l1"), t0())
            .unwrap()
            .is_none());
        tx.commit().unwrap();
        assert_eq!(row(&conn), before);
    }

    #[test]
    fn rollback_leaves_lesson_scheduled_and_claimed() {
        let mut conn = conn_with("scheduled", Some("w1"));
        {
            let tx = conn.transaction().unwrap();
            publish_claimed(&tx, &LessonId::from("l1"), "w1", t0())
                .unwrap()
                .unwrap();
            // dropped without commit
        }
        assert_eq!(
            row(&conn),
            ("scheduled".to_string(), None, Some("w1".to_string()))
        );
    }

    #[test]
    fn manual_publish_takes_drafts() {
        let mut conn = conn_with("draft", None);
        let tx = conn.transaction().unwrap();
        let unit = publish_unclaimed(&tx, &LessonId::from("l1"), t0()).unwrap();
        tx.commit().unwrap();
        assert!(unit.is_some());
        assert_eq!(row(&conn).0, "published");
    }
}
