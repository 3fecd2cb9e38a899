use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};
use lectern_catalog::db::init_db;
use lectern_core::config::PublisherConfig;
use lectern_core::types::LessonId;
use rusqlite::{Connection, TransactionBehavior};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    cascade::{cascade, CascadeOutcome},
    claim::{claim_due, release_claim},
    error::{PublisherError, Result},
    report::{CascadeRecord, ItemFailure, TickReport},
    transition::publish_claimed,
};

/// Result of processing one claimed lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Published { cascade: CascadeOutcome },
    /// The claim was gone by the time the lesson was processed.
    Lost,
}

/// Scheduled publication engine: one per process, one connection each.
///
/// The engine holds no state between ticks beyond its configuration and
/// worker id; everything it acts on is read back from the store.
pub struct PublisherEngine {
    conn: Connection,
    config: PublisherConfig,
    claim_ttl: Duration,
    worker_id: String,
}

impl PublisherEngine {
    /// Create an engine over `conn`, initialising the catalog schema if needed.
    ///
    /// The connection's busy timeout is set to the transaction timeout, so a
    /// tick never waits longer than that for another writer.
    pub fn new(conn: Connection, config: PublisherConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| PublisherError::InvalidConfig(e.to_string()))?;
        let claim_ttl = i64::try_from(config.claim_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                PublisherError::InvalidConfig(format!(
                    "claim_ttl_secs {} is out of range",
                    config.claim_ttl_secs
                ))
            })?;
        init_db(&conn)?;
        conn.busy_timeout(StdDuration::from_millis(config.transaction_timeout_ms))?;

        let worker_id = config
            .worker_id
            .clone()
            .unwrap_or_else(|| format!("worker-{}", Uuid::new_v4()));
        Ok(Self {
            conn,
            config,
            claim_ttl,
            worker_id,
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Main event loop. Ticks every `interval_secs` until `shutdown`
    /// broadcasts `true` or its sender is dropped.
    ///
    /// Ticks run to completion on this task, so they never overlap and a
    /// shutdown request is only observed between ticks: an in-flight
    /// transaction always commits or rolls back first.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            worker_id = %self.worker_id,
            interval_secs = self.config.interval_secs,
            batch_size = self.config.batch_size,
            "publisher engine started"
        );

        let mut interval =
            tokio::time::interval(StdDuration::from_secs(self.config.interval_secs));
        // A slow tick pushes the next one back instead of firing a burst.
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        error!(
                            worker_id = %self.worker_id,
                            kind = e.kind(),
                            "publisher tick failed: {e}"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(worker_id = %self.worker_id, "publisher engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Run one cycle against the wall clock.
    pub fn tick(&mut self) -> Result<TickReport> {
        self.tick_at(Utc::now())
    }

    /// Run one cycle as of `now`: claim a batch, then publish and cascade
    /// each lesson in its own transaction.
    ///
    /// Only a failed claim fails the tick. Per-lesson failures are rolled
    /// back, logged and reported; their claims are released so the next
    /// tick retries them.
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> Result<TickReport> {
        let claimed = claim_due(
            &mut self.conn,
            &self.worker_id,
            now,
            self.config.batch_size,
            self.claim_ttl,
        )?;

        let mut report = TickReport {
            claimed: claimed.len(),
            ..TickReport::default()
        };
        if claimed.is_empty() {
            debug!(worker_id = %self.worker_id, "no lessons due");
            return Ok(report);
        }

        info!(worker_id = %self.worker_id, found = claimed.len(), "lessons due for publication");

        for id in claimed {
            match self.process(&id, now) {
                Ok(ItemOutcome::Published { cascade }) => {
                    report.published += 1;
                    info!(lesson_id = %id, program_id = %cascade.program_id(), "lesson published");
                    if let CascadeOutcome::Published(program_id) = cascade {
                        report.cascades.push(CascadeRecord {
                            program_id,
                            triggered_by: id,
                        });
                    }
                }
                Ok(ItemOutcome::Lost) => {
                    report.skipped += 1;
                    warn!(lesson_id = %id, "claim lost before publish, skipping");
                }
                Err(e) => {
                    error!(lesson_id = %id, kind = e.kind(), "lesson publication failed: {e}");
                    if let Err(release_err) = release_claim(&self.conn, &id, &self.worker_id) {
                        // The lease expires on its own; the lesson is only delayed.
                        warn!(lesson_id = %id, "claim release failed: {release_err}");
                    }
                    report.failed.push(ItemFailure {
                        lesson_id: id,
                        transient: e.is_transient(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            worker_id = %self.worker_id,
            found = report.claimed,
            published = report.published,
            cascaded = report.cascaded(),
            skipped = report.skipped,
            failed = report.failed.len(),
            "publisher tick complete"
        );
        Ok(report)
    }

    // --- private helpers ---------------------------------------------------

    /// Transition and cascade for one lesson, committed together or not at all.
    fn process(&mut self, id: &LessonId, now: DateTime<Utc>) -> Result<ItemOutcome> {
        let started = Instant::now();
        let deadline = StdDuration::from_millis(self.config.transaction_timeout_ms);

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(unit) = publish_claimed(&tx, id, &self.worker_id, now)? else {
            return Ok(ItemOutcome::Lost);
        };
        let cascade = cascade(&tx, &unit, now)?;

        // Past the deadline the claim may be close to expiry; give the work
        // back rather than commit late.
        if started.elapsed() > deadline {
            return Err(PublisherError::Timeout {
                lesson_id: id.clone(),
                ms: self.config.transaction_timeout_ms,
            });
        }
        tx.commit()?;
        Ok(ItemOutcome::Published { cascade })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lectern_core::time::format_ts;
    use rusqlite::params;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap()
    }

    fn engine() -> PublisherEngine {
        let config = PublisherConfig {
            worker_id: Some("test-worker".to_string()),
            ..PublisherConfig::default()
        };
        PublisherEngine::new(Connection::open_in_memory().unwrap(), config).unwrap()
    }

    fn insert_scheduled(engine: &PublisherEngine, id: &str, term: &str, at: DateTime<Utc>) {
        engine
            .connection()
            .execute(
                "INSERT INTO lessons (id, term_id, lesson_number, title, status, publish_at,
                                      created_at, updated_at)
                 VALUES (?1, ?2, (SELECT COUNT(*) + 1 FROM lessons), ?1, 'scheduled', ?3, 'x', 'x')",
                params![id, term, format_ts(at)],
            )
            .unwrap();
    }

    fn status(engine: &PublisherEngine, id: &str) -> String {
        engine
            .connection()
            .query_row("SELECT status FROM lessons WHERE id = ?1", [id], |r| r.get(0))
            .unwrap()
    }

    fn insert_hierarchy(engine: &PublisherEngine) {
        engine
            .connection()
            .execute_batch(
                "INSERT INTO programs (id, title, status, created_at, updated_at)
                 VALUES ('p1', 'P', 'draft', 'x', 'x');
                 INSERT INTO terms (id, program_id, term_number, title, created_at, updated_at)
                 VALUES ('t1', 'p1', 1, 'T', 'x', 'x');",
            )
            .unwrap();
    }

    #[test]
    fn invalid_config_is_rejected() {
        let broken = [
            PublisherConfig {
                batch_size: 0,
                ..PublisherConfig::default()
            },
            PublisherConfig {
                claim_ttl_secs: u64::MAX,
                ..PublisherConfig::default()
            },
            PublisherConfig {
                claim_ttl_secs: 10_000_000_000_000,
                ..PublisherConfig::default()
            },
        ];
        for config in broken {
            let err = PublisherEngine::new(Connection::open_in_memory().unwrap(), config)
                .err()
                .unwrap();
            assert!(matches!(err, PublisherError::InvalidConfig(_)));
        }
    }

    #[test]
    fn overrunning_item_is_rolled_back_and_released() {
        let config = PublisherConfig {
            worker_id: Some("slow-worker".to_string()),
            transaction_timeout_ms: 1,
            claim_ttl_secs: 1,
            ..PublisherConfig::default()
        };
        let mut engine =
            PublisherEngine::new(Connection::open_in_memory().unwrap(), config).unwrap();
        insert_hierarchy(&engine);
        insert_scheduled(&engine, "l1", "t1", t0());

        // Make the publish write itself slow: a few million row visits per
        // status change, far past a 1ms budget.
        engine
            .connection()
            .execute_batch(
                "CREATE TABLE pad (n INTEGER NOT NULL);
                 WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 150)
                 INSERT INTO pad (n) SELECT n FROM seq;
                 CREATE TRIGGER slow_publish AFTER UPDATE OF status ON lessons
                 BEGIN
                     SELECT COUNT(*) FROM pad a, pad b, pad c WHERE a.n + b.n + c.n > 0;
                 END;",
            )
            .unwrap();

        let report = engine.tick_at(t0()).unwrap();
        assert_eq!(report.claimed, 1);
        assert_eq!(report.published, 0);
        assert!(report.cascades.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].lesson_id, LessonId::from("l1"));
        assert!(report.failed[0].transient);

        let (lesson, claimed_by, program): (String, Option<String>, String) = engine
            .connection()
            .query_row(
                "SELECT l.status, l.claimed_by, p.status FROM lessons l, programs p
                 WHERE l.id = 'l1' AND p.id = 'p1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(lesson, "scheduled");
        assert_eq!(claimed_by, None);
        assert_eq!(program, "draft");

        // Released rather than left to expire: the next tick picks it up.
        engine
            .connection()
            .execute_batch("DROP TRIGGER slow_publish")
            .unwrap();
        let retry = engine.tick_at(t0()).unwrap();
        assert_eq!(retry.published, 1);
        assert_eq!(status(&engine, "l1"), "published");
    }

    #[test]
    fn worker_id_is_generated_when_unset() {
        let a = PublisherEngine::new(
            Connection::open_in_memory().unwrap(),
            PublisherConfig::default(),
        )
        .unwrap();
        let b = PublisherEngine::new(
            Connection::open_in_memory().unwrap(),
            PublisherConfig::default(),
        )
        .unwrap();
        assert!(a.worker_id().starts_with("worker-"));
        assert_ne!(a.worker_id(), b.worker_id());
    }

    #[test]
    fn integrity_failure_does_not_block_the_batch() {
        let mut engine = engine();
        insert_hierarchy(&engine);
        // Only reachable when the hierarchy was broken outside the catalog.
        engine
            .connection()
            .execute_batch("PRAGMA foreign_keys = OFF")
            .unwrap();
        insert_scheduled(&engine, "orphan", "no-such-term", t0() - Duration::seconds(2));
        insert_scheduled(&engine, "good", "t1", t0() - Duration::seconds(1));

        let report = engine.tick_at(t0()).unwrap();
        assert_eq!(report.claimed, 2);
        assert_eq!(report.published, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].lesson_id, LessonId::from("orphan"));
        assert!(!report.failed[0].transient);

        assert_eq!(status(&engine, "good"), "published");
        assert_eq!(status(&engine, "orphan"), "scheduled");

        // Released, so the next tick retries it (and fails the same way).
        let again = engine.tick_at(t0()).unwrap();
        assert_eq!(again.claimed, 1);
        assert_eq!(again.failed.len(), 1);
    }

    #[tokio::test]
    async fn run_loop_publishes_then_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lectern.db");
        let config = PublisherConfig {
            interval_secs: 1,
            ..PublisherConfig::default()
        };
        let engine = PublisherEngine::new(Connection::open(&path).unwrap(), config).unwrap();
        insert_hierarchy(&engine);
        insert_scheduled(&engine, "l1", "t1", Utc::now() - Duration::minutes(1));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            engine.run(rx).await;
        });
        // The first interval tick fires immediately.
        tokio::time::sleep(StdDuration::from_millis(300)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(StdDuration::from_secs(5), handle)
            .await
            .expect("engine did not stop")
            .unwrap();

        let check = Connection::open(&path).unwrap();
        let (lesson, program): (String, String) = check
            .query_row(
                "SELECT l.status, p.status FROM lessons l, programs p
                 WHERE l.id = 'l1' AND p.id = 'p1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!((lesson.as_str(), program.as_str()), ("published", "published"));
    }

    #[tokio::test]
    async fn run_loop_stops_when_sender_dropped() {
        let engine = engine();
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            engine.run(rx).await;
        });
        drop(tx);
        tokio::time::timeout(StdDuration::from_secs(5), handle)
            .await
            .expect("engine did not stop")
            .unwrap();
    }
}
