#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::{DateTime, TimeZone, Utc};
use lectern_catalog::{db, CatalogStore, NewLesson};
use lectern_core::config::PublisherConfig;
use lectern_core::types::{LessonId, ProgramId, Role};
use lectern_publisher::PublisherEngine;
use rusqlite::Connection;
use tempfile::TempDir;

/// Tick time shared by the scenarios.
pub fn t() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
}

/// One on-disk store that several connections (and engines) can share.
pub struct Fixture {
    _dir: TempDir,
    pub path: PathBuf,
    pub store: CatalogStore,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lectern.db");
        let store = CatalogStore::new(Self::open_at(&path)).unwrap();
        Self {
            _dir: dir,
            path,
            store,
        }
    }

    fn open_at(path: &Path) -> Connection {
        db::open(path.to_str().unwrap(), StdDuration::from_secs(5)).unwrap()
    }

    pub fn open(&self) -> Connection {
        Self::open_at(&self.path)
    }

    pub fn engine(&self, worker: &str) -> PublisherEngine {
        self.engine_with(PublisherConfig {
            worker_id: Some(worker.to_string()),
            ..PublisherConfig::default()
        })
    }

    pub fn engine_with(&self, config: PublisherConfig) -> PublisherEngine {
        engine_at(&self.path, config)
    }

    /// A draft program with one term holding `schedule.len()` lessons,
    /// each scheduled at the given instant.
    pub fn program(&self, title: &str, schedule: &[DateTime<Utc>]) -> (ProgramId, Vec<LessonId>) {
        let program = self
            .store
            .create_program(Role::Editor, title, None, "en")
            .unwrap();
        let term = self
            .store
            .create_term(Role::Editor, &program.id, "Term 1")
            .unwrap();
        let lessons = schedule
            .iter()
            .enumerate()
            .map(|(i, at)| {
                let lesson = self
                    .store
                    .create_lesson(
                        Role::Editor,
                        &term.id,
                        NewLesson::titled(format!("{title} lesson {}", i + 1)),
                    )
                    .unwrap();
                self.store
                    .schedule_lesson(Role::Editor, &lesson.id, *at)
                    .unwrap();
                lesson.id
            })
            .collect();
        (program.id, lessons)
    }
}

/// Engine on its own connection to the store at `path`. Usable from any
/// thread, unlike the fixture itself.
pub fn engine_at(path: &Path, config: PublisherConfig) -> PublisherEngine {
    PublisherEngine::new(Fixture::open_at(path), config).unwrap()
}
