use lectern_core::types::{LessonId, ProgramId};
use serde::Serialize;

/// A program published by the cascade, and the lesson that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeRecord {
    pub program_id: ProgramId,
    pub triggered_by: LessonId,
}

/// A claimed lesson whose transaction was rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub lesson_id: LessonId,
    pub error: String,
    /// False for data integrity problems that will fail again next tick.
    pub transient: bool,
}

/// Outcome of one tick, also the source of the per-tick log line.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    /// Lessons claimed by this tick.
    pub claimed: usize,
    /// Lessons this tick moved to published.
    pub published: usize,
    /// Programs this tick moved to published.
    pub cascades: Vec<CascadeRecord>,
    /// Claimed lessons found no longer ours or no longer scheduled.
    pub skipped: usize,
    pub failed: Vec<ItemFailure>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.claimed == 0
    }

    pub fn cascaded(&self) -> usize {
        self.cascades.len()
    }
}
