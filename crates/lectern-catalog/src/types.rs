use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use lectern_core::types::{LessonId, LessonStatus, ProgramId, ProgramStatus, TermId};
use serde::{Deserialize, Serialize};

/// Top-level container. Its status is derived from its lessons by the
/// publication cascade; editors never set it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub title: String,
    pub description: Option<String>,
    pub language_primary: String,
    pub status: ProgramStatus,
    /// Set once, on the first transition to `published`.
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Intermediate grouping between a program and its lessons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    pub id: TermId,
    pub program_id: ProgramId,
    /// 1-based position within the program, assigned on creation.
    pub term_number: u32,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The schedulable leaf.
///
/// `published_at` is non-null exactly when `status` is `Published`;
/// the schema enforces this with a CHECK constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub term_id: TermId,
    pub lesson_number: u32,
    pub title: String,
    pub content_type: String,
    pub duration_ms: Option<u64>,
    pub is_paid: bool,
    /// Language code → content URL. Stored as a JSON object.
    pub content_urls: BTreeMap<String, String>,
    pub status: LessonStatus,
    /// Meaningful only while `status` is `Scheduled`; kept afterwards.
    pub publish_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`crate::CatalogStore::create_lesson`].
#[derive(Debug, Clone, Default)]
pub struct NewLesson {
    pub title: String,
    /// Defaults to `"article"`.
    pub content_type: Option<String>,
    pub duration_ms: Option<u64>,
    pub is_paid: bool,
    pub content_urls: BTreeMap<String, String>,
}

impl NewLesson {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermWithLessons {
    pub term: Term,
    pub lessons: Vec<Lesson>,
}

/// A program with its full hierarchy, terms and lessons in number order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramDetail {
    pub program: Program,
    pub terms: Vec<TermWithLessons>,
}

/// Public view of a published program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProgram {
    pub id: ProgramId,
    pub title: String,
    pub description: Option<String>,
    pub language_primary: String,
}

/// Public view of a published lesson, resolved for one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogLesson {
    pub id: LessonId,
    pub title: String,
    pub duration_secs: Option<u64>,
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogTerm {
    pub title: String,
    pub term_number: u32,
    pub lessons: Vec<CatalogLesson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProgramDetail {
    pub program: CatalogProgram,
    pub terms: Vec<CatalogTerm>,
}
