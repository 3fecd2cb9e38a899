use lectern_catalog::CatalogError;
use lectern_core::types::LessonId;
use thiserror::Error;

/// Errors that can occur within the publication engine.
#[derive(Debug, Error)]
pub enum PublisherError {
    /// Underlying SQLite error: busy/locked store, I/O, dropped file.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A lesson's ancestry does not resolve to a program.
    #[error("Lesson {lesson_id} references missing {missing} {id}")]
    DanglingParent {
        lesson_id: LessonId,
        missing: &'static str,
        id: String,
    },

    /// One item's transaction ran past its deadline and was rolled back.
    #[error("Transaction for lesson {lesson_id} exceeded {ms}ms")]
    Timeout { lesson_id: LessonId, ms: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Permission, lookup or lifecycle error from the manual publish path.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl PublisherError {
    /// Transient errors clear up on their own; the item is simply retried
    /// on a later tick. Everything else points at bad data or bad input.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PublisherError::Database(_) | PublisherError::Timeout { .. }
        )
    }

    /// Short label for the `kind` log field.
    pub fn kind(&self) -> &'static str {
        match self {
            PublisherError::Database(_) | PublisherError::Timeout { .. } => "transient",
            PublisherError::DanglingParent { .. } => "integrity",
            PublisherError::InvalidConfig(_) => "config",
            PublisherError::Catalog(_) => "catalog",
        }
    }
}

pub type Result<T> = std::result::Result<T, PublisherError>;
