use thiserror::Error;

/// All catalog-layer errors. Kept separate from `CoreError` so an API layer
/// can map them to response codes without coupling layers.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The requested status change is not on the lifecycle graph, e.g.
    /// scheduling a lesson that is already published.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        CatalogError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
