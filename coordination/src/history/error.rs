//! Structured error types for the history store.

use std::path::PathBuf;

use uuid::Uuid;

/// Errors from the routing history store.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// The store directory does not exist.
    #[error("History store not found at {path}")]
    StoreNotFound { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize history record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unknown route {0}")]
    UnknownRoute(Uuid),

    /// `accepted` is set at most once per route.
    #[error("Route {0} already has feedback")]
    DuplicateFeedback(Uuid),

    #[error("History writer lock poisoned")]
    LockPoisoned,
}

/// Result type alias for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;
