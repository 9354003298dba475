//! Structured error types for the analytics module.
//!
//! The analyzer is an offline tool: a missing or unreadable store is an
//! error, never an empty report.

use crate::history::HistoryError;

/// Errors from the accuracy analyzer.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// The history store could not be opened or read.
    #[error("History store unavailable: {0}")]
    Store(#[from] HistoryError),

    /// A caller-supplied argument is out of range.
    #[error("Invalid argument {name}: {message}")]
    InvalidArgument { name: &'static str, message: String },
}

/// Result type alias for analytics operations.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
