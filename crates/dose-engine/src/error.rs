//! Error types for dose-engine operations.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Invalid date range: end {end} is before start {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Unknown frequency: {0}")]
    UnknownFrequency(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("JSON parse error: {0}")]
    Json(String),

    /// The notification collaborator refused or failed an operation.
    /// The engine never retries; `retryable` tells the caller whether it may.
    #[error("Collaborator failure: {message}")]
    Collaborator { message: String, retryable: bool },
}

impl EngineError {
    /// Whether the caller may retry the failed operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Collaborator { retryable: true, .. })
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// A record left out of a batch computation, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Skipped {
    /// Id of the medication or appointment record, or `list[index]` for an
    /// entry without one.
    pub id: String,
    pub reason: String,
}

impl Skipped {
    /// Record a skipped entry and emit the diagnostic for it.
    pub(crate) fn warn(id: &str, error: &EngineError) -> Self {
        tracing::warn!(id, %error, "skipping record");
        Self {
            id: id.to_string(),
            reason: error.to_string(),
        }
    }
}
