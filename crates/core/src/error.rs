//! Domain error model.

use thiserror::Error;

/// Result type used across the data model.
pub type DomainResult<T> = Result<T, DomainError>;

/// Data-model level error.
///
/// Keep this focused on deterministic failures (validation, decoding of
/// identifiers and type names). Collaborator and scheduling failures belong to
/// the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed payload).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A job type name is not one of the known job types.
    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    /// A job payload did not match the shape its job type requires.
    #[error("malformed payload for {job_type}: {reason}")]
    MalformedPayload { job_type: String, reason: String },
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn malformed(job_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            job_type: job_type.into(),
            reason: reason.into(),
        }
    }
}
