//! Engine error taxonomy.

use thiserror::Error;

use autoflow_core::DomainError;

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// Network failure or 5xx-equivalent; worth retrying.
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    #[error("{service} timed out")]
    Timeout { service: &'static str },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The collaborator understood the request and refused it.
    #[error("{service} rejected request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            service,
            message: message.into(),
        }
    }

    pub fn rejected(service: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            service,
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Failure of a single job attempt.
///
/// The processing loop retries both kinds until the attempt budget is spent;
/// the classification is carried for logging.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Retryable: network, timeout, collaborator outage.
    #[error("transient: {0}")]
    Transient(String),

    /// Non-retryable: malformed payload, missing records, rejected input.
    #[error("terminal: {0}")]
    Terminal(String),
}

impl HandlerError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::Terminal(msg.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<CollaboratorError> for HandlerError {
    fn from(err: CollaboratorError) -> Self {
        if err.is_transient() {
            Self::Transient(err.to_string())
        } else {
            Self::Terminal(err.to_string())
        }
    }
}

impl From<DomainError> for HandlerError {
    fn from(err: DomainError) -> Self {
        Self::Terminal(err.to_string())
    }
}

/// A job submission refused before it reached the queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("job rejected: {0}")]
    Rejected(#[from] DomainError),
}

/// Failure of one flow step. Never aborts the flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowStepError {
    #[error("could not enqueue reply: {0}")]
    Enqueue(#[from] QueueError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_errors_map_to_handler_kinds() {
        let outage: HandlerError = CollaboratorError::unavailable("generator", "502").into();
        assert!(outage.is_transient());

        let timeout: HandlerError = CollaboratorError::Timeout { service: "media" }.into();
        assert!(timeout.is_transient());

        let missing: HandlerError = CollaboratorError::not_found("user", "42").into();
        assert_eq!(missing, HandlerError::terminal("user not found: 42"));
    }

    #[test]
    fn domain_errors_are_terminal() {
        let err: HandlerError = DomainError::validation("bad").into();
        assert!(!err.is_transient());
    }
}
