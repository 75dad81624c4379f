//! Error types for the SCIM mediator.

use thiserror::Error;

/// Result type alias using `MediatorError`.
pub type MediatorResult<T> = Result<T, MediatorError>;

/// Errors surfaced by the transport, directory client, mirror store,
/// batch processor and reconciler.
#[derive(Debug, Error)]
pub enum MediatorError {
    /// Cooperative shutdown is in progress.
    #[error("operation cancelled by shutdown signal")]
    Cancelled,

    /// The directory answered with a status that must not be retried.
    #[error("api request failed with non-retryable status {status}: {body}")]
    Terminal { status: u16, body: String },

    /// The directory answered successfully but the body could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Every attempt allowed by the retry policy failed.
    #[error("request failed after {attempts} attempt(s): {last_cause}")]
    Exhausted { attempts: u32, last_cause: String },

    /// A local precondition did not hold (missing record, bad payload, unknown task kind).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A mirror, checkpoint or audit file could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Invalid construction-time configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl MediatorError {
    /// Build a precondition error from anything displayable.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// Build a persistence error for a path-scoped I/O or encoding failure.
    pub fn persistence(what: &str, path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::Persistence(format!("failed to {what} {}: {err}", path.display()))
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the failure originated on the remote side of the transport.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Terminal { .. } | Self::MalformedResponse(_) | Self::Exhausted { .. }
        )
    }

    /// Whether the failure is local and was raised without touching the network.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }

    /// Persistence failures stop a run: losing mirror writes silently is worse than halting.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Config(_))
    }

    /// HTTP status carried by a terminal failure, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Terminal { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(MediatorError::Cancelled.is_cancelled());
        assert!(MediatorError::Terminal {
            status: 404,
            body: String::new()
        }
        .is_transport());
        assert!(MediatorError::Exhausted {
            attempts: 4,
            last_cause: "boom".into()
        }
        .is_transport());
        assert!(MediatorError::precondition("user missing").is_local());
        assert!(MediatorError::Persistence("disk full".into()).is_fatal());
        assert!(!MediatorError::precondition("x").is_fatal());
    }

    #[test]
    fn test_terminal_message_carries_status_and_body() {
        let err = MediatorError::Terminal {
            status: 400,
            body: "bad filter".into(),
        };
        assert_eq!(err.status(), Some(400));
        let msg = err.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("bad filter"));
    }

    #[test]
    fn test_exhausted_references_last_cause() {
        let err = MediatorError::Exhausted {
            attempts: 4,
            last_cause: "API returned status 503".into(),
        };
        assert_eq!(
            err.to_string(),
            "request failed after 4 attempt(s): API returned status 503"
        );
    }
}
