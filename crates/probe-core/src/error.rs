//! Unified error types for UI-probe

use thiserror::Error;

/// Unified error type for all probe operations
#[derive(Error, Debug)]
pub enum ProbeError {
    // Form inference errors
    #[error("Form inference failed: {0}")]
    FormInference(String),

    // Resolution errors
    #[error("Field resolution failed: {0}")]
    FieldResolution(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Stale element: {0}")]
    StaleElement(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    // Driver errors
    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Assertion failed: {0}")]
    Assertion(String),

    // Execution errors
    #[error("Sequence aborted at step {index}: {reason}")]
    SequenceAborted { index: usize, reason: String },

    #[error("Run cancelled: {0}")]
    Cancelled(String),

    // Language-model errors
    #[error("API error: {0}")]
    Api(String),

    #[error("API limit: {0}")]
    ApiLimit(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using ProbeError
pub type Result<T> = std::result::Result<T, ProbeError>;

impl ProbeError {
    /// Failure class for retry decisions. Typed driver errors map directly;
    /// anything else is classified by its message.
    pub fn failure_kind(&self) -> crate::FailureKind {
        use crate::FailureKind;
        match self {
            ProbeError::ElementNotFound(_) => FailureKind::NotFound,
            ProbeError::StaleElement(_) => FailureKind::StaleElement,
            ProbeError::Timeout(_) => FailureKind::Timeout,
            other => FailureKind::classify(&other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FailureKind;

    #[test]
    fn test_failure_kind_from_variant() {
        assert_eq!(
            ProbeError::ElementNotFound("#x".into()).failure_kind(),
            FailureKind::NotFound
        );
        assert_eq!(
            ProbeError::Browser("Node is detached from document".into()).failure_kind(),
            FailureKind::StaleElement
        );
        assert_eq!(
            ProbeError::Navigation("net::ERR_NAME_NOT_RESOLVED".into()).failure_kind(),
            FailureKind::Unknown
        );
    }
}
