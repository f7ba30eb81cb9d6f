//! Error types for the `semdoc-rag` crate.

use std::fmt;

use thiserror::Error;

/// Errors surfaced by the document store and the QA pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// The caller supplied a value that can never succeed (empty text, bad filter, `top_k == 0`).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The requested document does not exist.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The embedding or generation provider refused the request.
    #[error("Provider rejected request ({provider}): {message}")]
    ProviderRejected {
        /// The provider that refused the request.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding or generation provider stayed unreachable after all retries.
    #[error("Provider unavailable ({provider}): {message}")]
    ProviderUnavailable {
        /// The provider that could not be reached.
        provider: String,
        /// The last failure observed.
        message: String,
    },

    /// The vector index backend could not be reached.
    #[error("Vector index unavailable ({backend}): {message}")]
    IndexUnavailable {
        /// The vector index backend that failed.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An unexpected failure inside the pipeline.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RagError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::ProviderRejected { .. } => "provider_rejected",
            Self::ProviderUnavailable { .. } => "provider_unavailable",
            Self::IndexUnavailable { .. } => "index_unavailable",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    pub(crate) fn index_unavailable(backend: &str, message: impl fmt::Display) -> Self {
        Self::IndexUnavailable { backend: backend.to_string(), message: message.to_string() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

/// How a provider classified a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Timeouts, connection errors, rate limits and 5xx responses. Worth retrying.
    Transient,
    /// Malformed, unauthorized or over-quota requests. Retrying cannot help.
    Rejected,
}

/// A failed call to an embedding or generation provider.
///
/// Providers translate their wire responses into either a value or one of
/// these before anything reaches the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct ProviderFailure {
    /// Whether the failure is retryable.
    pub kind: FailureKind,
    /// A description of the failure.
    pub message: String,
}

impl ProviderFailure {
    /// A retryable failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Self { kind: FailureKind::Transient, message: message.into() }
    }

    /// A non-retryable failure.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self { kind: FailureKind::Rejected, message: message.into() }
    }

    /// Classify an HTTP status code: 408, 429 and 5xx are transient, everything else is rejected.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == 408 || status == 429 || (500..600).contains(&status) {
            Self::transient(message)
        } else {
            Self::rejected(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

/// Result of a single provider call.
pub type ProviderResult<T> = std::result::Result<T, ProviderFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(ProviderFailure::from_status(500, "boom").is_transient());
        assert!(ProviderFailure::from_status(503, "busy").is_transient());
        assert!(ProviderFailure::from_status(429, "slow down").is_transient());
        assert!(ProviderFailure::from_status(408, "timeout").is_transient());
        assert!(!ProviderFailure::from_status(400, "bad").is_transient());
        assert!(!ProviderFailure::from_status(401, "who").is_transient());
        assert!(!ProviderFailure::from_status(403, "quota").is_transient());
    }

    #[test]
    fn error_kinds_are_stable() {
        assert_eq!(RagError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(RagError::index_unavailable("memory", "down").kind(), "index_unavailable");
    }
}
