//! Source error taxonomy and the transient-vs-fatal classification policy.

use thiserror::Error;

/// Errors that can occur when talking to the remote source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-layer failure (connection refused, reset, DNS, TLS).
    #[error("network error: {message}")]
    Network { message: String },

    /// The request did not complete within the transport deadline.
    #[error("request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The remote interface reported a fault for the request.
    #[error("remote fault {code}: {message}")]
    Fault { code: String, message: String },

    /// The response arrived but its row payload could not be decoded.
    #[error("failed to decode row batch: {message}")]
    Decode { message: String },

    /// The gateway's session with the source is unusable.
    #[error("session error: {message}")]
    Session { message: String },
}

impl SourceError {
    /// Create a network error.
    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    #[inline]
    pub fn timeout(elapsed_ms: u64) -> Self {
        Self::Timeout { elapsed_ms }
    }

    /// Create a remote fault error.
    #[inline]
    pub fn fault(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fault {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Create a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a session error.
    #[inline]
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Classify this error for retry policy.
    ///
    /// This is the single policy table that decides what gets retried:
    /// transport failures are transient (the page is marked hung and
    /// re-driven once per run); everything else is fatal (reported, not
    /// retried, since the cause is unknown). Workers consult this instead of
    /// pattern-matching error variants ad hoc.
    #[inline]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Network { .. } | Self::Timeout { .. } => FailureClass::Transient,
            Self::Fault { .. } | Self::Decode { .. } | Self::Session { .. } => FailureClass::Fatal,
        }
    }

    /// Check if this error is transient (retryable within the run).
    #[inline]
    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }
}

/// Retry class of a source failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network/timeout; the page is eligible for one in-run retry.
    Transient,
    /// Unknown cause; reported to the error log, never auto-retried in-run.
    Fatal,
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
