//! Transport error types and result alias.
//!
//! Implementations of [`ApiTransport`](crate::ApiTransport) map their client
//! library errors onto these variants.
//!
//! # Example
//!
//! ```
//! use warden_transport::{TransportError, TransportResult};
//!
//! fn fetch(path: &str) -> TransportResult<serde_json::Value> {
//!     Err(TransportError::status(path, 503, "service unavailable"))
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors produced by an [`ApiTransport`](crate::ApiTransport).
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions must
/// include a wildcard arm (`_ =>`).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The request never produced a response (DNS, refused connection, TLS).
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
        /// The underlying error that caused this connection failure.
        #[source]
        source: Option<BoxError>,
    },

    /// The server answered with a non-success status code.
    #[error("Request to {path} failed with status {status}: {message}")]
    Status {
        /// Request path.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Server-provided error message.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the decoding failure.
        message: String,
        /// The underlying error that caused decoding to fail.
        #[source]
        source: Option<BoxError>,
    },

    /// The request exceeded the transport's own time limit.
    #[error("Request timeout")]
    Timeout,
}

impl TransportError {
    /// Creates a new `Connection` error with the given message.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection { message: message.into(), source: None }
    }

    /// Creates a new `Connection` error with a message and source error.
    #[must_use]
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Status` error.
    #[must_use]
    pub fn status(path: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Status { path: path.into(), status, message: message.into() }
    }

    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into(), source: None }
    }

    /// Creates a new `Serialization` error with a message and source error.
    #[must_use]
    pub fn serialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Serialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout() -> Self {
        Self::Timeout
    }

    /// Returns the HTTP status code if the server answered at all.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::connection("connection refused");
        assert_eq!(err.to_string(), "Connection error: connection refused");

        let err = TransportError::status("/v1/rbac/policy", 503, "unavailable");
        assert_eq!(
            err.to_string(),
            "Request to /v1/rbac/policy failed with status 503: unavailable"
        );

        assert_eq!(TransportError::timeout().to_string(), "Request timeout");
    }

    #[test]
    fn test_status_code() {
        assert_eq!(TransportError::status("/x", 404, "missing").status_code(), Some(404));
        assert_eq!(TransportError::timeout().status_code(), None);
    }

    #[test]
    fn test_source_chain_preserved() {
        let inner = TransportError::timeout();
        let err = TransportError::connection_with_source("upstream failed", inner);
        let source = err.source().expect("source must be preserved");
        assert_eq!(source.to_string(), "Request timeout");
    }

    #[test]
    fn test_serialization_without_source() {
        let err = TransportError::serialization("not json");
        assert!(err.source().is_none());
        assert_eq!(err.to_string(), "Serialization error: not json");
    }
}
