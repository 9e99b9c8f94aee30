//! Authorization error types.

use thiserror::Error;
use warden_transport::TransportError;

use crate::policy::AuthorizationRequest;

/// Errors raised while loading policies or evaluating authorization checks.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`. Downstream match expressions must
/// include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthzError {
    /// The subject belongs to a different organization than the request targets.
    #[error("Tenancy mismatch: subject belongs to '{subject}', request targets '{requested}'")]
    TenancyMismatch {
        /// Organization the subject belongs to.
        subject: String,
        /// Organization named by the request (empty when the request named none).
        requested: String,
    },

    /// No role or scope of the subject grants the requested action.
    #[error("Permission denied: {request}")]
    PermissionDenied {
        /// The request that was denied.
        request: AuthorizationRequest,
    },

    /// The policy endpoint answered with a body that is not a policy document.
    #[error("Invalid policy document: {0}")]
    InvalidPolicy(String),

    /// Fetching the policy document failed.
    #[error("Policy fetch failed: {0}")]
    Transport(
        /// The transport failure, propagated uninterpreted.
        #[source]
        TransportError,
    ),
}

impl AuthzError {
    /// Creates a new `TenancyMismatch` error.
    #[must_use]
    pub fn tenancy_mismatch(subject: impl Into<String>, requested: impl Into<String>) -> Self {
        Self::TenancyMismatch { subject: subject.into(), requested: requested.into() }
    }

    /// Creates a new `PermissionDenied` error for a request.
    #[must_use]
    pub fn permission_denied(request: &AuthorizationRequest) -> Self {
        Self::PermissionDenied { request: request.clone() }
    }

    /// Creates a new `InvalidPolicy` error.
    #[must_use]
    pub fn invalid_policy(message: impl Into<String>) -> Self {
        Self::InvalidPolicy(message.into())
    }

    /// Returns `true` when the error is an authorization decision rather than
    /// an infrastructure failure.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::TenancyMismatch { .. } | Self::PermissionDenied { .. })
    }
}

impl From<TransportError> for AuthzError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err)
    }
}

/// Result type alias for authorization operations.
pub type AuthzResult<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthzError::tenancy_mismatch("org-A", "org-B");
        assert_eq!(
            err.to_string(),
            "Tenancy mismatch: subject belongs to 'org-A', request targets 'org-B'"
        );

        let request = AuthorizationRequest::new("write", "users");
        let err = AuthzError::permission_denied(&request);
        assert_eq!(err.to_string(), "Permission denied: write on users");

        let err = AuthzError::invalid_policy("missing roles");
        assert_eq!(err.to_string(), "Invalid policy document: missing roles");
    }

    #[test]
    fn test_transport_source_chain_preserved() {
        let err: AuthzError = TransportError::timeout().into();
        assert!(matches!(err, AuthzError::Transport(_)));
        let source = err.source().expect("source must be preserved");
        assert_eq!(source.to_string(), "Request timeout");
    }

    #[test]
    fn test_is_denial() {
        assert!(AuthzError::tenancy_mismatch("a", "b").is_denial());
        assert!(
            AuthzError::permission_denied(&AuthorizationRequest::new("read", "users")).is_denial()
        );
        assert!(!AuthzError::invalid_policy("x").is_denial());
        assert!(!AuthzError::from(TransportError::timeout()).is_denial());
    }
}
