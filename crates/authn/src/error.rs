//! Authentication error types.
//!
//! This module defines errors that can occur while verifying tokens, loading
//! signing keys and authorizing verified subjects.

use thiserror::Error;
use warden_authz::AuthzError;
use warden_transport::TransportError;

/// Token verification and authorization errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`: new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// The token cannot be decoded as a JWT.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// The token's algorithm is not RS256.
    #[error("Incorrect algorithm: {0}")]
    IncorrectAlgorithm(String),

    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The issuer is neither the project issuer nor the configured base URL.
    #[error("Invalid issuer: {0}")]
    InvalidIssuer(String),

    /// The audience does not contain the project id.
    #[error("Invalid audience: {0}")]
    InvalidAudience(String),

    /// The token has expired.
    #[error("Token expired")]
    ExpiredSignature,

    /// The token's `nbf` claim is in the future.
    #[error("Token not yet valid")]
    TokenNotYetValid,

    /// The token was issued longer ago than the caller accepts.
    #[error("Token too old")]
    TokenTooOld,

    /// A required M2M scope is not granted.
    #[error("Missing required scope: {scope}")]
    MissingRequiredScope {
        /// The first required scope that was not satisfied.
        scope: String,
    },

    /// No signing key with the token's key id exists, even after a refresh.
    #[error("Signing key not found: {kid}")]
    KeyNotFound {
        /// Key ID that was not found.
        kid: String,
    },

    /// A published signing key cannot be turned into a verification key.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Remote verification reports the token as inactive.
    #[error("Token is inactive")]
    TokenInactive,

    /// A remote response lacks fields required to build claims.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authorization was requested but the verifier has no evaluator.
    #[error("Authorization requested but no policy evaluator is configured")]
    AuthorizationUnavailable,

    /// The verified subject is not authorized for the request.
    #[error("Authorization failed: {0}")]
    Authorization(
        /// The underlying authorization error.
        #[source]
        AuthzError,
    ),

    /// Fetching keys or verifying remotely failed.
    #[error("Transport error: {0}")]
    Transport(
        /// The transport failure, propagated uninterpreted.
        #[source]
        TransportError,
    ),

    /// Invalid verifier configuration.
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Creates a new `MalformedToken` error.
    #[must_use]
    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken(message.into())
    }

    /// Creates a new `IncorrectAlgorithm` error.
    #[must_use]
    pub fn incorrect_algorithm(message: impl Into<String>) -> Self {
        Self::IncorrectAlgorithm(message.into())
    }

    /// Creates a new `InvalidIssuer` error.
    #[must_use]
    pub fn invalid_issuer(message: impl Into<String>) -> Self {
        Self::InvalidIssuer(message.into())
    }

    /// Creates a new `InvalidAudience` error.
    #[must_use]
    pub fn invalid_audience(message: impl Into<String>) -> Self {
        Self::InvalidAudience(message.into())
    }

    /// Creates a new `MissingRequiredScope` error.
    #[must_use]
    pub fn missing_required_scope(scope: impl Into<String>) -> Self {
        Self::MissingRequiredScope { scope: scope.into() }
    }

    /// Creates a new `KeyNotFound` error.
    #[must_use]
    pub fn key_not_found(kid: impl Into<String>) -> Self {
        Self::KeyNotFound { kid: kid.into() }
    }

    /// Creates a new `InvalidPublicKey` error.
    #[must_use]
    pub fn invalid_public_key(message: impl Into<String>) -> Self {
        Self::InvalidPublicKey(message.into())
    }

    /// Creates a new `InvalidResponse` error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse(message.into())
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns `true` for authorization denials (tenancy mismatch or missing
    /// permission), as opposed to verification or infrastructure failures.
    #[must_use]
    pub fn is_authorization_denial(&self) -> bool {
        matches!(self, Self::Authorization(err) if err.is_denial())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::ExpiredSignature => AuthError::ExpiredSignature,
            ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
            ErrorKind::InvalidAudience => {
                AuthError::invalid_audience("Audience validation failed")
            },
            ErrorKind::InvalidIssuer => AuthError::invalid_issuer("Issuer validation failed"),
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                AuthError::incorrect_algorithm("Algorithm not supported")
            },
            ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
                AuthError::invalid_public_key(err.to_string())
            },
            _ => AuthError::malformed_token(format!("JWT error: {err}")),
        }
    }
}

impl From<TransportError> for AuthError {
    fn from(err: TransportError) -> Self {
        AuthError::Transport(err)
    }
}

impl From<AuthzError> for AuthError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Transport(transport) => AuthError::Transport(transport),
            other => AuthError::Authorization(other),
        }
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
