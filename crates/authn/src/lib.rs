//! # Warden Authentication
//!
//! Token verification for session and OAuth2 access tokens.
//!
//! This crate provides:
//! - **Key directory**: a TTL-bounded cache of the issuer's RS256 signing keys
//! - **Token verifier**: local (signature and claims), remote (introspection
//!   or session authenticate) and bounded-trust hybrid verification, each
//!   optionally followed by an authorization check
//! - **M2M authentication**: local verification plus static scope matching
//! - **Algorithm validation**: only RS256 is accepted; `none` and symmetric
//!   algorithms are rejected before any key lookup
//!
//! ## Architecture
//!
//! ```text
//!               ┌────────────── TokenVerifier ──────────────┐
//! token ──────► │ verify_local ──► KeyDirectory ──► ApiTransport (GET jwks)
//!               │ verify_remote ─► RemoteVerifier ─► ApiTransport (POST)
//!               │ authenticate  ─► local if young enough, else remote
//!               └──────────────────────┬────────────────────┘
//!                                      ▼
//!                     AuthorizationEvaluator (warden-authz)
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use warden_authn::{TokenVerifier, VerifierConfig};
//! use warden_transport::MemoryTransport;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = VerifierConfig::builder()
//!     .project_id("project-live-123")
//!     .base_url("https://api.example.com/")
//!     .max_token_age(Duration::from_secs(60))
//!     .build()?;
//!
//! let verifier = TokenVerifier::builder()
//!     .config(config)
//!     .transport(Arc::new(MemoryTransport::new()))
//!     .build();
//!
//! // Not a JWT: local verification yields no claims instead of an error.
//! assert!(verifier.verify_local("opaque-session-token", None).await?.is_none());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Verified claims.
pub mod claims;
/// Verifier configuration.
pub mod config;
/// Authentication error types.
pub mod error;
/// JWT decoding and claim checks.
pub mod jwt;
/// Signing key cache.
pub mod key_directory;
/// M2M token authentication.
pub mod m2m;
/// Remote verification.
pub mod remote;
/// Algorithm validation.
pub mod validation;
/// Token verifier.
pub mod verifier;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use claims::{RESERVED_CLAIMS, SessionClaim, VerifiedClaims};
pub use config::{
    DEFAULT_CACHE_TTL, DEFAULT_ISSUER_HOST, DEFAULT_ORGANIZATION_CLAIM, IntrospectionCredentials,
    VerifierConfig,
};
pub use error::{AuthError, Result};
pub use key_directory::{KeyDirectory, KeySet, SigningKey};
pub use m2m::M2mClaims;
pub use remote::{IntrospectionVerifier, RemoteVerifier, SessionVerifier};
pub use validation::{ACCEPTED_ALGORITHMS, FORBIDDEN_ALGORITHMS, validate_algorithm};
pub use verifier::TokenVerifier;
