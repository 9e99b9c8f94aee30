//! The [`ApiTransport`] trait.
//!
//! Implementations are expected to own connection concerns: base URL,
//! authentication headers, timeouts and TLS. Paths passed to the trait are
//! always relative (see [`Endpoints`](crate::Endpoints)).
//!
//! # Usage
//!
//! ```no_run
//! // Demonstrates the trait interface; requires a concrete transport.
//! use warden_transport::{ApiTransport, Endpoints, TransportResult};
//!
//! async fn fetch_keys<T: ApiTransport>(
//!     transport: &T,
//!     endpoints: &Endpoints,
//! ) -> TransportResult<serde_json::Value> {
//!     transport.get(&endpoints.jwks()).await
//! }
//! ```

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportResult;

/// JSON request/response transport to the issuer's API.
///
/// Both methods return the decoded JSON body of a successful response.
/// Non-success statuses are reported as
/// [`TransportError::Status`](crate::TransportError::Status).
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Performs a GET request against a relative path.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`](crate::TransportError) when the request
    /// fails or the body is not valid JSON.
    async fn get(&self, path: &str) -> TransportResult<Value>;

    /// Performs a POST request with a JSON body against a relative path.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`](crate::TransportError) when the request
    /// fails or the body is not valid JSON.
    async fn post(&self, path: &str, body: &Value) -> TransportResult<Value>;
}
