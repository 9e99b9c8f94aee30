//! In-memory transport implementation.
//!
//! [`MemoryTransport`] serves canned JSON bodies per path and records every
//! request it receives. It is intended for tests and local development where
//! no issuer API is reachable.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Cheap to clone**: clones share state, so a test can keep a handle
//!   while the code under test owns another
//! - **Failure injection**: any path can be made to fail with a given
//!   [`TransportError`] until the failure is cleared
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use warden_transport::{ApiTransport, MemoryTransport, TransportError};
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = MemoryTransport::new();
//!     transport.respond("/v1/rbac/policy", json!({ "policy": { "roles": [] } }));
//!
//!     assert!(transport.get("/v1/rbac/policy").await.is_ok());
//!
//!     transport.fail("/v1/rbac/policy", TransportError::timeout());
//!     assert!(transport.get("/v1/rbac/policy").await.is_err());
//!     assert_eq!(transport.call_count("/v1/rbac/policy"), 2);
//! }
//! ```

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::{
    api::ApiTransport,
    error::{TransportError, TransportResult},
};

#[derive(Debug, Default)]
struct State {
    responses: HashMap<String, Value>,
    failures: HashMap<String, TransportError>,
    calls: HashMap<String, usize>,
    bodies: HashMap<String, Vec<Value>>,
}

/// In-memory [`ApiTransport`] with canned responses and request recording.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<RwLock<State>>,
}

impl MemoryTransport {
    /// Creates an empty transport. Every path answers 404 until configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or replaces) the body returned for `path`.
    pub fn respond(&self, path: impl Into<String>, body: Value) {
        self.state.write().responses.insert(path.into(), body);
    }

    /// Makes every subsequent request to `path` fail with `error`.
    pub fn fail(&self, path: impl Into<String>, error: TransportError) {
        self.state.write().failures.insert(path.into(), error);
    }

    /// Removes an injected failure for `path`.
    pub fn clear_failure(&self, path: &str) {
        self.state.write().failures.remove(path);
    }

    /// Number of requests received for `path`, whatever their outcome.
    #[must_use]
    pub fn call_count(&self, path: &str) -> usize {
        self.state.read().calls.get(path).copied().unwrap_or(0)
    }

    /// Total number of requests received across all paths.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.state.read().calls.values().sum()
    }

    /// Body of the most recent POST to `path`.
    #[must_use]
    pub fn last_body(&self, path: &str) -> Option<Value> {
        self.state.read().bodies.get(path).and_then(|bodies| bodies.last().cloned())
    }

    /// Resets recorded calls and bodies, keeping responses and failures.
    pub fn reset_calls(&self) {
        let mut state = self.state.write();
        state.calls.clear();
        state.bodies.clear();
    }

    fn answer(&self, path: &str, body: Option<&Value>) -> TransportResult<Value> {
        let mut state = self.state.write();
        *state.calls.entry(path.to_owned()).or_insert(0) += 1;
        if let Some(body) = body {
            state.bodies.entry(path.to_owned()).or_default().push(body.clone());
        }

        if let Some(error) = state.failures.get(path) {
            tracing::debug!(path, error = %error, "injected transport failure");
            return Err(error.clone());
        }

        state
            .responses
            .get(path)
            .cloned()
            .ok_or_else(|| TransportError::status(path, 404, "no response configured"))
    }
}

#[async_trait]
impl ApiTransport for MemoryTransport {
    #[tracing::instrument(skip(self))]
    async fn get(&self, path: &str) -> TransportResult<Value> {
        self.answer(path, None)
    }

    #[tracing::instrument(skip(self, body))]
    async fn post(&self, path: &str, body: &Value) -> TransportResult<Value> {
        self.answer(path, Some(body))
    }
}
