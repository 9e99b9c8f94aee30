//! Injected API transport abstraction for Warden.
//!
//! The token verifier and the policy evaluator never talk to the network
//! directly. Every fetch (key sets, policy documents, token introspection,
//! session authentication) goes through the [`ApiTransport`] trait, which the
//! embedding application implements on top of whatever HTTP client it already
//! uses.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │             warden-authn          warden-authz              │
//! │   KeyDirectory, TokenVerifier     PolicyDirectory           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   warden-transport                          │
//! │          ApiTransport trait (get, post)                     │
//! │          Endpoints (path layout per tenancy)                │
//! ├──────────────────┬──────────────────────────────────────────┤
//! │ MemoryTransport  │        application HTTP client           │
//! │    (testing)     │             (production)                 │
//! └──────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use serde_json::json;
//! use warden_transport::{ApiTransport, Endpoints, MemoryTransport, Tenancy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoints = Endpoints::new("project-test-123", Tenancy::Consumer);
//!     let transport = MemoryTransport::new();
//!     transport.respond(endpoints.jwks(), json!({ "keys": [] }));
//!
//!     let body = transport.get(&endpoints.jwks()).await?;
//!     assert_eq!(body["keys"], json!([]));
//!     assert_eq!(transport.call_count(&endpoints.jwks()), 1);
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`TransportResult<T>`]. Transport failures are never
//! interpreted by the caches built on top of this crate: they are propagated
//! to the caller unchanged so that retry policy stays with the application.

#![deny(unsafe_code)]

pub mod api;
pub mod endpoints;
pub mod error;
pub mod memory;

pub use api::ApiTransport;
pub use endpoints::{Endpoints, Tenancy};
pub use error::{BoxError, TransportError, TransportResult};
pub use memory::MemoryTransport;
