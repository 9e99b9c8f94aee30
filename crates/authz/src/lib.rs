//! # Warden Authorization
//!
//! Policy caching and authorization decisions for verified tokens.
//!
//! This crate provides:
//! - **Policy directory**: a TTL-bounded cache of the project's role and scope
//!   policy, fetched through an injected [`ApiTransport`](warden_transport::ApiTransport)
//! - **Authorization evaluator**: tenant, consumer and scope checks against the
//!   cached policy
//! - **Static scope matcher**: `verb:resource` wildcard matching for M2M tokens
//!
//! ## Architecture
//!
//! ```text
//! roles / scopes / org id ──► AuthorizationEvaluator ──► PolicyDirectory ──► ApiTransport
//!                                   │                          │
//!                            TenancyMismatch            Arc<PolicyDocument>
//!                            PermissionDenied           (swapped wholesale)
//!
//! granted / required scopes ──► scopes_authorized  (no policy involved)
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use warden_authz::{AuthorizationEvaluator, AuthorizationRequest, PolicyDirectory};
//! use warden_transport::{Endpoints, MemoryTransport, Tenancy};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoints = Endpoints::new("project-test-123", Tenancy::Consumer);
//! let transport = MemoryTransport::new();
//! transport.respond(
//!     endpoints.policy(),
//!     json!({ "policy": { "roles": [{
//!         "role_id": "user",
//!         "permissions": [{ "actions": ["read"], "resource_id": "users" }]
//!     }] } }),
//! );
//!
//! let policies = Arc::new(PolicyDirectory::new(Arc::new(transport), &endpoints));
//! let evaluator = AuthorizationEvaluator::new(policies);
//!
//! evaluator.authorize_consumer(&["user"], &AuthorizationRequest::new("read", "users")).await?;
//! assert!(
//!     evaluator
//!         .authorize_consumer(&["user"], &AuthorizationRequest::new("write", "users"))
//!         .await
//!         .is_err()
//! );
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Policy directory (cache).
pub mod directory;
/// Authorization error types.
pub mod error;
/// Authorization evaluator.
pub mod evaluator;
/// Policy document model.
pub mod policy;
/// M2M scope matching.
pub mod scopes;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use directory::{DEFAULT_POLICY_TTL, PolicyDirectory};
pub use error::{AuthzError, AuthzResult};
pub use evaluator::{AuthorizationEvaluator, AuthorizationMode};
pub use policy::{AuthorizationRequest, Permission, PolicyDocument, Role, ScopeGrant};
pub use scopes::{first_unmet_scope, scopes_authorized};
