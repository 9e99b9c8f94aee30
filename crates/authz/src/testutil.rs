//! Shared test fixtures for policy evaluation.
//!
//! Enabled for this crate's own tests and, through the `testutil` feature,
//! for downstream integration tests.

use std::sync::Arc;

use serde_json::{Value, json};
use warden_transport::{Endpoints, MemoryTransport};

use crate::{
    directory::PolicyDirectory,
    evaluator::AuthorizationEvaluator,
    policy::{Permission, PolicyDocument, Role, ScopeGrant},
};

/// A policy covering the common fixtures:
///
/// - role `user`: `read` on `users`
/// - role `admin`: `*` on `users`
/// - scope `read:users`: `read` on `users`
/// - scope `write:users`: `write` on `users`
#[must_use]
pub fn sample_policy() -> PolicyDocument {
    PolicyDocument {
        roles: vec![
            Role { role_id: "user".into(), permissions: vec![Permission::new("users", ["read"])] },
            Role { role_id: "admin".into(), permissions: vec![Permission::new("users", ["*"])] },
        ],
        scopes: vec![
            ScopeGrant {
                scope: "read:users".into(),
                permissions: vec![Permission::new("users", ["read"])],
            },
            ScopeGrant {
                scope: "write:users".into(),
                permissions: vec![Permission::new("users", ["write"])],
            },
        ],
    }
}

/// Wraps a policy the way the policy endpoint returns it.
#[must_use]
pub fn policy_response(policy: &PolicyDocument) -> Value {
    json!({ "request_id": "request-id-test", "policy": policy, "status_code": 200 })
}

/// Registers `policy` on the transport and returns an evaluator over an empty
/// directory, so the first check performs the fetch.
#[must_use]
pub fn evaluator_with(
    transport: &MemoryTransport,
    endpoints: &Endpoints,
    policy: &PolicyDocument,
) -> AuthorizationEvaluator {
    transport.respond(endpoints.policy(), policy_response(policy));
    let directory = PolicyDirectory::new(Arc::new(transport.clone()), endpoints);
    AuthorizationEvaluator::new(Arc::new(directory))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use warden_transport::Tenancy;

    use super::*;
    use crate::policy::AuthorizationRequest;

    #[test]
    fn test_policy_response_round_trips() {
        let policy = sample_policy();
        let decoded = PolicyDocument::from_response(&policy_response(&policy)).unwrap();
        assert_eq!(decoded, policy);
    }

    #[tokio::test]
    async fn test_evaluator_with_fetches_lazily() {
        let transport = MemoryTransport::new();
        let endpoints = Endpoints::new("project-test-1", Tenancy::Consumer);
        let evaluator = evaluator_with(&transport, &endpoints, &sample_policy());
        assert_eq!(transport.total_calls(), 0);

        evaluator
            .authorize_consumer(&["user"], &AuthorizationRequest::new("read", "users"))
            .await
            .unwrap();
        assert_eq!(transport.call_count(&endpoints.policy()), 1);
    }
}
