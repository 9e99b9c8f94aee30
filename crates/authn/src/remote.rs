//! Remote verification against the issuer's API.
//!
//! Two verifiers implement [`RemoteVerifier`]:
//!
//! - [`IntrospectionVerifier`] posts the token to the OAuth2 introspection
//!   endpoint and maps `active: false` to "no claims"
//! - [`SessionVerifier`] posts a session token to the session authenticate
//!   endpoint and normalizes the returned session into claims

use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{Map, Value, json};
use warden_transport::{ApiTransport, Tenancy};

use crate::{
    claims::VerifiedClaims,
    config::{IntrospectionCredentials, VerifierConfig},
    error::{AuthError, Result},
};

/// Token type reported for claims built from a session.
pub const SESSION_TOKEN_TYPE: &str = "session_token";

/// Asks the issuer whether a token is valid.
#[async_trait]
pub trait RemoteVerifier: Send + Sync {
    /// Verifies `token` remotely.
    ///
    /// Returns `Ok(None)` when the issuer reports the token as inactive.
    ///
    /// # Errors
    ///
    /// - [`AuthError::Transport`] when the call fails
    /// - [`AuthError::InvalidResponse`] when the body cannot be turned into
    ///   claims
    async fn verify(&self, token: &str) -> Result<Option<VerifiedClaims>>;
}

/// OAuth2 token introspection.
pub struct IntrospectionVerifier {
    transport: Arc<dyn ApiTransport>,
    path: String,
    credentials: IntrospectionCredentials,
    organization_claim_key: String,
}

impl IntrospectionVerifier {
    /// Creates a verifier posting to the project's introspection endpoint.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        config: &VerifierConfig,
        credentials: IntrospectionCredentials,
    ) -> Self {
        Self {
            transport,
            path: config.endpoints().introspection(),
            credentials,
            organization_claim_key: config.organization_claim_key().to_owned(),
        }
    }

    fn request_body(&self, token: &str) -> Value {
        let mut body = json!({
            "token": token,
            "client_id": self.credentials.client_id(),
            "token_type_hint": "access_token",
        });
        if let Some(secret) = self.credentials.client_secret() {
            body["client_secret"] = json!(secret);
        }
        body
    }
}

#[async_trait]
impl RemoteVerifier for IntrospectionVerifier {
    #[tracing::instrument(skip(self, token), fields(client_id = %self.credentials.client_id()))]
    async fn verify(&self, token: &str) -> Result<Option<VerifiedClaims>> {
        let response = self.transport.post(&self.path, &self.request_body(token)).await?;
        let body = response
            .as_object()
            .ok_or_else(|| AuthError::invalid_response("introspection body is not an object"))?;

        let active = body
            .get("active")
            .and_then(Value::as_bool)
            .ok_or_else(|| AuthError::invalid_response("introspection body has no 'active' flag"))?;
        if !active {
            tracing::debug!("token reported inactive");
            return Ok(None);
        }

        VerifiedClaims::from_payload(body, &self.organization_claim_key)
            .map(Some)
            .map_err(|e| AuthError::invalid_response(e.to_string()))
    }
}

impl std::fmt::Debug for IntrospectionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntrospectionVerifier")
            .field("path", &self.path)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Session authentication for session tokens.
///
/// Consumer projects answer with a `session` object keyed by `user_id`; B2B
/// projects answer with a `member_session` keyed by `member_id` that also
/// carries the organization and roles. Roles become the claims' scope so
/// that role-based authorization sees them.
pub struct SessionVerifier {
    transport: Arc<dyn ApiTransport>,
    path: String,
    tenancy: Tenancy,
    issuer: String,
    audience: String,
    organization_claim_key: String,
}

impl SessionVerifier {
    /// Creates a verifier posting to the project's session authenticate
    /// endpoint.
    #[must_use]
    pub fn new(transport: Arc<dyn ApiTransport>, config: &VerifierConfig) -> Self {
        Self {
            transport,
            path: config.endpoints().session_authenticate(),
            tenancy: config.tenancy(),
            issuer: config.issuer(),
            audience: config.project_id().to_owned(),
            organization_claim_key: config.organization_claim_key().to_owned(),
        }
    }

    fn normalize(&self, response: &Value) -> Result<VerifiedClaims> {
        let (key, subject_key) = match self.tenancy {
            Tenancy::Consumer => ("session", "user_id"),
            Tenancy::B2b => ("member_session", "member_id"),
        };
        let session = response
            .get(key)
            .and_then(Value::as_object)
            .ok_or_else(|| AuthError::invalid_response(format!("response has no '{key}' object")))?;

        let subject = session
            .get(subject_key)
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::invalid_response(format!("{key} has no '{subject_key}'")))?;

        let mut custom_claims = match session.get("custom_claims") {
            Some(Value::Object(claims)) => claims.clone(),
            _ => Map::new(),
        };
        custom_claims.remove(&self.organization_claim_key);

        let (scope, organization) = match self.tenancy {
            Tenancy::Consumer => (String::new(), None),
            Tenancy::B2b => {
                let roles = session
                    .get("roles")
                    .and_then(Value::as_array)
                    .map(|roles| roles.iter().filter_map(Value::as_str).collect::<Vec<_>>())
                    .unwrap_or_default()
                    .join(" ");
                let organization = session
                    .get("organization_id")
                    .and_then(Value::as_str)
                    .map(|id| {
                        let mut org = Map::new();
                        org.insert("organization_id".into(), json!(id));
                        org
                    });
                (roles, organization)
            },
        };

        Ok(VerifiedClaims {
            subject: subject.to_owned(),
            scope,
            audience: vec![self.audience.clone()],
            issued_at: rfc3339(session, "started_at")?,
            expires_at: rfc3339(session, "expires_at")?,
            not_before: None,
            issuer: self.issuer.clone(),
            token_type: SESSION_TOKEN_TYPE.to_owned(),
            organization,
            custom_claims,
        })
    }
}

fn rfc3339(session: &Map<String, Value>, field: &str) -> Result<Option<i64>> {
    match session.get(field).and_then(Value::as_str) {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|ts| Some(ts.timestamp()))
            .map_err(|e| AuthError::invalid_response(format!("'{field}' is not RFC 3339: {e}"))),
    }
}

#[async_trait]
impl RemoteVerifier for SessionVerifier {
    #[tracing::instrument(skip(self, token), fields(tenancy = ?self.tenancy))]
    async fn verify(&self, token: &str) -> Result<Option<VerifiedClaims>> {
        let response = self.transport.post(&self.path, &json!({ "session_jwt": token })).await?;
        self.normalize(&response).map(Some)
    }
}

impl std::fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("path", &self.path)
            .field("tenancy", &self.tenancy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use warden_transport::{MemoryTransport, TransportError};

    use super::*;
    use crate::testutil::{TEST_PROJECT_ID, b2b_config, introspection_response, test_config};

    fn introspection(
        transport: &MemoryTransport,
        credentials: IntrospectionCredentials,
    ) -> IntrospectionVerifier {
        IntrospectionVerifier::new(Arc::new(transport.clone()), &test_config(), credentials)
    }

    #[tokio::test]
    async fn test_introspection_active_token() {
        let transport = MemoryTransport::new();
        let path = test_config().endpoints().introspection();
        transport.respond(&path, introspection_response("client-1", "read:users"));

        let verifier = introspection(&transport, IntrospectionCredentials::public("client-1"));
        let claims = verifier.verify("opaque-token").await.unwrap().unwrap();

        assert_eq!(claims.subject, "client-1");
        assert_eq!(claims.scopes(), vec!["read:users"]);
        assert_eq!(claims.audience, vec![TEST_PROJECT_ID]);
        assert!(!claims.custom_claims.contains_key("active"));
        assert!(!claims.custom_claims.contains_key("status_code"));

        let sent = transport.last_body(&path).unwrap();
        assert_eq!(sent["token"], "opaque-token");
        assert_eq!(sent["client_id"], "client-1");
        assert_eq!(sent["token_type_hint"], "access_token");
        assert!(sent.get("client_secret").is_none());
    }

    #[tokio::test]
    async fn test_introspection_sends_secret_for_confidential_client() {
        let transport = MemoryTransport::new();
        let path = test_config().endpoints().introspection();
        transport.respond(&path, introspection_response("client-1", ""));

        let verifier =
            introspection(&transport, IntrospectionCredentials::confidential("client-1", "s3cret"));
        verifier.verify("opaque-token").await.unwrap();

        assert_eq!(transport.last_body(&path).unwrap()["client_secret"], "s3cret");
    }

    #[tokio::test]
    async fn test_introspection_inactive_token() {
        let transport = MemoryTransport::new();
        transport.respond(
            test_config().endpoints().introspection(),
            json!({ "active": false, "request_id": "r", "status_code": 200 }),
        );

        let verifier = introspection(&transport, IntrospectionCredentials::public("client-1"));
        assert!(verifier.verify("revoked").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_introspection_without_active_flag_is_invalid() {
        let transport = MemoryTransport::new();
        transport.respond(test_config().endpoints().introspection(), json!({ "sub": "x" }));

        let verifier = introspection(&transport, IntrospectionCredentials::public("client-1"));
        let err = verifier.verify("t").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_introspection_transport_failure_propagates() {
        let transport = MemoryTransport::new();
        transport.fail(test_config().endpoints().introspection(), TransportError::timeout());

        let verifier = introspection(&transport, IntrospectionCredentials::public("client-1"));
        let err = verifier.verify("t").await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(TransportError::Timeout)));
    }

    #[tokio::test]
    async fn test_consumer_session_normalized() {
        let transport = MemoryTransport::new();
        let config = test_config();
        transport.respond(
            config.endpoints().session_authenticate(),
            json!({
                "session": {
                    "session_id": "session-1",
                    "user_id": "user-1",
                    "started_at": "2024-01-01T00:00:00Z",
                    "expires_at": "2024-01-01T01:00:00Z",
                    "custom_claims": { "plan": "pro" },
                },
                "status_code": 200,
            }),
        );

        let verifier = SessionVerifier::new(Arc::new(transport.clone()), &config);
        let claims = verifier.verify("session-jwt").await.unwrap().unwrap();

        assert_eq!(claims.subject, "user-1");
        assert_eq!(claims.issued_at, Some(1_704_067_200));
        assert_eq!(claims.expires_at, Some(1_704_070_800));
        assert_eq!(claims.issuer, config.issuer());
        assert_eq!(claims.token_type, SESSION_TOKEN_TYPE);
        assert_eq!(claims.custom_claims["plan"], "pro");
        assert!(claims.organization.is_none());

        let sent = transport.last_body(&config.endpoints().session_authenticate()).unwrap();
        assert_eq!(sent["session_jwt"], "session-jwt");
    }

    #[tokio::test]
    async fn test_member_session_carries_roles_and_organization() {
        let transport = MemoryTransport::new();
        let config = b2b_config();
        transport.respond(
            config.endpoints().session_authenticate(),
            json!({
                "member_session": {
                    "member_id": "member-1",
                    "organization_id": "org-A",
                    "roles": ["user", "admin"],
                    "started_at": "2024-01-01T00:00:00Z",
                },
            }),
        );

        let verifier = SessionVerifier::new(Arc::new(transport), &config);
        let claims = verifier.verify("session-jwt").await.unwrap().unwrap();

        assert_eq!(claims.subject, "member-1");
        assert_eq!(claims.scopes(), vec!["user", "admin"]);
        assert_eq!(claims.organization_id(), Some("org-A"));
        assert!(!claims.custom_claims.contains_key(config.organization_claim_key()));
        assert_eq!(claims.expires_at, None);
    }

    #[tokio::test]
    async fn test_session_with_bad_timestamp_is_invalid() {
        let transport = MemoryTransport::new();
        let config = test_config();
        transport.respond(
            config.endpoints().session_authenticate(),
            json!({ "session": { "user_id": "user-1", "started_at": "yesterday" } }),
        );

        let verifier = SessionVerifier::new(Arc::new(transport), &config);
        let err = verifier.verify("session-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(msg) if msg.contains("started_at")));
    }

    #[tokio::test]
    async fn test_session_missing_for_tenancy_is_invalid() {
        let transport = MemoryTransport::new();
        let config = b2b_config();
        transport.respond(
            config.endpoints().session_authenticate(),
            json!({ "session": { "user_id": "user-1" } }),
        );

        let verifier = SessionVerifier::new(Arc::new(transport), &config);
        assert!(matches!(
            verifier.verify("t").await.unwrap_err(),
            AuthError::InvalidResponse(_)
        ));
    }
}
