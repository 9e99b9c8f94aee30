//! Role-, scope- and tenancy-based authorization checks.
//!
//! Three modes share one primitive match over the cached policy:
//!
//! | Mode | Subject set | Policy section | Tenancy check |
//! |------|-------------|----------------|---------------|
//! | [`authorize`](AuthorizationEvaluator::authorize) | roles | `roles` | yes |
//! | [`authorize_consumer`](AuthorizationEvaluator::authorize_consumer) | roles | `roles` | no |
//! | [`authorize_scope`](AuthorizationEvaluator::authorize_scope) | token scopes | `scopes` | no |
//!
//! Every decision is emitted as an `audit_event` at `INFO` with
//! `audit.action`, `audit.resource` and `audit.result` fields.

use std::sync::Arc;

use crate::{
    directory::PolicyDirectory,
    error::{AuthzError, AuthzResult},
    policy::AuthorizationRequest,
};

/// Authorization mode of a check, reported in audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationMode {
    /// Multi-tenant role check.
    Tenant,
    /// Single-tenant role check.
    Consumer,
    /// OAuth scope check.
    Scope,
}

impl std::fmt::Display for AuthorizationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tenant => write!(f, "authorize_tenant"),
            Self::Consumer => write!(f, "authorize_consumer"),
            Self::Scope => write!(f, "authorize_scope"),
        }
    }
}

/// Evaluates authorization requests against a [`PolicyDirectory`].
///
/// The evaluator holds no state of its own and is safe to share across tasks.
#[derive(Debug, Clone)]
pub struct AuthorizationEvaluator {
    policies: Arc<PolicyDirectory>,
}

impl AuthorizationEvaluator {
    /// Creates an evaluator reading policies from `policies`.
    #[must_use]
    pub fn new(policies: Arc<PolicyDirectory>) -> Self {
        Self { policies }
    }

    /// Returns the underlying policy directory.
    #[must_use]
    pub fn policies(&self) -> &Arc<PolicyDirectory> {
        &self.policies
    }

    /// Multi-tenant role check.
    ///
    /// The request must target the subject's own organization. A mismatch is
    /// rejected before the policy is consulted, as is a request without an
    /// organization or a subject whose organization is empty.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::TenancyMismatch`] when the organizations differ
    /// - [`AuthzError::PermissionDenied`] when no held role grants the request
    /// - [`AuthzError::Transport`] / [`AuthzError::InvalidPolicy`] when the
    ///   policy cannot be loaded
    #[tracing::instrument(skip(self, subject_roles), fields(resource = %request.resource_id))]
    pub async fn authorize<S: AsRef<str> + Sync>(
        &self,
        subject_roles: &[S],
        subject_org_id: &str,
        request: &AuthorizationRequest,
    ) -> AuthzResult<()> {
        let result = match request.organization_id.as_deref() {
            Some(requested) if !subject_org_id.is_empty() && requested == subject_org_id => {
                self.check_roles(subject_roles, request).await
            },
            requested => {
                Err(AuthzError::tenancy_mismatch(subject_org_id, requested.unwrap_or_default()))
            },
        };
        audit(AuthorizationMode::Tenant, request, &result);
        result
    }

    /// Single-tenant role check.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::PermissionDenied`] when no held role grants the request
    /// - [`AuthzError::Transport`] / [`AuthzError::InvalidPolicy`] when the
    ///   policy cannot be loaded
    #[tracing::instrument(skip(self, subject_roles), fields(resource = %request.resource_id))]
    pub async fn authorize_consumer<S: AsRef<str> + Sync>(
        &self,
        subject_roles: &[S],
        request: &AuthorizationRequest,
    ) -> AuthzResult<()> {
        let result = self.check_roles(subject_roles, request).await;
        audit(AuthorizationMode::Consumer, request, &result);
        result
    }

    /// OAuth scope check against the policy's `scopes` section.
    ///
    /// # Errors
    ///
    /// - [`AuthzError::PermissionDenied`] when no granted scope covers the request
    /// - [`AuthzError::Transport`] / [`AuthzError::InvalidPolicy`] when the
    ///   policy cannot be loaded
    #[tracing::instrument(skip(self, token_scopes), fields(resource = %request.resource_id))]
    pub async fn authorize_scope<S: AsRef<str> + Sync>(
        &self,
        token_scopes: &[S],
        request: &AuthorizationRequest,
    ) -> AuthzResult<()> {
        let policy = self.policies.get_policy(false).await;
        let result = policy.and_then(|policy| {
            if policy.scopes_allow(token_scopes, request) {
                Ok(())
            } else {
                Err(AuthzError::permission_denied(request))
            }
        });
        audit(AuthorizationMode::Scope, request, &result);
        result
    }

    async fn check_roles<S: AsRef<str> + Sync>(
        &self,
        subject_roles: &[S],
        request: &AuthorizationRequest,
    ) -> AuthzResult<()> {
        let policy = self.policies.get_policy(false).await?;
        if policy.roles_allow(subject_roles, request) {
            Ok(())
        } else {
            Err(AuthzError::permission_denied(request))
        }
    }
}

fn audit(mode: AuthorizationMode, request: &AuthorizationRequest, result: &AuthzResult<()>) {
    let outcome = match result {
        Ok(()) => "success".to_owned(),
        Err(err) => format!("failure: {err}"),
    };
    tracing::info!(
        audit.action = %mode,
        audit.resource = %request.resource_id,
        audit.operation = %request.action,
        audit.organization = request.organization_id.as_deref().unwrap_or_default(),
        audit.result = %outcome,
        "audit_event"
    );
}
