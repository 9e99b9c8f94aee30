//! Policy document model and the primitive permission match.
//!
//! A policy is fetched as a whole from the issuer and never mutated locally.
//! Its wire shape is:
//!
//! ```json
//! {
//!   "roles":  [{ "role_id": "admin", "permissions": [{ "actions": ["*"], "resource_id": "users" }] }],
//!   "scopes": [{ "scope": "read:users", "permissions": [{ "actions": ["read"], "resource_id": "users" }] }]
//! }
//! ```
//!
//! Fields the engine does not evaluate (descriptions, resource catalogues) are
//! ignored on decode.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AuthzError, AuthzResult};

/// Action entry that grants every action on a resource.
pub const WILDCARD_ACTION: &str = "*";

/// A set of actions allowed on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Allowed actions. May contain [`WILDCARD_ACTION`].
    pub actions: Vec<String>,
    /// Resource the actions apply to. Matched exactly.
    pub resource_id: String,
}

impl Permission {
    /// Creates a permission from a resource id and its actions.
    #[must_use]
    pub fn new<I, S>(resource_id: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            resource_id: resource_id.into(),
        }
    }

    /// Returns `true` if this permission covers `action` on `resource_id`.
    #[must_use]
    pub fn allows(&self, action: &str, resource_id: &str) -> bool {
        self.resource_id == resource_id
            && self.actions.iter().any(|a| a == WILDCARD_ACTION || a == action)
    }
}

/// A named role and the permissions it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role identifier, as carried in a subject's roles.
    pub role_id: String,
    /// Permissions granted to holders of the role.
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// A named OAuth scope and the permissions it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeGrant {
    /// Scope string, as carried in a token's `scope` claim.
    pub scope: String,
    /// Permissions granted to tokens carrying the scope.
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// Role- and scope-based policy for one project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// Roles, in document order.
    #[serde(default)]
    pub roles: Vec<Role>,
    /// Scopes, in document order.
    #[serde(default)]
    pub scopes: Vec<ScopeGrant>,
}

impl PolicyDocument {
    /// Extracts the policy from a policy endpoint response (`{"policy": {...}}`).
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::InvalidPolicy`] when the `policy` field is absent
    /// or does not decode as a policy document.
    pub fn from_response(body: &Value) -> AuthzResult<Self> {
        let policy = body
            .get("policy")
            .ok_or_else(|| AuthzError::invalid_policy("response has no 'policy' field"))?;
        Self::deserialize(policy).map_err(|e| AuthzError::invalid_policy(e.to_string()))
    }

    /// Returns `true` if any of `roles` grants the request's action on its resource.
    ///
    /// Roles in the document that the subject does not hold are skipped.
    #[must_use]
    pub fn roles_allow<S: AsRef<str>>(&self, roles: &[S], request: &AuthorizationRequest) -> bool {
        self.roles.iter().any(|role| {
            holds(roles, &role.role_id)
                && role.permissions.iter().any(|p| p.allows(&request.action, &request.resource_id))
        })
    }

    /// Returns `true` if any of `scopes` grants the request's action on its resource.
    #[must_use]
    pub fn scopes_allow<S: AsRef<str>>(
        &self,
        scopes: &[S],
        request: &AuthorizationRequest,
    ) -> bool {
        self.scopes.iter().any(|grant| {
            holds(scopes, &grant.scope)
                && grant.permissions.iter().any(|p| p.allows(&request.action, &request.resource_id))
        })
    }
}

fn holds<S: AsRef<str>>(subject: &[S], id: &str) -> bool {
    subject.iter().any(|s| s.as_ref() == id)
}

/// A single authorization question: may the subject perform `action` on
/// `resource_id` (within `organization_id`, for multi-tenant projects)?
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct AuthorizationRequest {
    /// Action to perform.
    #[builder(into)]
    pub action: String,
    /// Resource to act on.
    #[builder(into)]
    pub resource_id: String,
    /// Organization the request targets. Required for tenant checks.
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

impl AuthorizationRequest {
    /// Creates a request without an organization.
    #[must_use]
    pub fn new(action: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self { action: action.into(), resource_id: resource_id.into(), organization_id: None }
    }

    /// Returns the request scoped to an organization.
    #[must_use]
    pub fn in_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }
}

impl fmt::Display for AuthorizationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.action, self.resource_id)?;
        if let Some(org) = &self.organization_id {
            write!(f, " in {org}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case::exact("read", "users", true)]
    #[case::other_action("delete", "users", false)]
    #[case::other_resource("read", "posts", false)]
    #[case::resource_is_not_a_prefix("read", "users/1", false)]
    fn test_permission_allows(#[case] action: &str, #[case] resource: &str, #[case] allowed: bool) {
        let permission = Permission::new("users", ["read", "write"]);
        assert_eq!(permission.allows(action, resource), allowed);
    }

    #[test]
    fn test_wildcard_action() {
        let permission = Permission::new("users", ["*"]);
        assert!(permission.allows("read", "users"));
        assert!(permission.allows("anything", "users"));
        assert!(!permission.allows("read", "posts"));
    }

    #[test]
    fn test_from_response() {
        let body = json!({
            "request_id": "req-1",
            "policy": {
                "roles": [{
                    "role_id": "admin",
                    "description": "ignored",
                    "permissions": [{ "actions": ["*"], "resource_id": "users" }]
                }],
                "resources": [{ "resource_id": "users", "actions": ["read"] }],
                "scopes": [{
                    "scope": "read:users",
                    "permissions": [{ "actions": ["read"], "resource_id": "users" }]
                }]
            }
        });

        let policy = PolicyDocument::from_response(&body).unwrap();
        assert_eq!(policy.roles.len(), 1);
        assert_eq!(policy.roles[0].role_id, "admin");
        assert_eq!(policy.scopes[0].scope, "read:users");
    }

    #[test]
    fn test_from_response_missing_policy() {
        let err = PolicyDocument::from_response(&json!({ "request_id": "req-1" })).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidPolicy(_)));
    }

    #[test]
    fn test_from_response_wrong_shape() {
        let err =
            PolicyDocument::from_response(&json!({ "policy": { "roles": "admin" } })).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidPolicy(_)));
    }

    #[test]
    fn test_roles_allow_skips_unheld_roles() {
        let policy = PolicyDocument {
            roles: vec![
                Role {
                    role_id: "admin".into(),
                    permissions: vec![Permission::new("users", ["*"])],
                },
                Role {
                    role_id: "viewer".into(),
                    permissions: vec![Permission::new("users", ["read"])],
                },
            ],
            scopes: vec![],
        };

        let write = AuthorizationRequest::new("write", "users");
        assert!(policy.roles_allow(&["admin"], &write));
        assert!(!policy.roles_allow(&["viewer"], &write));
        assert!(!policy.roles_allow::<&str>(&[], &write));
    }

    #[test]
    fn test_scopes_allow_uses_scope_list_only() {
        let policy = PolicyDocument {
            roles: vec![Role {
                role_id: "read:users".into(),
                permissions: vec![Permission::new("users", ["read"])],
            }],
            scopes: vec![],
        };

        let read = AuthorizationRequest::new("read", "users");
        assert!(policy.roles_allow(&["read:users"], &read));
        assert!(!policy.scopes_allow(&["read:users"], &read));
    }

    #[test]
    fn test_request_builder_and_display() {
        let request = AuthorizationRequest::builder()
            .action("read")
            .resource_id("users")
            .organization_id("org-A")
            .build();

        assert_eq!(request, AuthorizationRequest::new("read", "users").in_organization("org-A"));
        assert_eq!(request.to_string(), "read on users in org-A");
    }
}
