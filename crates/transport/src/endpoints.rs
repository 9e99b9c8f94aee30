//! Relative API paths used by the key, policy and token caches.
//!
//! The path layout depends on a single static choice: whether the project is
//! a consumer (single-tenant) project or a B2B (multi-organization) project.
//!
//! | Endpoint | Consumer | B2B |
//! |----------|----------|-----|
//! | Key set | `/v1/sessions/jwks/{project_id}` | `/v1/b2b/sessions/jwks/{project_id}` |
//! | Policy | `/v1/rbac/policy` | `/v1/b2b/rbac/policy` |
//! | Session authenticate | `/v1/sessions/authenticate` | `/v1/b2b/sessions/authenticate` |
//! | Introspection | `/v1/public/{project_id}/oauth2/introspect` | same |

use serde::{Deserialize, Serialize};

/// Deployment tenancy of a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tenancy {
    /// Single-tenant consumer project. No organization concept.
    #[default]
    Consumer,
    /// Multi-organization B2B project.
    B2b,
}

impl Tenancy {
    fn prefix(self) -> &'static str {
        match self {
            Self::Consumer => "/v1",
            Self::B2b => "/v1/b2b",
        }
    }
}

/// Path builder for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    project_id: String,
    tenancy: Tenancy,
}

impl Endpoints {
    /// Creates the path layout for a project.
    #[must_use]
    pub fn new(project_id: impl Into<String>, tenancy: Tenancy) -> Self {
        Self { project_id: project_id.into(), tenancy }
    }

    /// Returns the project id the paths are built for.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Returns the tenancy the paths are built for.
    #[must_use]
    pub fn tenancy(&self) -> Tenancy {
        self.tenancy
    }

    /// Key set (JWKS) path.
    #[must_use]
    pub fn jwks(&self) -> String {
        format!("{}/sessions/jwks/{}", self.tenancy.prefix(), self.project_id)
    }

    /// RBAC policy path.
    #[must_use]
    pub fn policy(&self) -> String {
        format!("{}/rbac/policy", self.tenancy.prefix())
    }

    /// Session authenticate path.
    #[must_use]
    pub fn session_authenticate(&self) -> String {
        format!("{}/sessions/authenticate", self.tenancy.prefix())
    }

    /// OAuth2 token introspection path. Identical for both tenancies.
    #[must_use]
    pub fn introspection(&self) -> String {
        format!("/v1/public/{}/oauth2/introspect", self.project_id)
    }
}
