//! Verifier configuration.
//!
//! [`VerifierConfig`] carries everything the verifier needs to decide whether
//! a token was issued for this project: the project id (expected audience and
//! issuer suffix), the base URL (alternate issuer), the tenancy (path layout),
//! the bounded-trust window and the cache TTL.
//!
//! Configurations can be built in code or deserialized from a config file:
//!
//! ```
//! use std::time::Duration;
//!
//! use warden_authn::VerifierConfig;
//!
//! let config: VerifierConfig = serde_json::from_str(
//!     r#"{
//!         "project_id": "project-live-123",
//!         "base_url": "https://api.example.com/",
//!         "tenancy": "b2b",
//!         "max_token_age": "1m"
//!     }"#,
//! )?;
//! assert_eq!(config.max_token_age(), Some(Duration::from_secs(60)));
//! assert_eq!(config.cache_ttl(), Duration::from_secs(300));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use warden_transport::{Endpoints, Tenancy};
use zeroize::Zeroizing;

use crate::error::{AuthError, Result};

/// Default issuer host; the accepted issuer is `"{host}/{project_id}"`.
pub const DEFAULT_ISSUER_HOST: &str = "stytch.com";

/// Default key of the organization claim in multi-tenant tokens.
pub const DEFAULT_ORGANIZATION_CLAIM: &str = "https://stytch.com/organization";

/// Default TTL of the key and policy caches (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Configuration for a [`TokenVerifier`](crate::TokenVerifier).
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use warden_authn::VerifierConfig;
/// use warden_transport::Tenancy;
///
/// let config = VerifierConfig::builder()
///     .project_id("project-live-123")
///     .base_url("https://api.example.com/")
///     .tenancy(Tenancy::B2b)
///     .max_token_age(Duration::from_secs(60))
///     .build()?;
///
/// assert_eq!(config.issuer(), "stytch.com/project-live-123");
/// # Ok::<(), warden_authn::AuthError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifierConfig {
    /// Project id. Expected audience and issuer suffix.
    pub(crate) project_id: String,

    /// API base URL, also accepted as issuer.
    pub(crate) base_url: String,

    /// Issuer host.
    #[serde(default = "default_issuer_host")]
    pub(crate) issuer_host: String,

    /// Claim carrying the organization object.
    #[serde(default = "default_organization_claim")]
    pub(crate) organization_claim_key: String,

    /// Project tenancy.
    #[serde(default)]
    pub(crate) tenancy: Tenancy,

    /// Bounded-trust window for [`authenticate`](crate::TokenVerifier::authenticate).
    #[serde(with = "humantime_serde", default)]
    pub(crate) max_token_age: Option<Duration>,

    /// Key and policy cache TTL.
    #[serde(with = "humantime_serde", default = "default_cache_ttl")]
    pub(crate) cache_ttl: Duration,
}

fn default_issuer_host() -> String {
    DEFAULT_ISSUER_HOST.to_owned()
}

fn default_organization_claim() -> String {
    DEFAULT_ORGANIZATION_CLAIM.to_owned()
}

fn default_cache_ttl() -> Duration {
    DEFAULT_CACHE_TTL
}

#[bon::bon]
impl VerifierConfig {
    /// Creates a new configuration, validating all required fields.
    ///
    /// # Optional Fields
    ///
    /// * `issuer_host` - default [`DEFAULT_ISSUER_HOST`]
    /// * `organization_claim_key` - default [`DEFAULT_ORGANIZATION_CLAIM`]
    /// * `tenancy` - default [`Tenancy::Consumer`]
    /// * `max_token_age` - unset means every hybrid check goes remote
    /// * `cache_ttl` - default [`DEFAULT_CACHE_TTL`]
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the project id or base URL is
    /// empty, or the cache TTL is zero.
    #[builder]
    pub fn new(
        #[builder(into)] project_id: String,
        #[builder(into)] base_url: String,
        #[builder(into, default = default_issuer_host())] issuer_host: String,
        #[builder(into, default = default_organization_claim())] organization_claim_key: String,
        #[builder(default)] tenancy: Tenancy,
        max_token_age: Option<Duration>,
        #[builder(default = DEFAULT_CACHE_TTL)] cache_ttl: Duration,
    ) -> Result<Self> {
        let config = Self {
            project_id,
            base_url,
            issuer_host,
            organization_claim_key,
            tenancy,
            max_token_age,
            cache_ttl,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants that deserialization cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(AuthError::configuration("project_id cannot be empty"));
        }
        if self.base_url.trim().is_empty() {
            return Err(AuthError::configuration("base_url cannot be empty"));
        }
        if self.issuer_host.trim().is_empty() {
            return Err(AuthError::configuration("issuer_host cannot be empty"));
        }
        if self.cache_ttl.is_zero() {
            return Err(AuthError::configuration("cache_ttl must be greater than zero"));
        }
        Ok(())
    }

    /// Returns the project id.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the project issuer, `"{issuer_host}/{project_id}"`.
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("{}/{}", self.issuer_host, self.project_id)
    }

    /// Returns `true` if `iss` is an issuer this project trusts.
    #[must_use]
    pub fn accepts_issuer(&self, iss: &str) -> bool {
        iss == self.issuer() || iss == self.base_url
    }

    /// Returns the organization claim key.
    #[must_use]
    pub fn organization_claim_key(&self) -> &str {
        &self.organization_claim_key
    }

    /// Returns the tenancy.
    #[must_use]
    pub fn tenancy(&self) -> Tenancy {
        self.tenancy
    }

    /// Returns the bounded-trust window, if configured.
    #[must_use]
    pub fn max_token_age(&self) -> Option<Duration> {
        self.max_token_age
    }

    /// Returns the cache TTL.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    /// Returns the endpoint layout for this project.
    #[must_use]
    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(self.project_id.clone(), self.tenancy)
    }
}

/// Client credentials sent with token introspection requests.
///
/// The secret is held in [`Zeroizing`] storage and scrubbed on drop. It is
/// never printed by the `Debug` implementation.
#[derive(Clone)]
pub struct IntrospectionCredentials {
    client_id: String,
    client_secret: Option<Zeroizing<String>>,
}

impl IntrospectionCredentials {
    /// Credentials for a public client (no secret).
    #[must_use]
    pub fn public(client_id: impl Into<String>) -> Self {
        Self { client_id: client_id.into(), client_secret: None }
    }

    /// Credentials for a confidential client.
    #[must_use]
    pub fn confidential(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: Some(Zeroizing::new(client_secret.into())),
        }
    }

    /// Returns the client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the client secret, if any.
    #[must_use]
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref().map(String::as_str)
    }
}

impl std::fmt::Debug for IntrospectionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntrospectionCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
