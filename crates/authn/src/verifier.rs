//! Local, remote and bounded-trust token verification.
//!
//! # Architecture
//!
//! ```text
//! authenticate(token)
//!   ├─ max_token_age unset or zero ──────────────► verify remotely
//!   ├─ verify locally
//!   │    ├─ ok and iat + max_token_age >= now ──► trust local claims
//!   │    └─ too old / malformed / any error ────► verify remotely
//!   └─ remote says inactive ─────────────────────► TokenInactive
//! then, if a request was given: authorize(claims, request)
//! ```
//!
//! Local verification never calls the network except to fetch signing keys.
//! An unusable token shape (no `kid`, undecodable segments) yields
//! `Ok(None)` rather than an error, so that callers can fall back to remote
//! verification.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use warden_authz::{AuthorizationEvaluator, AuthorizationMode, AuthorizationRequest};
use warden_transport::{ApiTransport, Tenancy};

use crate::{
    claims::VerifiedClaims,
    config::{IntrospectionCredentials, VerifierConfig},
    error::{AuthError, Result},
    jwt::{decode_jwt_header, decode_jwt_payload, validate_claims, verify_signature},
    key_directory::KeyDirectory,
    remote::{IntrospectionVerifier, RemoteVerifier, SessionVerifier},
    validation::{is_valid_kid, validate_algorithm},
};

/// Verifies tokens for one project and optionally authorizes the subject.
///
/// Holds no global state; the key directory and remote verifier are shared
/// through `Arc` and may be reused across verifiers.
pub struct TokenVerifier {
    config: VerifierConfig,
    keys: Arc<KeyDirectory>,
    remote: Arc<dyn RemoteVerifier>,
    evaluator: Option<AuthorizationEvaluator>,
    authorization_mode: AuthorizationMode,
}

#[bon::bon]
impl TokenVerifier {
    /// Creates a verifier.
    ///
    /// # Optional Fields
    ///
    /// * `keys` - a shared key directory; default is a fresh directory on
    ///   `transport` with the configured cache TTL
    /// * `remote` - the remote verifier; default is token introspection when
    ///   `credentials` are given, session authentication otherwise
    /// * `evaluator` - required only when authorization requests are passed
    /// * `authorization_mode` - default follows the tenancy: tenant checks
    ///   for B2B, consumer checks otherwise
    #[builder]
    pub fn new(
        config: VerifierConfig,
        transport: Arc<dyn ApiTransport>,
        keys: Option<Arc<KeyDirectory>>,
        remote: Option<Arc<dyn RemoteVerifier>>,
        credentials: Option<IntrospectionCredentials>,
        evaluator: Option<AuthorizationEvaluator>,
        authorization_mode: Option<AuthorizationMode>,
    ) -> Self {
        let keys = keys.unwrap_or_else(|| {
            Arc::new(
                KeyDirectory::new(Arc::clone(&transport), &config.endpoints())
                    .with_ttl(config.cache_ttl()),
            )
        });

        let remote: Arc<dyn RemoteVerifier> = match (remote, credentials) {
            (Some(remote), _) => remote,
            (None, Some(credentials)) => {
                Arc::new(IntrospectionVerifier::new(Arc::clone(&transport), &config, credentials))
            },
            (None, None) => Arc::new(SessionVerifier::new(Arc::clone(&transport), &config)),
        };

        let authorization_mode = authorization_mode.unwrap_or(match config.tenancy() {
            Tenancy::B2b => AuthorizationMode::Tenant,
            Tenancy::Consumer => AuthorizationMode::Consumer,
        });

        Self { config, keys, remote, evaluator, authorization_mode }
    }
}

impl TokenVerifier {
    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Returns the key directory.
    #[must_use]
    pub fn keys(&self) -> &Arc<KeyDirectory> {
        &self.keys
    }

    /// Returns the authorization mode applied to requests.
    #[must_use]
    pub fn authorization_mode(&self) -> AuthorizationMode {
        self.authorization_mode
    }

    /// Verifies a token using only the cached signing keys.
    ///
    /// Returns `Ok(None)` if the token cannot be decoded, carries no usable
    /// `kid`, or has a valid signature over claims lacking a string `sub`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::IncorrectAlgorithm`] for anything but RS256
    /// - [`AuthError::KeyNotFound`] when no key matches after one refresh
    /// - [`AuthError::InvalidSignature`]
    /// - [`AuthError::InvalidIssuer`] / [`AuthError::InvalidAudience`]
    /// - [`AuthError::ExpiredSignature`] / [`AuthError::TokenNotYetValid`]
    /// - [`AuthError::Authorization`] / [`AuthError::AuthorizationUnavailable`]
    ///   when `request` is given
    /// - [`AuthError::Transport`] when the key set cannot be fetched
    #[tracing::instrument(skip(self, token, request), fields(mode = "local"))]
    pub async fn verify_local(
        &self,
        token: &str,
        request: Option<&AuthorizationRequest>,
    ) -> Result<Option<VerifiedClaims>> {
        let Some(claims) = self.local_claims(token).await? else {
            return Ok(None);
        };
        self.authorize(&claims, request).await?;
        Ok(Some(claims))
    }

    /// Verifies a token with the remote verifier.
    ///
    /// Returns `Ok(None)` when the issuer reports the token as inactive.
    ///
    /// # Errors
    ///
    /// - any error from the [`RemoteVerifier`]
    /// - [`AuthError::Authorization`] / [`AuthError::AuthorizationUnavailable`]
    ///   when `request` is given
    #[tracing::instrument(skip(self, token, request), fields(mode = "remote"))]
    pub async fn verify_remote(
        &self,
        token: &str,
        request: Option<&AuthorizationRequest>,
    ) -> Result<Option<VerifiedClaims>> {
        let Some(claims) = self.remote.verify(token).await? else {
            return Ok(None);
        };
        self.authorize(&claims, request).await?;
        Ok(Some(claims))
    }

    /// Bounded-trust verification.
    ///
    /// A locally verified token issued within `max_token_age` is trusted
    /// without a network call. Everything else (no window configured, an
    /// older token, any local failure) is verified remotely, exactly once.
    ///
    /// # Errors
    ///
    /// - [`AuthError::TokenInactive`] when the remote verifier rejects the token
    /// - any error from the remote verifier
    /// - authorization errors as for [`verify_local`](Self::verify_local)
    #[tracing::instrument(skip(self, token, request), fields(mode = "hybrid"))]
    pub async fn authenticate(
        &self,
        token: &str,
        request: Option<&AuthorizationRequest>,
    ) -> Result<VerifiedClaims> {
        let claims = match self.config.max_token_age() {
            Some(max_age) if !max_age.is_zero() => self.bounded_local(token, max_age).await,
            _ => {
                tracing::debug!("no trust window configured");
                None
            },
        };

        let claims = match claims {
            Some(claims) => claims,
            None => self.remote.verify(token).await?.ok_or(AuthError::TokenInactive)?,
        };

        self.authorize(&claims, request).await?;
        Ok(claims)
    }

    /// Local claims if the token verifies locally and is young enough.
    async fn bounded_local(&self, token: &str, max_age: Duration) -> Option<VerifiedClaims> {
        match self.local_claims(token).await {
            Ok(Some(claims)) if claims.issued_within(max_age, now()) => {
                tracing::debug!(subject = %claims.subject, "trusting local verification");
                Some(claims)
            },
            Ok(Some(_)) => {
                tracing::debug!(max_age_secs = max_age.as_secs(), "token older than trust window");
                None
            },
            Ok(None) => {
                tracing::debug!("token not locally verifiable");
                None
            },
            Err(err) => {
                tracing::warn!(error = %err, "local verification failed, verifying remotely");
                None
            },
        }
    }

    pub(crate) async fn local_claims(&self, token: &str) -> Result<Option<VerifiedClaims>> {
        let header = match decode_jwt_header(token) {
            Ok(header) => header,
            Err(err) => {
                tracing::debug!(error = %err, "undecodable token header");
                return Ok(None);
            },
        };
        if let Err(err) = decode_jwt_payload(token) {
            tracing::debug!(error = %err, "undecodable token payload");
            return Ok(None);
        }
        let Some(kid) = header.kid.filter(|kid| is_valid_kid(kid)) else {
            tracing::debug!("token has no usable kid");
            return Ok(None);
        };

        validate_algorithm(&header.alg)?;
        let key = self.keys.lookup(&kid).await?;
        let payload = verify_signature(token, &key)?;
        let organization_claim = self.config.organization_claim_key();
        let claims = match VerifiedClaims::from_payload(&payload, organization_claim) {
            Ok(claims) => claims,
            Err(AuthError::MalformedToken(reason)) => {
                tracing::debug!(kid = %kid, reason = %reason, "signed token has unusable claims");
                return Ok(None);
            },
            Err(err) => return Err(err),
        };
        validate_claims(&claims, &self.config, now())?;

        tracing::debug!(kid = %kid, subject = %claims.subject, "token verified locally");
        Ok(Some(claims))
    }

    async fn authorize(
        &self,
        claims: &VerifiedClaims,
        request: Option<&AuthorizationRequest>,
    ) -> Result<()> {
        let Some(request) = request else {
            return Ok(());
        };
        let Some(evaluator) = &self.evaluator else {
            return Err(AuthError::AuthorizationUnavailable);
        };

        let scopes = claims.scopes();
        match self.authorization_mode {
            AuthorizationMode::Tenant => {
                let organization_id = claims.organization_id().unwrap_or_default();
                evaluator.authorize(&scopes, organization_id, request).await?;
            },
            AuthorizationMode::Consumer => evaluator.authorize_consumer(&scopes, request).await?,
            AuthorizationMode::Scope => evaluator.authorize_scope(&scopes, request).await?,
        }
        Ok(())
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("config", &self.config)
            .field("keys", &self.keys)
            .field("authorization_mode", &self.authorization_mode)
            .field("evaluator", &self.evaluator.is_some())
            .finish_non_exhaustive()
    }
}

pub(crate) fn now() -> i64 {
    Utc::now().timestamp()
}
