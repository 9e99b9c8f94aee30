//! Machine-to-machine access token authentication.
//!
//! M2M tokens are always verified locally; there is no remote fallback. The
//! required scopes are checked with the static colon-wildcard matcher
//! ([`warden_authz::scopes_authorized`]), not against the RBAC policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use warden_authz::first_unmet_scope;

use crate::{
    error::{AuthError, Result},
    jwt::decode_jwt_payload,
    verifier::{TokenVerifier, now},
};

/// Claims excluded from [`M2mClaims::custom_claims`].
pub const M2M_RESERVED_CLAIMS: &[&str] = &["aud", "exp", "iat", "iss", "jti", "nbf", "sub"];

/// Identity carried by an authenticated M2M token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct M2mClaims {
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// The client the token was issued to (`sub`).
    pub client_id: String,
    /// Every other claim, including `scope`.
    pub custom_claims: Map<String, Value>,
}

impl TokenVerifier {
    /// Authenticates an M2M access token locally.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MalformedToken`] when the token cannot be verified
    ///   locally at all
    /// - every error of [`verify_local`](Self::verify_local)
    /// - [`AuthError::TokenTooOld`] when `max_token_age` is given and the
    ///   token was issued earlier than that
    /// - [`AuthError::MissingRequiredScope`] naming the first required scope
    ///   the token does not grant
    #[tracing::instrument(skip(self, token, required_scopes), fields(mode = "m2m"))]
    pub async fn authenticate_m2m<S: AsRef<str> + Sync>(
        &self,
        token: &str,
        required_scopes: &[S],
        max_token_age: Option<Duration>,
    ) -> Result<M2mClaims> {
        let claims = self
            .local_claims(token)
            .await?
            .ok_or_else(|| AuthError::malformed_token("token cannot be verified locally"))?;

        if let Some(max_age) = max_token_age
            && !claims.issued_within(max_age, now())
        {
            return Err(AuthError::TokenTooOld);
        }

        let scopes: Vec<String> = claims.scopes().into_iter().map(str::to_owned).collect();
        if let Some(missing) = first_unmet_scope(&scopes, required_scopes) {
            tracing::debug!(client_id = %claims.subject, scope = missing, "missing required scope");
            return Err(AuthError::missing_required_scope(missing));
        }

        let custom_claims = decode_jwt_payload(token)?
            .into_iter()
            .filter(|(key, _)| !M2M_RESERVED_CLAIMS.contains(&key.as_str()))
            .collect();

        Ok(M2mClaims { scopes, client_id: claims.subject, custom_claims })
    }
}
