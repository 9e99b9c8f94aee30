//! Normalized claims of a verified token.
//!
//! Local verification, token introspection and session authentication all
//! produce a [`VerifiedClaims`]. Standard claims are lifted into typed
//! fields; everything else lands in [`VerifiedClaims::custom_claims`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, Result};

/// Claim names that are never copied into custom claims.
///
/// Covers the registered JWT claims plus the bookkeeping fields of an
/// introspection response. The configured organization claim key is excluded
/// as well.
pub const RESERVED_CLAIMS: &[&str] = &[
    "aud",
    "exp",
    "iat",
    "iss",
    "jti",
    "nbf",
    "sub",
    "active",
    "client_id",
    "request_id",
    "scope",
    "status_code",
    "token_type",
];

/// Token type assumed when a token does not state one.
pub const DEFAULT_TOKEN_TYPE: &str = "access_token";

/// Claim carrying session metadata in session tokens.
pub const SESSION_CLAIM: &str = "https://stytch.com/session";

/// Claims of a token that passed verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedClaims {
    /// Subject (user, member or client id).
    pub subject: String,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: String,
    /// Audiences the token was issued for.
    #[serde(default)]
    pub audience: Vec<String>,
    /// Issued-at, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    /// Expiry, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Not-before, seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<i64>,
    /// Issuer.
    #[serde(default)]
    pub issuer: String,
    /// Token type.
    pub token_type: String,
    /// Organization object of multi-tenant tokens, verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<Map<String, Value>>,
    /// All non-reserved claims.
    #[serde(default)]
    pub custom_claims: Map<String, Value>,
}

impl VerifiedClaims {
    /// Builds claims from a decoded token payload or an introspection body.
    ///
    /// The organization object is read from `organization_claim_key` and is
    /// not repeated in the custom claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedToken`] if `sub` is missing, or a
    /// standard claim has the wrong JSON type.
    pub fn from_payload(
        payload: &Map<String, Value>,
        organization_claim_key: &str,
    ) -> Result<Self> {
        let subject = payload
            .get("sub")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::malformed_token("missing 'sub' claim"))?
            .to_owned();

        let organization = match payload.get(organization_claim_key) {
            None | Some(Value::Null) => None,
            Some(Value::Object(org)) => Some(org.clone()),
            Some(_) => {
                return Err(AuthError::malformed_token(format!(
                    "'{organization_claim_key}' claim must be an object"
                )));
            },
        };

        let custom_claims = payload
            .iter()
            .filter(|(key, _)| {
                !RESERVED_CLAIMS.contains(&key.as_str()) && key.as_str() != organization_claim_key
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Ok(Self {
            subject,
            scope: optional_str(payload, "scope")?.unwrap_or_default(),
            audience: audience(payload)?,
            issued_at: timestamp(payload, "iat")?,
            expires_at: timestamp(payload, "exp")?,
            not_before: timestamp(payload, "nbf")?,
            issuer: optional_str(payload, "iss")?.unwrap_or_default(),
            token_type: optional_str(payload, "token_type")?
                .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_owned()),
            organization,
            custom_claims,
        })
    }

    /// Granted scopes, split on whitespace.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scope.split_whitespace().collect()
    }

    /// The `organization_id` member of the organization claim.
    #[must_use]
    pub fn organization_id(&self) -> Option<&str> {
        self.organization.as_ref()?.get("organization_id")?.as_str()
    }

    /// Returns `true` if the token was issued no more than `max_age` before
    /// `now` (seconds since the epoch). Tokens without `iat` never qualify.
    #[must_use]
    pub fn issued_within(&self, max_age: Duration, now: i64) -> bool {
        let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        self.issued_at.is_some_and(|iat| iat.saturating_add(max_age) >= now)
    }

    /// Decodes the session metadata claim, if present and well formed.
    #[must_use]
    pub fn session(&self) -> Option<SessionClaim> {
        let value = self.custom_claims.get(SESSION_CLAIM)?;
        match SessionClaim::deserialize(value) {
            Ok(session) => Some(session),
            Err(err) => {
                tracing::debug!(error = %err, "ignoring malformed session claim");
                None
            },
        }
    }
}

/// Session metadata embedded in session tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaim {
    /// Session id.
    pub id: String,
    /// When the session started (RFC 3339).
    #[serde(default)]
    pub started_at: Option<String>,
    /// When the session was last used (RFC 3339).
    #[serde(default)]
    pub last_accessed_at: Option<String>,
    /// When the session expires (RFC 3339).
    #[serde(default)]
    pub expires_at: Option<String>,
    /// Client attributes recorded with the session.
    #[serde(default)]
    pub attributes: Option<Value>,
    /// Factors the user authenticated with.
    #[serde(default)]
    pub authentication_factors: Vec<Value>,
}

fn optional_str(payload: &Map<String, Value>, claim: &str) -> Result<Option<String>> {
    match payload.get(claim) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(AuthError::malformed_token(format!("'{claim}' claim must be a string"))),
    }
}

fn timestamp(payload: &Map<String, Value>, claim: &str) -> Result<Option<i64>> {
    match payload.get(claim) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|secs| secs as i64))
            .map(Some)
            .ok_or_else(|| AuthError::malformed_token(format!("'{claim}' claim must be numeric"))),
    }
}

fn audience(payload: &Map<String, Value>) -> Result<Vec<String>> {
    let invalid = || AuthError::malformed_token("'aud' claim must be a string or array of strings");
    match payload.get("aud") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(aud)) => Ok(vec![aud.clone()]),
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| v.as_str().map(str::to_owned).ok_or_else(invalid))
            .collect(),
        Some(_) => Err(invalid()),
    }
}
