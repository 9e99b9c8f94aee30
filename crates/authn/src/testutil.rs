//! Shared test utilities for token verification.
//!
//! This module provides RSA fixture keys (published as JWKs and usable for
//! signing), a [`TokenBuilder`] for minting RS256 tokens, raw token crafting
//! for attack tests, and verifier setup over a
//! [`MemoryTransport`](warden_transport::MemoryTransport). It is
//! feature-gated behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! warden-authn = { path = "../authn", features = ["testutil"] }
//! ```
//!
//! Then mint tokens against a verifier:
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use warden_authn::testutil::{TokenBuilder, test_config, verifier_with};
//! use warden_transport::MemoryTransport;
//!
//! # async fn example() {
//! let transport = MemoryTransport::new();
//! let verifier = verifier_with(&transport, test_config());
//! let token = TokenBuilder::new().scope("read:users").build();
//! assert!(verifier.verify_local(&token, None).await.unwrap().is_some());
//! # }
//! ```

#![allow(clippy::expect_used)]

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Map, Value, json};
use warden_transport::{MemoryTransport, Tenancy};

use crate::{
    config::{DEFAULT_ORGANIZATION_CLAIM, VerifierConfig},
    key_directory::SigningKey,
    verifier::TokenVerifier,
};

/// Project id used by every fixture.
pub const TEST_PROJECT_ID: &str = "project-test-1";

/// Base URL used by every fixture.
pub const TEST_BASE_URL: &str = "https://api.example.com/";

/// Organization claim key of the fixture configurations.
pub const TEST_ORGANIZATION_CLAIM: &str = DEFAULT_ORGANIZATION_CLAIM;

/// Key id of the primary fixture key.
pub const PRIMARY_KID: &str = "jwk-test-primary";

/// Key id of the rotated fixture key.
pub const ROTATED_KID: &str = "jwk-test-rotated";

const PRIMARY_PEM: &[u8] = include_bytes!("../testdata/primary.pem");
const ROTATED_PEM: &[u8] = include_bytes!("../testdata/rotated.pem");

const PRIMARY_MODULUS: &str = "m9GSWNctn0J4SkLkE7JRqTObzELzd56-n-LCx4oTYr5tfdUS7IK3jdawpJLfuiycMtZaN2D1EP15TyjUGugpxhAiTpfAjqYZbvsNLIx9TeBDKV8-wxhDj9z4d4EO7p9dqR7KNiLCqLOvv77E6WpWuw7Z2-sp8WKiYYEVBaHELSEWsLWFsL69zXCUQ6PlQdsCtnIaziVvT0fRHmpXcXp8JcoFUKFBepq0SF3yyxOwaKPU8W--vD2PmkHvCTKVo2exDGpuzurSriUgI0V8FpnKSsqe1IMzAtO-2Pl4iQztsEA17H0DHXCXC9ahYpb3Zyhi_gkp2jz3wlbZsrpvpW7tdw";
const ROTATED_MODULUS: &str = "tromzJWEan0lIoB1K3_UaVjjQHLFhxRVdNq0-GaThYD2GBzDVKFIFm9keGjSKT-ti9mok9G1lLdPPahoYkNeezlq2OYr51xgQkX60Gveja9B9__XWzF7vzOccN7sVGlZLaJ0lLVYjmb1pidxzjok9pKSHeM6JjBziQSkQr2uVdTeQ3ddY5nT16hJEGJK0PF82uXROU4p49MbN4_4u74BuvWaRyqXObAblmXD0SI4WY2hmZGDPR_uICTo9ZvHS5z6cxowiHHVEIZdgC7h2IyzGqyri0ms7UTY0tT-J5NUzeBJZIhrZXZl84oUDXOcGWjtxOk-9GXCz4-ICA1_GV13LQ";
const PUBLIC_EXPONENT: &str = "AQAB";

fn rsa_jwk(kid: &str, modulus: &str) -> SigningKey {
    SigningKey {
        kid: kid.to_owned(),
        kty: "RSA".to_owned(),
        alg: Some("RS256".to_owned()),
        key_use: Some("sig".to_owned()),
        n: modulus.to_owned(),
        e: PUBLIC_EXPONENT.to_owned(),
    }
}

/// Public half of the primary fixture key.
#[must_use]
pub fn primary_jwk() -> SigningKey {
    rsa_jwk(PRIMARY_KID, PRIMARY_MODULUS)
}

/// Public half of the rotated fixture key.
#[must_use]
pub fn rotated_jwk() -> SigningKey {
    rsa_jwk(ROTATED_KID, ROTATED_MODULUS)
}

/// Wraps keys the way the key-set endpoint returns them.
///
/// # Panics
///
/// Panics if a key cannot be serialized.
#[must_use]
pub fn jwks_response(keys: &[SigningKey]) -> Value {
    json!({
        "keys": serde_json::to_value(keys).expect("signing keys serialize"),
        "request_id": "request-id-test",
        "status_code": 200,
    })
}

/// Consumer configuration for [`TEST_PROJECT_ID`].
///
/// # Panics
///
/// Panics if the fixture configuration fails validation.
#[must_use]
pub fn test_config() -> VerifierConfig {
    VerifierConfig::builder()
        .project_id(TEST_PROJECT_ID)
        .base_url(TEST_BASE_URL)
        .build()
        .expect("fixture config is valid")
}

/// B2B configuration for [`TEST_PROJECT_ID`].
///
/// # Panics
///
/// Panics if the fixture configuration fails validation.
#[must_use]
pub fn b2b_config() -> VerifierConfig {
    VerifierConfig::builder()
        .project_id(TEST_PROJECT_ID)
        .base_url(TEST_BASE_URL)
        .tenancy(Tenancy::B2b)
        .build()
        .expect("fixture config is valid")
}

/// Registers the primary key on the transport and returns a verifier over an
/// empty key directory, so the first local verification performs the fetch.
///
/// The verifier has no evaluator and verifies remotely through session
/// authentication.
#[must_use]
pub fn verifier_with(transport: &MemoryTransport, config: VerifierConfig) -> TokenVerifier {
    transport.respond(config.endpoints().jwks(), jwks_response(&[primary_jwk()]));
    TokenVerifier::builder().config(config).transport(Arc::new(transport.clone())).build()
}

/// An active introspection response for `subject`, issued now.
#[must_use]
pub fn introspection_response(subject: &str, scope: &str) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "active": true,
        "sub": subject,
        "scope": scope,
        "aud": [TEST_PROJECT_ID],
        "iss": format!("stytch.com/{TEST_PROJECT_ID}"),
        "iat": now,
        "exp": now + 3_600,
        "client_id": subject,
        "token_type": "access_token",
        "request_id": "request-id-test",
        "status_code": 200,
    })
}

/// Builder for RS256 tokens signed with a fixture key.
///
/// Defaults: primary key, subject `user-test-1`, issuer and audience of
/// [`TEST_PROJECT_ID`], issued now, expiring in one hour, empty scope.
#[derive(Debug, Clone)]
pub struct TokenBuilder {
    kid: Option<String>,
    pem: &'static [u8],
    claims: Map<String, Value>,
}

impl Default for TokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBuilder {
    /// Starts a token with the default claims.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("sub".into(), json!("user-test-1"));
        claims.insert("iss".into(), json!(format!("stytch.com/{TEST_PROJECT_ID}")));
        claims.insert("aud".into(), json!([TEST_PROJECT_ID]));
        claims.insert("iat".into(), json!(now));
        claims.insert("exp".into(), json!(now + 3_600));
        claims.insert("scope".into(), json!(""));
        Self { kid: Some(PRIMARY_KID.to_owned()), pem: PRIMARY_PEM, claims }
    }

    /// Overrides the `kid` header (the signing key is unchanged).
    #[must_use]
    pub fn kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }

    /// Omits the `kid` header.
    #[must_use]
    pub fn without_kid(mut self) -> Self {
        self.kid = None;
        self
    }

    /// Signs with the rotated key and names it in the header.
    #[must_use]
    pub fn signed_with_rotated_key(mut self) -> Self {
        self.kid = Some(ROTATED_KID.to_owned());
        self.pem = ROTATED_PEM;
        self
    }

    /// Sets `sub`.
    #[must_use]
    pub fn subject(self, subject: &str) -> Self {
        self.claim("sub", subject)
    }

    /// Sets `scope`.
    #[must_use]
    pub fn scope(self, scope: &str) -> Self {
        self.claim("scope", scope)
    }

    /// Sets `iss`.
    #[must_use]
    pub fn issuer(self, issuer: &str) -> Self {
        self.claim("iss", issuer)
    }

    /// Sets `aud` to a single audience.
    #[must_use]
    pub fn audience(self, audience: &str) -> Self {
        self.claim("aud", json!([audience]))
    }

    /// Sets `iat` to `secs` seconds ago.
    #[must_use]
    pub fn issued_ago(self, secs: i64) -> Self {
        self.claim("iat", Utc::now().timestamp() - secs)
    }

    /// Sets `exp` to `secs` seconds from now (negative for the past).
    #[must_use]
    pub fn expires_in(self, secs: i64) -> Self {
        self.claim("exp", Utc::now().timestamp() + secs)
    }

    /// Sets `nbf` to `secs` seconds from now.
    #[must_use]
    pub fn not_before_in(self, secs: i64) -> Self {
        self.claim("nbf", Utc::now().timestamp() + secs)
    }

    /// Sets an arbitrary claim.
    #[must_use]
    pub fn claim(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(key.to_owned(), value.into());
        self
    }

    /// Removes a claim.
    #[must_use]
    pub fn without_claim(mut self, key: &str) -> Self {
        self.claims.remove(key);
        self
    }

    /// Encodes and signs the token.
    ///
    /// # Panics
    ///
    /// Panics if the fixture key cannot be loaded or encoding fails.
    #[must_use]
    pub fn build(self) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.kid;

        let key = EncodingKey::from_rsa_pem(self.pem).expect("fixture key is a valid RSA PEM");
        jsonwebtoken::encode(&header, &self.claims, &key).expect("Failed to encode test JWT")
    }
}

/// Creates a raw JWT string from arbitrary header and payload JSON.
///
/// The resulting JWT has the structure `{header_b64}.{payload_b64}.`
/// with an empty signature. This is useful for testing rejection of
/// malformed or attack JWTs (e.g., `alg: "none"`, algorithm confusion).
///
/// # Panics
///
/// Panics if JSON serialization fails.
#[must_use]
pub fn craft_raw_jwt(header_json: &Value, payload_json: &Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// Asserts that a [`Result<T, AuthError>`](crate::AuthError) is an `Err`
/// matching the given [`AuthError`](crate::AuthError) variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use warden_authn::{AuthError, assert_auth_error};
///
/// let result: Result<(), AuthError> = Err(AuthError::ExpiredSignature);
/// assert_auth_error!(result, ExpiredSignature);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}
