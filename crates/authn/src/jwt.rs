//! JWT decoding, signature verification and claim checks.
//!
//! The header and payload are decoded by hand so that any `alg` value,
//! including ones the signing library does not model (`none`), reaches
//! [`validate_algorithm`](crate::validation::validate_algorithm) and is
//! rejected with a precise error.
//!
//! # Example
//!
//! ```
//! use warden_authn::jwt::decode_jwt_header;
//!
//! // {"alg":"RS256","kid":"jwk-test-1"}.{}.
//! let header = decode_jwt_header("eyJhbGciOiJSUzI1NiIsImtpZCI6Imp3ay10ZXN0LTEifQ.e30.")?;
//! assert_eq!(header.alg, "RS256");
//! assert_eq!(header.kid.as_deref(), Some("jwk-test-1"));
//! # Ok::<(), warden_authn::AuthError>(())
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    claims::VerifiedClaims,
    config::VerifierConfig,
    error::{AuthError, Result},
};

/// The JOSE header members the verifier looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtHeader {
    /// Signing algorithm, as written in the token.
    pub alg: String,
    /// Key ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Token media type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

fn segments(token: &str) -> Result<[&str; 3]> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) => Ok([header, payload, signature]),
        _ => Err(AuthError::malformed_token("JWT must have 3 parts separated by dots")),
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str, what: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::malformed_token(format!("Failed to decode JWT {what}: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::malformed_token(format!("Failed to parse JWT {what}: {e}")))
}

/// Decode the JWT header without verification.
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] if the token does not have three
/// segments or the header is not base64url-encoded JSON with an `alg`.
pub fn decode_jwt_header(token: &str) -> Result<JwtHeader> {
    let [header, ..] = segments(token)?;
    decode_segment(header, "header")
}

/// Decode the JWT payload without verification.
///
/// # Errors
///
/// Returns [`AuthError::MalformedToken`] if the payload is not a
/// base64url-encoded JSON object.
pub fn decode_jwt_payload(token: &str) -> Result<Map<String, Value>> {
    let [_, payload, _] = segments(token)?;
    decode_segment(payload, "payload")
}

/// Verify an RS256 signature and return the payload.
///
/// Only the signature is checked here. Time, issuer and audience checks run
/// in [`validate_claims`] so that their failures map onto distinct errors.
///
/// # Errors
///
/// Returns [`AuthError::InvalidSignature`] on a bad signature, or another
/// [`AuthError`] mapped from the decoding failure.
pub fn verify_signature(token: &str, key: &DecodingKey) -> Result<Map<String, Value>> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation.leeway = 0;

    let token_data = decode::<Map<String, Value>>(token, key, &validation)?;
    Ok(token_data.claims)
}

/// Check issuer, audience, expiry and not-before of verified claims.
///
/// `now` is seconds since the epoch. No leeway is applied: a token whose
/// `exp` equals `now` is expired.
///
/// # Errors
///
/// The first failing check, in this order:
/// - [`AuthError::InvalidIssuer`]
/// - [`AuthError::InvalidAudience`]
/// - [`AuthError::ExpiredSignature`] (also when `exp` is absent)
/// - [`AuthError::TokenNotYetValid`]
pub fn validate_claims(claims: &VerifiedClaims, config: &VerifierConfig, now: i64) -> Result<()> {
    if !config.accepts_issuer(&claims.issuer) {
        return Err(AuthError::invalid_issuer(format!(
            "expected '{}' or '{}', got '{}'",
            config.issuer(),
            config.base_url(),
            claims.issuer
        )));
    }

    if !claims.audience.iter().any(|aud| aud == config.project_id()) {
        return Err(AuthError::invalid_audience(format!(
            "expected '{}' in {:?}",
            config.project_id(),
            claims.audience
        )));
    }

    match claims.expires_at {
        Some(exp) if exp > now => {},
        _ => return Err(AuthError::ExpiredSignature),
    }

    if let Some(nbf) = claims.not_before
        && nbf > now
    {
        return Err(AuthError::TokenNotYetValid);
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{
        config::DEFAULT_ORGANIZATION_CLAIM,
        testutil::{
            PRIMARY_KID, TEST_PROJECT_ID, TokenBuilder, craft_raw_jwt, primary_jwk, rotated_jwk,
            test_config,
        },
    };

    const NOW: i64 = 1_700_000_000;

    fn claims(body: Value) -> VerifiedClaims {
        match body {
            Value::Object(map) => {
                VerifiedClaims::from_payload(&map, DEFAULT_ORGANIZATION_CLAIM).unwrap()
            },
            other => panic!("expected object, got {other}"),
        }
    }

    fn valid_body() -> Value {
        json!({
            "sub": "user-test-1",
            "iss": format!("stytch.com/{TEST_PROJECT_ID}"),
            "aud": [TEST_PROJECT_ID],
            "iat": NOW - 10,
            "exp": NOW + 3_600,
        })
    }

    #[test]
    fn test_decode_header_reads_any_alg() {
        let token = craft_raw_jwt(&json!({ "alg": "none", "kid": "k" }), &json!({}));
        let header = decode_jwt_header(&token).unwrap();
        assert_eq!(header.alg, "none");
        assert_eq!(header.kid.as_deref(), Some("k"));
    }

    #[rstest]
    #[case::empty("")]
    #[case::one_segment("abc")]
    #[case::two_segments("abc.def")]
    #[case::four_segments("a.b.c.d")]
    #[case::bad_base64("!!!.!!!.!!!")]
    fn test_decode_header_malformed(#[case] token: &str) {
        assert!(matches!(decode_jwt_header(token), Err(AuthError::MalformedToken(_))));
    }

    #[test]
    fn test_decode_header_without_alg_is_malformed() {
        let token = craft_raw_jwt(&json!({ "kid": "k" }), &json!({}));
        assert!(matches!(decode_jwt_header(&token), Err(AuthError::MalformedToken(_))));
    }

    #[test]
    fn test_decode_payload_rejects_non_object() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        let token = format!("{header}.{payload}.sig");
        assert!(matches!(decode_jwt_payload(&token), Err(AuthError::MalformedToken(_))));
    }

    #[test]
    fn test_verify_signature_with_matching_key() {
        let token = TokenBuilder::new().claim("favorite_color", "green").build();
        let key = primary_jwk().decoding_key().unwrap();

        let payload = verify_signature(&token, &key).unwrap();
        assert_eq!(payload["favorite_color"], "green");
    }

    #[test]
    fn test_verify_signature_does_not_check_expiry() {
        let token = TokenBuilder::new().expires_in(-3_600).build();
        let key = primary_jwk().decoding_key().unwrap();
        assert!(verify_signature(&token, &key).is_ok());
    }

    #[test]
    fn test_verify_signature_with_wrong_key() {
        let token = TokenBuilder::new().kid(PRIMARY_KID).build();
        let key = rotated_jwk().decoding_key().unwrap();
        assert!(matches!(verify_signature(&token, &key), Err(AuthError::InvalidSignature)));
    }

    #[test]
    fn test_validate_claims_accepts_valid() {
        validate_claims(&claims(valid_body()), &test_config(), NOW).unwrap();
    }

    #[test]
    fn test_validate_claims_accepts_base_url_issuer() {
        let mut body = valid_body();
        body["iss"] = json!(test_config().base_url());
        validate_claims(&claims(body), &test_config(), NOW).unwrap();
    }

    #[rstest]
    #[case::wrong_issuer("iss", json!("stytch.com/project-other"))]
    #[case::missing_issuer("iss", json!(null))]
    #[case::wrong_audience("aud", json!(["project-other"]))]
    #[case::missing_audience("aud", json!(null))]
    #[case::expired("exp", json!(NOW - 1))]
    #[case::expires_now("exp", json!(NOW))]
    #[case::missing_expiry("exp", json!(null))]
    #[case::not_yet_valid("nbf", json!(NOW + 60))]
    fn test_validate_claims_rejects(#[case] claim: &str, #[case] value: Value) {
        let mut body = valid_body();
        body[claim] = value;

        let err = validate_claims(&claims(body), &test_config(), NOW).unwrap_err();
        let expected = match claim {
            "iss" => matches!(err, AuthError::InvalidIssuer(_)),
            "aud" => matches!(err, AuthError::InvalidAudience(_)),
            "exp" => matches!(err, AuthError::ExpiredSignature),
            _ => matches!(err, AuthError::TokenNotYetValid),
        };
        assert!(expected, "unexpected error for {claim}: {err:?}");
    }

    #[test]
    fn test_issuer_checked_before_expiry() {
        let mut body = valid_body();
        body["iss"] = json!("evil.example.com");
        body["exp"] = json!(NOW - 100);
        let err = validate_claims(&claims(body), &test_config(), NOW).unwrap_err();
        assert!(matches!(err, AuthError::InvalidIssuer(_)));
    }

    /// Known-bad inputs must be rejected without panicking.
    mod fuzz_regressions {
        use super::*;

        fn exercise_parsing(token: &str) -> bool {
            let header = decode_jwt_header(token);
            let payload = decode_jwt_payload(token);
            header.is_ok() && payload.is_ok()
        }

        #[test]
        fn degenerate_inputs_no_panic() {
            for token in ["", ".", "..", "...", "not-a-jwt", "!!!.!!!.!!!"] {
                assert!(!exercise_parsing(token), "{token:?} should not parse");
            }
        }

        #[test]
        fn invalid_payload_json_no_panic() {
            let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
            let payload = URL_SAFE_NO_PAD.encode(b"not-json");
            assert!(!exercise_parsing(&format!("{header}.{payload}.sig")));
        }

        #[test]
        fn null_byte_kid_parses_but_is_not_trusted() {
            let token = craft_raw_jwt(&json!({ "alg": "RS256", "kid": "jwk\u{0}" }), &json!({}));
            let header = decode_jwt_header(&token).unwrap();
            assert!(!crate::validation::is_valid_kid(header.kid.as_deref().unwrap()));
        }

        #[test]
        fn oversized_payload_no_panic() {
            let big = "a".repeat(100_000);
            let token = craft_raw_jwt(&json!({ "alg": "RS256" }), &json!({ "sub": big }));
            assert!(exercise_parsing(&token));
        }
    }
}
