//! JWT algorithm and key id validation.
//!
//! Tokens are only ever verified with RS256. Everything else is rejected
//! before a key lookup happens, so an attacker cannot steer verification
//! towards a symmetric or unsigned algorithm.

use crate::error::AuthError;

/// Forbidden JWT algorithms that are never accepted.
///
/// - `none`: No signature verification (trivially bypassable)
/// - `HS256`, `HS384`, `HS512`: Symmetric algorithms (the public key would act as the secret)
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Accepted JWT algorithms.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["RS256"];

/// Maximum accepted length of a `kid` header value.
pub const MAX_KID_LENGTH: usize = 256;

/// Validate a JWT algorithm name.
///
/// # Errors
///
/// Returns [`AuthError::IncorrectAlgorithm`] if the algorithm is forbidden or
/// not in [`ACCEPTED_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use warden_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("RS256").is_ok());
/// assert!(validate_algorithm("ES256").is_err());
/// assert!(validate_algorithm("none").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(AuthError::incorrect_algorithm(format!(
            "Algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(AuthError::incorrect_algorithm(format!(
            "Algorithm '{alg}' is not in accepted list (only RS256 is supported)"
        )));
    }

    Ok(())
}

/// Returns `true` if `kid` is a plausible key id: non-empty, bounded, and
/// free of control characters.
#[must_use]
pub fn is_valid_kid(kid: &str) -> bool {
    !kid.is_empty() && kid.len() <= MAX_KID_LENGTH && !kid.chars().any(char::is_control)
}
