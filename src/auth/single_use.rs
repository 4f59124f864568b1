//! Single-use activation and password-reset tokens
//!
//! Tokens are 256 bits of OS randomness, hex encoded. Only the SHA-256
//! digest of a token is ever persisted; the plaintext goes to the user by
//! mail and is never stored. Consumption happens through one conditional
//! store write keyed on the stored digest, so concurrent attempts resolve to
//! exactly one winner.

use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Validity window for activation and reset tokens
pub const TOKEN_TTL_HOURS: i64 = 24;

const TOKEN_BYTES: usize = 32;

/// A freshly generated single-use token
#[derive(Debug)]
pub struct IssuedToken {
    /// Plaintext value, to be mailed to the user
    pub token: String,
    /// SHA-256 hex digest, to be persisted on the user record
    pub digest: String,
}

/// Generate a new single-use token
pub fn generate() -> IssuedToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    let digest = digest(&token);
    IssuedToken { token, digest }
}

/// SHA-256 hex digest of a token value
pub fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Check a presented token against the stored digest and creation time
///
/// Digests are compared instead of raw values: comparison timing then carries
/// no information about the stored token. A cleared or absent stored token is
/// a mismatch (the token was already consumed or never issued).
pub fn check(
    presented: &str,
    stored_digest: Option<&str>,
    created_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let (stored, created_at) = match (stored_digest, created_at) {
        (Some(stored), Some(created_at)) => (stored, created_at),
        _ => return Err(AppError::TokenMismatch),
    };

    if digest(presented) != stored {
        return Err(AppError::TokenMismatch);
    }

    if now.signed_duration_since(created_at) > Duration::hours(TOKEN_TTL_HOURS) {
        return Err(AppError::TokenExpired);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_distinct_and_high_entropy() {
        let a = generate();
        let b = generate();

        // 32 bytes hex encoded
        assert_eq!(a.token.len(), 64);
        assert_eq!(a.digest.len(), 64);
        assert_ne!(a.token, b.token);
        assert_ne!(a.token, a.digest);
    }

    #[test]
    fn test_check_accepts_valid_token_within_window() {
        let issued = generate();
        let created = Utc::now() - Duration::hours(1);

        assert!(check(&issued.token, Some(&issued.digest), Some(created), Utc::now()).is_ok());
    }

    #[test]
    fn test_check_rejects_wrong_token() {
        let issued = generate();
        let other = generate();
        let created = Utc::now();

        assert!(matches!(
            check(&other.token, Some(&issued.digest), Some(created), Utc::now()),
            Err(AppError::TokenMismatch)
        ));
    }

    #[test]
    fn test_check_rejects_cleared_token() {
        let issued = generate();

        assert!(matches!(
            check(&issued.token, None, None, Utc::now()),
            Err(AppError::TokenMismatch)
        ));
    }

    #[test]
    fn test_check_rejects_token_past_window() {
        let issued = generate();
        let created = Utc::now() - Duration::hours(TOKEN_TTL_HOURS) - Duration::minutes(1);

        assert!(matches!(
            check(&issued.token, Some(&issued.digest), Some(created), Utc::now()),
            Err(AppError::TokenExpired)
        ));
    }

    #[test]
    fn test_check_accepts_token_just_inside_window() {
        let issued = generate();
        let created = Utc::now() - Duration::hours(TOKEN_TTL_HOURS) + Duration::minutes(1);

        assert!(check(&issued.token, Some(&issued.digest), Some(created), Utc::now()).is_ok());
    }
}
