//! Password hashing and verification using Argon2id

use crate::{config::SecurityConfig, error::AppError};
use argon2::{
    password_hash::{
        rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString,
    },
    Algorithm, Argon2, Params, Version,
};

/// Password hasher with fixed parameters
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    /// Create hasher with default parameters (OWASP recommended)
    pub fn new() -> Self {
        // m=64MiB, t=3 iterations, p=4 lanes
        let params = Params::new(65536, 3, 4, None).expect("Invalid Argon2 params");

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        Self { argon2 }
    }

    /// Hash a password
    ///
    /// Empty input is rejected before any hashing work happens.
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        if password.is_empty() {
            return Err(AppError::MissingCredential);
        }

        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!("Failed to hash password: {:?}", e);
                AppError::Internal(format!("Failed to hash password: {}", e))
            })?
            .to_string();

        Ok(password_hash)
    }

    /// Verify a password against a hash
    ///
    /// A mismatch is an ordinary `false`; only an unparsable stored hash is
    /// an error. Comparison timing is handled by the argon2 primitive.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            tracing::error!("Stored password hash is unparsable: {:?}", e);
            AppError::Internal("Stored password hash is unparsable".to_string())
        })?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Validate password against policy
    pub fn validate_policy(password: &str, policy: &SecurityConfig) -> Result<(), AppError> {
        if password.is_empty() {
            return Err(AppError::MissingCredential);
        }

        // Check length
        if password.chars().count() < policy.password_min_length {
            return Err(AppError::PolicyViolation(format!(
                "Password must be at least {} characters",
                policy.password_min_length
            )));
        }

        // Check uppercase
        if policy.password_require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err(AppError::PolicyViolation(
                "Password must contain at least one uppercase letter".to_string(),
            ));
        }

        // Check lowercase
        if policy.password_require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            return Err(AppError::PolicyViolation(
                "Password must contain at least one lowercase letter".to_string(),
            ));
        }

        // Check digit
        if policy.password_require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(AppError::PolicyViolation(
                "Password must contain at least one digit".to_string(),
            ));
        }

        // Check special character
        if policy.password_require_special {
            let has_special = password.chars().any(|c| !c.is_alphanumeric());
            if !has_special {
                return Err(AppError::PolicyViolation(
                    "Password must contain at least one special character".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn strict_policy() -> SecurityConfig {
        SecurityConfig {
            access_token_secret: Secret::new(
                "test-access-secret-key-min-32-characters!".to_string(),
            ),
            refresh_token_secret: Secret::new(
                "test-refresh-secret-key-min-32-characters".to_string(),
            ),
            access_token_exp_secs: 7200,
            refresh_token_exp_secs: 604800,
            password_min_length: 8,
            password_require_uppercase: true,
            password_require_lowercase: true,
            password_require_digit: true,
            password_require_special: true,
        }
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new();
        let password = "Str0ng!Pass";

        let hash = hasher.hash(password).unwrap();
        assert!(hasher.verify(password, &hash).unwrap());
    }

    #[test]
    fn test_verify_fails_with_wrong_password() {
        let hasher = PasswordHasher::new();
        let hash = hasher.hash("Str0ng!Pass").unwrap();
        assert!(!hasher.verify("Wr0ng!Pass", &hash).unwrap());
    }

    #[test]
    fn test_hash_is_different_each_time() {
        let hasher = PasswordHasher::new();
        let password = "Str0ng!Pass";

        let hash1 = hasher.hash(password).unwrap();
        let hash2 = hasher.hash(password).unwrap();

        assert_ne!(hash1, hash2);

        assert!(hasher.verify(password, &hash1).unwrap());
        assert!(hasher.verify(password, &hash2).unwrap());
    }

    #[test]
    fn test_hash_rejects_empty_password() {
        let hasher = PasswordHasher::new();
        assert!(matches!(
            hasher.hash(""),
            Err(AppError::MissingCredential)
        ));
    }

    #[test]
    fn test_hash_is_not_the_password() {
        let hasher = PasswordHasher::new();
        let password = "Str0ng!Pass";
        let hash = hasher.hash(password).unwrap();
        assert!(!hash.contains(password));
    }

    #[test]
    fn test_policy_accepts_strong_password() {
        let policy = strict_policy();
        assert!(PasswordHasher::validate_policy("Str0ng!Pass", &policy).is_ok());
    }

    #[test]
    fn test_policy_rejects_short_password() {
        let policy = strict_policy();
        // 7 characters, all classes present
        assert!(PasswordHasher::validate_policy("short1!", &policy).is_err());
    }

    #[test]
    fn test_policy_rejects_missing_character_classes() {
        let policy = strict_policy();
        // no uppercase
        assert!(PasswordHasher::validate_policy("str0ng!pass", &policy).is_err());
        // no lowercase
        assert!(PasswordHasher::validate_policy("STR0NG!PASS", &policy).is_err());
        // no digit
        assert!(PasswordHasher::validate_policy("Strong!Pass", &policy).is_err());
        // no special character
        assert!(PasswordHasher::validate_policy("Str0ngPass", &policy).is_err());
    }

    #[test]
    fn test_policy_rejects_empty_password_distinctly() {
        let policy = strict_policy();
        assert!(matches!(
            PasswordHasher::validate_policy("", &policy),
            Err(AppError::MissingCredential)
        ));
    }
}
