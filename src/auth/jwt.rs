//! JWT token issuance and verification
//! Implements the access token + refresh token pattern with independent
//! signing secrets so a leaked access secret never extends to refresh tokens.

use crate::{config::SecurityConfig, error::AppError, models::user::User};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Verification failure kinds
///
/// Callers inside the crate may branch on these (expiry can justify a refresh
/// flow, an integrity failure never does); the HTTP boundary folds every kind
/// into one uniform authentication failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("unexpected signing algorithm")]
    UnexpectedAlgorithm,

    #[error("malformed token")]
    Malformed,

    #[error("wrong token type")]
    WrongTokenType,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::UnexpectedAlgorithm
            }
            _ => TokenError::Malformed,
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        // The kind is preserved for logging only; the caller-facing error
        // never distinguishes signature, expiry, or shape failures.
        tracing::debug!(kind = %e, "Token verification failed");
        AppError::Unauthorized
    }
}

/// JWT claims
///
/// Every field is required; a payload missing any of them fails decoding as
/// `Malformed` rather than defaulting.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Username
    pub username: String,

    /// User role at issuance
    pub role: String,

    /// Activation state at issuance
    pub is_activated: bool,

    /// Token type (access or refresh)
    pub token_type: String,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

impl Claims {
    /// Parse the subject into a user id
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }
}

const TOKEN_TYPE_ACCESS: &str = "access";
const TOKEN_TYPE_REFRESH: &str = "refresh";

/// One secret + TTL pair
struct KeySet {
    encoding: EncodingKey,
    decoding: DecodingKey,
    exp_secs: u64,
}

impl KeySet {
    fn from_secret(secret: &str, exp_secs: u64, label: &str) -> Result<Self, AppError> {
        // HS256 needs at least 32 bytes of key material
        if secret.len() < 32 {
            return Err(AppError::Config(format!(
                "{} secret too short (min 32 chars)",
                label
            )));
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            exp_secs,
        })
    }
}

/// JWT service
pub struct JwtService {
    access: KeySet,
    refresh: KeySet,
}

impl JwtService {
    /// Create JWT service from the security configuration
    pub fn from_config(security: &SecurityConfig) -> Result<Self, AppError> {
        Ok(Self {
            access: KeySet::from_secret(
                security.access_token_secret.expose_secret(),
                security.access_token_exp_secs,
                "Access token",
            )?,
            refresh: KeySet::from_secret(
                security.refresh_token_secret.expose_secret(),
                security.refresh_token_exp_secs,
                "Refresh token",
            )?,
        })
    }

    /// Seconds until a freshly issued access token expires
    pub fn access_token_exp_secs(&self) -> u64 {
        self.access.exp_secs
    }

    /// Issue an access token from a user snapshot
    pub fn issue_access(&self, user: &User) -> Result<String, AppError> {
        self.issue(&self.access, user, TOKEN_TYPE_ACCESS)
    }

    /// Issue a refresh token from a user snapshot
    pub fn issue_refresh(&self, user: &User) -> Result<String, AppError> {
        self.issue(&self.refresh, user, TOKEN_TYPE_REFRESH)
    }

    /// Verify a token against the access secret
    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(&self.access, token, TOKEN_TYPE_ACCESS)
    }

    /// Verify a token against the refresh secret
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(&self.refresh, token, TOKEN_TYPE_REFRESH)
    }

    fn issue(&self, keys: &KeySet, user: &User, token_type: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let expiration = now + Duration::seconds(keys.exp_secs as i64);

        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.clone(),
            is_activated: user.is_activated,
            token_type: token_type.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &keys.encoding).map_err(|e| {
            tracing::error!("Failed to encode {} token: {:?}", token_type, e);
            AppError::Internal(format!("Failed to encode {} token: {}", token_type, e))
        })
    }

    fn verify(
        &self,
        keys: &KeySet,
        token: &str,
        expected_type: &str,
    ) -> Result<Claims, TokenError> {
        // Exactly the issuing algorithm family is acceptable; anything else
        // (other families, "none") is rejected before signature checking.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &keys.decoding, &validation)
            .map_err(TokenError::from)?
            .claims;

        if claims.token_type != expected_type {
            return Err(TokenError::WrongTokenType);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use secrecy::Secret;

    const ACCESS_SECRET: &str = "test-access-secret-key-min-32-characters!";
    const REFRESH_SECRET: &str = "test-refresh-secret-key-min-32-characters";

    fn test_security_config() -> SecurityConfig {
        SecurityConfig {
            access_token_secret: Secret::new(ACCESS_SECRET.to_string()),
            refresh_token_secret: Secret::new(REFRESH_SECRET.to_string()),
            access_token_exp_secs: 300,
            refresh_token_exp_secs: 3600,
            password_min_length: 8,
            password_require_uppercase: true,
            password_require_lowercase: true,
            password_require_digit: true,
            password_require_special: true,
        }
    }

    fn test_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "testuser".to_string(),
            email: "a@b.com".to_string(),
            password_hash: "$argon2id$irrelevant".to_string(),
            role: "admin".to_string(),
            is_activated: true,
            activation_token_hash: None,
            activation_token_created_at: None,
            reset_token_hash: None,
            reset_token_created_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn expired_claims(user: &User, token_type: &str) -> Claims {
        let now = Utc::now();
        Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.clone(),
            is_activated: user.is_activated,
            token_type: token_type.to_string(),
            iat: (now - Duration::hours(2)).timestamp(),
            exp: (now - Duration::hours(1)).timestamp(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    #[test]
    fn test_access_token_round_trip() {
        let service = JwtService::from_config(&test_security_config()).unwrap();
        let user = test_user();

        let token = service.issue_access(&user).unwrap();
        let claims = service.verify_access(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.username, user.username);
        assert_eq!(claims.role, user.role);
        assert!(claims.is_activated);
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_refresh_token_round_trip() {
        let service = JwtService::from_config(&test_security_config()).unwrap();
        let user = test_user();

        let token = service.issue_refresh(&user).unwrap();
        let claims = service.verify_refresh(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), user.id);
        assert_eq!(claims.token_type, "refresh");
    }

    #[test]
    fn test_token_type_validation() {
        let service = JwtService::from_config(&test_security_config()).unwrap();
        let user = test_user();

        // An access token verified as refresh fails on the signature already:
        // the two secrets are independent.
        let access_token = service.issue_access(&user).unwrap();
        assert_eq!(
            service.verify_refresh(&access_token).unwrap_err(),
            TokenError::InvalidSignature
        );

        let refresh_token = service.issue_refresh(&user).unwrap();
        assert_eq!(
            service.verify_access(&refresh_token).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_token_type_claim_checked_under_same_secret() {
        // Same secret configured for both kinds: the token_type claim is the
        // remaining barrier between the two token populations.
        let mut config = test_security_config();
        config.refresh_token_secret = Secret::new(ACCESS_SECRET.to_string());
        let service = JwtService::from_config(&config).unwrap();
        let user = test_user();

        let access_token = service.issue_access(&user).unwrap();
        assert_eq!(
            service.verify_refresh(&access_token).unwrap_err(),
            TokenError::WrongTokenType
        );
    }

    #[test]
    fn test_expired_token_fails_as_expired() {
        let service = JwtService::from_config(&test_security_config()).unwrap();
        let user = test_user();

        let token = encode(
            &Header::default(),
            &expired_claims(&user, "access"),
            &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
        )
        .unwrap();

        // Expiry must be distinguishable from integrity failures
        assert_eq!(
            service.verify_access(&token).unwrap_err(),
            TokenError::Expired
        );
    }

    #[test]
    fn test_tampered_payload_fails_as_invalid_signature() {
        let service = JwtService::from_config(&test_security_config()).unwrap();
        let token = service.issue_access(&test_user()).unwrap();

        let mut parts: Vec<String> = token.split('.').map(|s| s.to_string()).collect();
        assert_eq!(parts.len(), 3);
        // flip one character of the payload
        let mut payload: Vec<u8> = parts[1].clone().into_bytes();
        payload[0] = if payload[0] == b'A' { b'B' } else { b'A' };
        parts[1] = String::from_utf8(payload).unwrap();
        let tampered = parts.join(".");

        assert_eq!(
            service.verify_access(&tampered).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_foreign_secret_fails_as_invalid_signature() {
        let service = JwtService::from_config(&test_security_config()).unwrap();
        let user = test_user();

        let foreign = encode(
            &Header::default(),
            &Claims {
                sub: user.id.to_string(),
                username: user.username.clone(),
                role: user.role.clone(),
                is_activated: true,
                token_type: "access".to_string(),
                iat: Utc::now().timestamp(),
                exp: (Utc::now() + Duration::hours(1)).timestamp(),
                jti: Uuid::new_v4().to_string(),
            },
            &EncodingKey::from_secret(b"some-other-secret-that-is-long-enough!!"),
        )
        .unwrap();

        assert_eq!(
            service.verify_access(&foreign).unwrap_err(),
            TokenError::InvalidSignature
        );
    }

    #[test]
    fn test_other_hmac_family_member_is_rejected() {
        let service = JwtService::from_config(&test_security_config()).unwrap();
        let user = test_user();

        let hs384 = encode(
            &Header::new(Algorithm::HS384),
            &expired_claims(&user, "access"),
            &EncodingKey::from_secret(ACCESS_SECRET.as_bytes()),
        )
        .unwrap();

        assert_eq!(
            service.verify_access(&hs384).unwrap_err(),
            TokenError::UnexpectedAlgorithm
        );
    }

    #[test]
    fn test_unsigned_token_is_rejected() {
        let service = JwtService::from_config(&test_security_config()).unwrap();
        let user = test_user();

        // hand-rolled alg=none token with an otherwise valid payload
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&Claims {
                sub: user.id.to_string(),
                username: user.username.clone(),
                role: user.role.clone(),
                is_activated: true,
                token_type: "access".to_string(),
                iat: Utc::now().timestamp(),
                exp: (Utc::now() + Duration::hours(1)).timestamp(),
                jti: Uuid::new_v4().to_string(),
            })
            .unwrap(),
        );
        let unsigned = format!("{}.{}.", header, payload);

        assert!(service.verify_access(&unsigned).is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let service = JwtService::from_config(&test_security_config()).unwrap();
        assert_eq!(
            service.verify_access("not-a-token").unwrap_err(),
            TokenError::Malformed
        );
    }

    #[test]
    fn test_short_secret_is_a_config_error() {
        let mut config = test_security_config();
        config.access_token_secret = Secret::new("short".to_string());
        assert!(JwtService::from_config(&config).is_err());
    }
}
