//! User domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User account
///
/// The single-use activation and reset tokens are stored as SHA-256 digests;
/// the plaintext value leaves the process only inside the email.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,

    pub role: String, // user, admin

    // Account activation state
    pub is_activated: bool,
    pub activation_token_hash: Option<String>,
    pub activation_token_created_at: Option<DateTime<Utc>>,

    // Password recovery state
    pub reset_token_hash: Option<String>,
    pub reset_token_created_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> UserRole {
        UserRole::from(self.role.clone())
    }

    pub fn is_admin(&self) -> bool {
        self.role() == UserRole::Admin
    }
}

/// User role enumeration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}

impl From<String> for UserRole {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::User => "user".to_string(),
            UserRole::Admin => "admin".to_string(),
        }
    }
}

/// User response (without sensitive data)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_activated: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            is_activated: user.is_activated,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(UserRole::from("admin".to_string()), UserRole::Admin);
        assert_eq!(UserRole::from("Admin".to_string()), UserRole::Admin);
        assert_eq!(UserRole::from("user".to_string()), UserRole::User);
        // unknown roles never grant privilege
        assert_eq!(UserRole::from("superuser".to_string()), UserRole::User);
        assert_eq!(String::from(UserRole::Admin), "admin");
    }
}
