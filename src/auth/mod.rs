//! Authentication and authorization module

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod single_use;

pub use jwt::{Claims, JwtService, TokenError};
pub use middleware::{
    extract_bearer, jwt_auth_middleware, require_admin_middleware, AuthContext,
};
pub use password::PasswordHasher;
pub use single_use::IssuedToken;
