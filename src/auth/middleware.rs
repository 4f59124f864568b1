//! JWT 认证中间件

use crate::{auth::jwt::JwtService, error::AppError, models::user::UserRole};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub username: String,
    pub role: String,
    pub is_activated: bool,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        UserRole::from(self.role.clone()) == UserRole::Admin
    }

    /// 管理员权限检查；未解析出身份或非管理员都视为 Forbidden
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// 凭证提取失败的内部原因（仅用于日志，不对外区分）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerError {
    MissingHeader,
    MalformedHeader,
}

/// 从 Authorization 头提取 Bearer 令牌
///
/// 头必须是 `Bearer <token>` 的精确形状；scheme 不区分大小写
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, BearerError> {
    let value = headers
        .get("authorization")
        .ok_or(BearerError::MissingHeader)?;

    let value = value.to_str().map_err(|_| BearerError::MalformedHeader)?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(BearerError::MalformedHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() || token.contains(' ') {
        return Err(BearerError::MalformedHeader);
    }

    Ok(token)
}

/// JWT 认证中间件 - 必须认证
///
/// 所有验证失败（缺头、格式、签名、过期）统一以同一个 401 响应，
/// 内部原因只进 debug 日志，避免对令牌有效性形成探测口
pub async fn jwt_auth_middleware(
    State(jwt_service): State<Arc<JwtService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 从 Authorization 头提取令牌
    let token = match extract_bearer(req.headers()) {
        Ok(token) => token,
        Err(reason) => {
            tracing::debug!(?reason, "Rejected bearer credential");
            return Err(AppError::Unauthorized);
        }
    };

    // 验证令牌（内部错误种类由 From<TokenError> 记录）
    let claims = jwt_service.verify_access(token)?;

    // 创建认证上下文
    let user_id = claims.user_id()?;
    let auth_context = AuthContext {
        user_id,
        username: claims.username,
        role: claims.role,
        is_activated: claims.is_activated,
    };

    // 附加到请求扩展
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// 管理员检查中间件（必须在 jwt_auth_middleware 之后）
pub async fn require_admin_middleware(req: Request, next: Next) -> Result<Response, AppError> {
    let auth_context = req
        .extensions()
        .get::<AuthContext>()
        .ok_or(AppError::Forbidden)?;

    auth_context.require_admin()?;

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", value.parse().unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer_valid() {
        let headers = headers_with_auth("Bearer test_token_123");
        assert_eq!(extract_bearer(&headers).unwrap(), "test_token_123");
    }

    #[test]
    fn test_extract_bearer_scheme_is_case_insensitive() {
        let headers = headers_with_auth("bearer test_token_123");
        assert_eq!(extract_bearer(&headers).unwrap(), "test_token_123");

        let headers = headers_with_auth("BEARER test_token_123");
        assert_eq!(extract_bearer(&headers).unwrap(), "test_token_123");
    }

    #[test]
    fn test_extract_bearer_missing_header() {
        let headers = HeaderMap::new();
        assert_eq!(
            extract_bearer(&headers).unwrap_err(),
            BearerError::MissingHeader
        );
    }

    #[test]
    fn test_extract_bearer_malformed() {
        for value in [
            "InvalidFormat",
            "Basic dXNlcjpwYXNz",
            "Bearer",
            "Bearer ",
            "Bearer a b",
        ] {
            let headers = headers_with_auth(value);
            assert_eq!(
                extract_bearer(&headers).unwrap_err(),
                BearerError::MalformedHeader,
                "value: {value:?}"
            );
        }
    }

    #[test]
    fn test_require_admin() {
        let admin = AuthContext {
            user_id: Uuid::new_v4(),
            username: "root".to_string(),
            role: "admin".to_string(),
            is_activated: true,
        };
        assert!(admin.require_admin().is_ok());

        let user = AuthContext {
            user_id: Uuid::new_v4(),
            username: "alice".to_string(),
            role: "user".to_string(),
            is_activated: true,
        };
        assert!(matches!(user.require_admin(), Err(AppError::Forbidden)));
    }
}
