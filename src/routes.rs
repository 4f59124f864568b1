//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{
    auth::middleware::{jwt_auth_middleware, require_admin_middleware},
    handlers,
    middleware::AppState,
};

/// 请求体大小上限（字节）
const BODY_LIMIT_BYTES: usize = 64 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    let jwt_service = state.jwt_service.clone();

    // 公开路由：探针与认证入口
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/activate", post(handlers::auth::activate))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/refresh", post(handlers::auth::refresh_token))
        .route(
            "/api/v1/auth/forgot-password",
            post(handlers::auth::forgot_password),
        )
        .route(
            "/api/v1/auth/reset-password",
            post(handlers::auth::reset_password),
        );

    // 需要认证的路由
    let authenticated_routes = Router::new()
        .route("/api/v1/auth/me", get(handlers::auth::get_current_user))
        .layer(axum::middleware::from_fn_with_state(
            jwt_service.clone(),
            jwt_auth_middleware,
        ));

    // 管理员路由：先认证，再检查角色
    let admin_routes = Router::new()
        .route(
            "/api/v1/users/{id}",
            get(handlers::user::get_user).delete(handlers::user::delete_user),
        )
        .route("/api/v1/users/{id}/role", put(handlers::user::update_role))
        .layer(axum::middleware::from_fn(require_admin_middleware))
        .layer(axum::middleware::from_fn_with_state(
            jwt_service,
            jwt_auth_middleware,
        ));

    // 组合所有路由
    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .merge(admin_routes)
        .layer(axum::middleware::from_fn(
            crate::middleware::request_tracking_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
