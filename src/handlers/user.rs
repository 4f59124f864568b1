//! 用户管理的 HTTP 处理器（管理员专用，经 require_admin_middleware 保护）

use crate::{
    auth::middleware::AuthContext, error::AppError, middleware::AppState, models::auth::*,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 获取用户详情
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let user = state.auth_service.get_user(id).await?;

    Ok(Json(json!({ "user": user })))
}

/// 更新用户角色
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.update_role(id, &req.role).await?;

    tracing::info!(
        actor = %auth_context.user_id,
        subject = %id,
        role = %req.role,
        "Role changed by administrator"
    );

    Ok(Json(json!({ "message": "Role updated" })))
}

/// 删除用户
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.delete_user(id).await?;

    tracing::info!(
        actor = %auth_context.user_id,
        subject = %id,
        "User deleted by administrator"
    );

    Ok(Json(json!({ "message": "User deleted" })))
}
