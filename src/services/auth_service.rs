//! 认证服务：注册、激活、登录、令牌刷新、口令找回

use crate::{
    auth::jwt::JwtService,
    auth::password::PasswordHasher,
    auth::single_use::{self, TOKEN_TTL_HOURS},
    config::AppConfig,
    error::AppError,
    mail::MailSender,
    models::{auth::*, user::*},
    repository::{TokenMutation, UserStore},
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub struct AuthService {
    store: Arc<dyn UserStore>,
    mail: Arc<dyn MailSender>,
    jwt_service: Arc<JwtService>,
    config: Arc<AppConfig>,
    hasher: PasswordHasher,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn UserStore>,
        mail: Arc<dyn MailSender>,
        jwt_service: Arc<JwtService>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            mail,
            jwt_service,
            config,
            hasher: PasswordHasher::new(),
        }
    }

    /// 用户注册
    ///
    /// 用户记录先落库、激活邮件后发送；邮件失败以独立错误上报，
    /// 因为此时用户已经存在
    pub async fn register(&self, req: RegisterRequest) -> Result<UserResponse, AppError> {
        req.validate()
            .map_err(|e| AppError::PolicyViolation(e.to_string()))?;

        PasswordHasher::validate_policy(&req.password, &self.config.security)?;

        if self.store.find_by_email(&req.email).await?.is_some() {
            return Err(AppError::UserAlreadyExists);
        }

        let password_hash = self.hasher.hash(&req.password)?;

        // 生成激活令牌；只持久化摘要
        let issued = single_use::generate();
        let now = Utc::now();

        let user = User {
            id: Uuid::new_v4(),
            username: req.username,
            email: req.email,
            password_hash,
            role: String::from(UserRole::User),
            is_activated: false,
            activation_token_hash: Some(issued.digest),
            activation_token_created_at: Some(now),
            reset_token_hash: None,
            reset_token_created_at: None,
            created_at: now,
            updated_at: now,
        };

        self.store.insert(&user).await?;

        tracing::info!(user_id = %user.id, "User registered");

        let body = format!(
            "Welcome {}!\n\nActivate your account within {} hours using this token: {}",
            user.username, TOKEN_TTL_HOURS, issued.token
        );
        self.mail
            .send(&user.email, "Activate your account", &body)
            .await?;

        Ok(user.into())
    }

    /// 账户激活
    ///
    /// 按用户查找后在该用户的存储令牌上校验；消费通过一次条件更新完成，
    /// 零行生效视为令牌不再匹配
    pub async fn activate(&self, req: ActivateRequest) -> Result<UserResponse, AppError> {
        req.validate()
            .map_err(|e| AppError::PolicyViolation(e.to_string()))?;

        let user = self
            .store
            .find_by_email(&req.email)
            .await?
            .ok_or(AppError::UserNotFound)?;

        single_use::check(
            &req.token,
            user.activation_token_hash.as_deref(),
            user.activation_token_created_at,
            Utc::now(),
        )?;

        let consumed = self
            .store
            .conditional_consume_token(
                user.id,
                &single_use::digest(&req.token),
                TokenMutation::Activate,
            )
            .await?;

        if !consumed {
            // 并发的另一次消费先行生效
            return Err(AppError::TokenMismatch);
        }

        tracing::info!(user_id = %user.id, "Account activated");

        let user = self
            .store
            .find_by_id(user.id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        Ok(user.into())
    }

    /// 用户登录
    ///
    /// 未知邮箱与错误口令呈现同一失败
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let user = self
            .store
            .find_by_email(&req.email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !self.hasher.verify(&req.password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "Password verification failed");
            return Err(AppError::InvalidCredentials);
        }

        let access_token = self.jwt_service.issue_access(&user)?;
        let refresh_token = self.jwt_service.issue_refresh(&user)?;

        tracing::info!(user_id = %user.id, "User logged in");

        Ok(LoginResponse {
            access_token,
            refresh_token,
            expires_in: self.jwt_service.access_token_exp_secs(),
            user: user.into(),
        })
    }

    /// 刷新访问令牌
    ///
    /// 身份从权威存储的当前记录重建，而不是刷新令牌中的声明快照，
    /// 角色变更或注销立即生效
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshTokenResponse, AppError> {
        let claims = self.jwt_service.verify_refresh(refresh_token)?;
        let user_id = claims.user_id()?;

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let access_token = self.jwt_service.issue_access(&user)?;

        tracing::debug!(user_id = %user.id, "Access token refreshed");

        Ok(RefreshTokenResponse {
            access_token,
            expires_in: self.jwt_service.access_token_exp_secs(),
        })
    }

    /// 发送口令重置令牌
    pub async fn forgot_password(&self, req: ForgotPasswordRequest) -> Result<(), AppError> {
        req.validate()
            .map_err(|e| AppError::PolicyViolation(e.to_string()))?;

        let mut user = self
            .store
            .find_by_email(&req.email)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let issued = single_use::generate();
        user.reset_token_hash = Some(issued.digest);
        user.reset_token_created_at = Some(Utc::now());

        self.store.save(&user).await?;

        tracing::info!(user_id = %user.id, "Password reset token issued");

        let body = format!(
            "A password reset was requested for your account.\n\nReset your password within {} hours using this token: {}",
            TOKEN_TTL_HOURS, issued.token
        );
        self.mail
            .send(&user.email, "Reset your password", &body)
            .await?;

        Ok(())
    }

    /// 用重置令牌改写口令
    ///
    /// 令牌清除与口令写入在同一条条件更新中完成，并发的第二次消费
    /// 只会观察到已清除的令牌
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<(), AppError> {
        req.validate()
            .map_err(|e| AppError::PolicyViolation(e.to_string()))?;

        PasswordHasher::validate_policy(&req.new_password, &self.config.security)?;

        let user = self
            .store
            .find_by_email(&req.email)
            .await?
            .ok_or(AppError::UserNotFound)?;

        single_use::check(
            &req.token,
            user.reset_token_hash.as_deref(),
            user.reset_token_created_at,
            Utc::now(),
        )?;

        let password_hash = self.hasher.hash(&req.new_password)?;

        let consumed = self
            .store
            .conditional_consume_token(
                user.id,
                &single_use::digest(&req.token),
                TokenMutation::SetPassword { password_hash },
            )
            .await?;

        if !consumed {
            return Err(AppError::TokenMismatch);
        }

        tracing::info!(user_id = %user.id, "Password reset");

        Ok(())
    }

    /// 获取用户（管理端）
    pub async fn get_user(&self, user_id: Uuid) -> Result<UserResponse, AppError> {
        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        Ok(user.into())
    }

    /// 更新用户角色（管理端）
    pub async fn update_role(&self, user_id: Uuid, role: &str) -> Result<(), AppError> {
        let role = match role.to_lowercase().as_str() {
            "user" => UserRole::User,
            "admin" => UserRole::Admin,
            other => {
                return Err(AppError::PolicyViolation(format!(
                    "Unknown role: {}",
                    other
                )))
            }
        };

        let updated = self
            .store
            .update_role(user_id, &String::from(role))
            .await?;

        if !updated {
            return Err(AppError::UserNotFound);
        }

        tracing::info!(user_id = %user_id, "User role updated");

        Ok(())
    }

    /// 删除用户（管理端）
    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), AppError> {
        let deleted = self.store.delete(user_id).await?;

        if !deleted {
            return Err(AppError::UserNotFound);
        }

        tracing::info!(user_id = %user_id, "User deleted");

        Ok(())
    }
}
