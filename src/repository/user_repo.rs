//! User store (用户数据访问层)

use crate::{error::AppError, models::user::User};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Mutation applied by a successful single-use token consumption
#[derive(Debug, Clone)]
pub enum TokenMutation {
    /// Mark the account activated and clear the activation token
    Activate,
    /// Overwrite the password hash and clear the reset token
    SetPassword { password_hash: String },
}

/// Persistence capability set the auth core depends on
///
/// The conditional consumption contract: exactly one conditional write per
/// consumption attempt, keyed on the stored token digest; zero rows affected
/// means the token no longer matches (already consumed, or never issued) and
/// is reported as `false`, never as success.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Persist a new user; a duplicate email is `UserAlreadyExists`
    async fn insert(&self, user: &User) -> Result<(), AppError>;

    /// Persist updated fields of an existing user
    async fn save(&self, user: &User) -> Result<(), AppError>;

    /// Atomic conditional consumption of a single-use token
    async fn conditional_consume_token(
        &self,
        user_id: Uuid,
        presented_digest: &str,
        mutation: TokenMutation,
    ) -> Result<bool, AppError>;

    async fn update_role(&self, user_id: Uuid, role: &str) -> Result<bool, AppError>;

    async fn delete(&self, user_id: Uuid) -> Result<bool, AppError>;
}

/// PostgreSQL-backed user store
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    /// 根据邮箱查找用户
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// 根据 ID 查找用户
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// 创建用户
    async fn insert(&self, user: &User) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, password_hash, role, is_activated,
                activation_token_hash, activation_token_created_at,
                reset_token_hash, reset_token_created_at,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.is_activated)
        .bind(&user.activation_token_hash)
        .bind(user.activation_token_created_at)
        .bind(&user.reset_token_hash)
        .bind(user.reset_token_created_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.db)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AppError::UserAlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 更新用户
    async fn save(&self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET
                username = $2,
                email = $3,
                password_hash = $4,
                role = $5,
                is_activated = $6,
                activation_token_hash = $7,
                activation_token_created_at = $8,
                reset_token_hash = $9,
                reset_token_created_at = $10,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(user.is_activated)
        .bind(&user.activation_token_hash)
        .bind(user.activation_token_created_at)
        .bind(&user.reset_token_hash)
        .bind(user.reset_token_created_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 条件消费单次令牌
    ///
    /// 只有当存储的摘要仍等于呈现值时更新才生效；两个并发消费由数据库的
    /// 行级原子更新序列化，失败方观察到 rows_affected == 0
    async fn conditional_consume_token(
        &self,
        user_id: Uuid,
        presented_digest: &str,
        mutation: TokenMutation,
    ) -> Result<bool, AppError> {
        let result = match mutation {
            TokenMutation::Activate => {
                sqlx::query(
                    r#"
                    UPDATE users
                    SET
                        is_activated = TRUE,
                        activation_token_hash = NULL,
                        activation_token_created_at = NULL,
                        updated_at = NOW()
                    WHERE id = $1 AND activation_token_hash = $2
                    "#,
                )
                .bind(user_id)
                .bind(presented_digest)
                .execute(&self.db)
                .await?
            }
            TokenMutation::SetPassword { password_hash } => {
                // 清除令牌与写入新口令在同一条原子语句中完成
                sqlx::query(
                    r#"
                    UPDATE users
                    SET
                        password_hash = $3,
                        reset_token_hash = NULL,
                        reset_token_created_at = NULL,
                        updated_at = NOW()
                    WHERE id = $1 AND reset_token_hash = $2
                    "#,
                )
                .bind(user_id)
                .bind(presented_digest)
                .bind(password_hash)
                .execute(&self.db)
                .await?
            }
        };

        Ok(result.rows_affected() > 0)
    }

    /// 更新角色
    async fn update_role(&self, user_id: Uuid, role: &str) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(role)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 删除用户
    async fn delete(&self, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
