//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// 访问令牌密钥（使用 Secret 包装，防止日志泄露）
    pub access_token_secret: Secret<String>,
    /// 刷新令牌密钥（与访问令牌密钥相互独立）
    pub refresh_token_secret: Secret<String>,
    /// 访问令牌过期时间（秒）
    pub access_token_exp_secs: u64,
    /// 刷新令牌过期时间（秒）
    pub refresh_token_exp_secs: u64,
    /// 密码最小长度
    pub password_min_length: usize,
    /// 密码必须包含大写字母
    pub password_require_uppercase: bool,
    /// 密码必须包含小写字母
    pub password_require_lowercase: bool,
    /// 密码必须包含数字
    pub password_require_digit: bool,
    /// 密码必须包含特殊字符
    pub password_require_special: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
}

impl AppConfig {
    /// 从环境变量加载配置（前缀为 ACCOUNT_）
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default(
                "security.access_token_secret",
                "change-this-access-secret-in-production!",
            )?
            .set_default(
                "security.refresh_token_secret",
                "change-this-refresh-secret-in-production",
            )?
            .set_default("security.access_token_exp_secs", 7200)?
            .set_default("security.refresh_token_exp_secs", 604800)?
            .set_default("security.password_min_length", 8)?
            .set_default("security.password_require_uppercase", true)?
            .set_default("security.password_require_lowercase", true)?
            .set_default("security.password_require_digit", true)?
            .set_default("security.password_require_special", true)?;

        settings = settings.add_source(
            Environment::with_prefix("ACCOUNT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    fn validate(&self) -> Result<(), ConfigError> {
        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be json or pretty",
                    self.logging.format
                )))
            }
        }

        if self.security.access_token_exp_secs >= self.security.refresh_token_exp_secs {
            return Err(ConfigError::Message(
                "Access token TTL must be shorter than refresh token TTL".to_string(),
            ));
        }

        // 两把密钥必须相互独立，泄露一把不波及另一把
        if self.security.access_token_secret.expose_secret()
            == self.security.refresh_token_secret.expose_secret()
        {
            return Err(ConfigError::Message(
                "Access and refresh token secrets must be distinct".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn base_config() -> AppConfig {
        AppConfig {
            server: ServerConfig {
                addr: "127.0.0.1:3000".to_string(),
                graceful_shutdown_timeout_secs: 5,
            },
            database: DatabaseConfig {
                url: Secret::new("postgresql://localhost/test".to_string()),
                max_connections: 5,
                min_connections: 1,
                acquire_timeout_secs: 5,
                idle_timeout_secs: 300,
                max_lifetime_secs: 1800,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
            security: SecurityConfig {
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
            },
        }
    }

    #[test]
    fn test_validate_accepts_sane_config() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_log_level() {
        let mut config = base_config();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_ttls() {
        let mut config = base_config();
        config.security.access_token_exp_secs = 604800;
        config.security.refresh_token_exp_secs = 7200;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_shared_secret() {
        let mut config = base_config();
        config.security.refresh_token_secret =
            Secret::new("test-access-secret-key-min-32-characters!".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secrets_are_independent() {
        let config = base_config();
        assert_ne!(
            config.security.access_token_secret.expose_secret(),
            config.security.refresh_token_secret.expose_secret()
        );
    }
}
