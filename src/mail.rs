//! 邮件发送接口
//! 投递失败以独立的错误种类上报，调用方必须能区分
//! “用户已创建但邮件未送达”与其他失败

use crate::error::AppError;
use async_trait::async_trait;

/// Outbound mail capability
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError>;
}

/// Mail sender that writes to the log instead of the network
///
/// Stands in for a real delivery backend in development and tests.
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), AppError> {
        tracing::info!(to = %to, subject = %subject, body_len = body.len(), "Outbound mail");
        Ok(())
    }
}
