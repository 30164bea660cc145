use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// SMTP 邮件发送配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// false 时使用未加密连接，仅用于本地开发的邮件捕获服务
    pub starttls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub timeout_seconds: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 1025,
            starttls: false,
            username: None,
            password: None,
            from_address: "no-reply@lessons.local".to_string(),
            from_name: "Lesson Scheduler".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl ConfigValidator for MailConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.smtp_host, "mail.smtp_host")?;
        ValidationUtils::validate_port(self.smtp_port, "mail.smtp_port")?;
        ValidationUtils::validate_not_empty(&self.from_address, "mail.from_address")?;
        if !self.from_address.contains('@') {
            return Err(crate::ConfigError::Validation(
                "mail.from_address must be an email address".to_string(),
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(crate::ConfigError::Validation(
                "mail.username and mail.password must be set together".to_string(),
            ));
        }
        ValidationUtils::validate_timeout_seconds(self.timeout_seconds, "mail.timeout_seconds")?;
        Ok(())
    }
}

/// 文档渲染服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RendererConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:3001/render".to_string(),
            api_key: None,
            timeout_seconds: 20,
        }
    }
}

impl ConfigValidator for RendererConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.enabled {
            ValidationUtils::validate_url(&self.endpoint, "renderer.endpoint")?;
        }
        ValidationUtils::validate_timeout_seconds(
            self.timeout_seconds,
            "renderer.timeout_seconds",
        )?;
        Ok(())
    }
}
