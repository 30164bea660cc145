use std::collections::HashMap;

use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

use super::logging::{LogLevel, OutputFormat};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub cors_enabled: bool,
    pub cors_origins: Vec<String>,
    pub request_timeout_seconds: u64,
    pub auth: AuthConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8080".to_string(),
            cors_enabled: true,
            cors_origins: vec!["*".to_string()],
            request_timeout_seconds: 30,
            auth: AuthConfig::default(),
        }
    }
}

impl ConfigValidator for ApiConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.bind_address, "api.bind_address")?;
        if !self.bind_address.contains(':') {
            return Err(crate::ConfigError::Validation(
                "api.bind_address must be in host:port form".to_string(),
            ));
        }
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "api.request_timeout_seconds",
        )?;
        self.auth.validate()?;
        Ok(())
    }
}

/// 请求方身份解析
///
/// 启用时通过 `X-API-Key` 映射到所有者；关闭时信任上游注入的 `X-Owner-Id`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub api_keys: HashMap<String, ApiKeyConfig>,
}

impl AuthConfig {
    /// 返回有效 API Key 对应的所有者ID
    pub fn owner_for_key(&self, key: &str) -> Option<&str> {
        self.api_keys
            .get(key)
            .filter(|k| k.is_active)
            .map(|k| k.owner_id.as_str())
    }
}

impl ConfigValidator for AuthConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.enabled {
            if self.api_keys.is_empty() {
                return Err(crate::ConfigError::Validation(
                    "api.auth.api_keys cannot be empty when auth is enabled".to_string(),
                ));
            }
            for (key, key_config) in &self.api_keys {
                ValidationUtils::validate_not_empty(key, "api.auth.api_keys key")?;
                key_config.validate()?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiKeyConfig {
    pub owner_id: String,
    pub name: String,
    pub is_active: bool,
}

impl ConfigValidator for ApiKeyConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.owner_id, "api.auth.api_keys.owner_id")?;
        ValidationUtils::validate_not_empty(&self.name, "api.auth.api_keys.name")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: LogLevel,
    pub log_format: OutputFormat,
    pub metrics_enabled: bool,
    pub metrics_endpoint: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_format: OutputFormat::Pretty,
            metrics_enabled: true,
            metrics_endpoint: "/metrics".to_string(),
        }
    }
}

impl ConfigValidator for ObservabilityConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        if self.metrics_enabled && !self.metrics_endpoint.starts_with('/') {
            return Err(crate::ConfigError::Validation(
                "observability.metrics_endpoint must start with /".to_string(),
            ));
        }
        Ok(())
    }
}
