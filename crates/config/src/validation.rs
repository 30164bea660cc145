use std::str::FromStr;

use crate::{ConfigError, ConfigResult};

/// Trait for configuration validation
pub trait ConfigValidator {
    fn validate(&self) -> ConfigResult<()>;
}

/// General validation utilities
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate that a string is not empty
    pub fn validate_not_empty(value: &str, field_name: &str) -> ConfigResult<()> {
        if value.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{field_name} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Validate that a port number is valid
    pub fn validate_port(port: u16, field_name: &str) -> ConfigResult<()> {
        if port == 0 {
            return Err(ConfigError::Validation(format!("{field_name} cannot be 0")));
        }
        Ok(())
    }

    /// Validate that a timeout is reasonable
    pub fn validate_timeout_seconds(timeout_seconds: u64, field_name: &str) -> ConfigResult<()> {
        if timeout_seconds == 0 {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if timeout_seconds > 3600 {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be less than or equal to 3600"
            )));
        }
        Ok(())
    }

    /// Validate that a count is reasonable
    pub fn validate_count(count: usize, field_name: &str) -> ConfigResult<()> {
        if count == 0 {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be greater than 0"
            )));
        }
        if count > 10000 {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be less than or equal to 10000"
            )));
        }
        Ok(())
    }

    /// Validate that a URL has a protocol prefix
    pub fn validate_url(url: &str, field_name: &str) -> ConfigResult<()> {
        Self::validate_not_empty(url, field_name)?;
        if !url.contains("://") {
            return Err(ConfigError::Validation(format!(
                "{field_name} must be a valid URL with protocol"
            )));
        }
        Ok(())
    }

    /// Cron expressions here always carry a seconds field (6 or 7 fields)
    pub fn validate_cron_expression(expr: &str, field_name: &str) -> ConfigResult<()> {
        let fields = expr.split_whitespace().count();
        if !(6..=7).contains(&fields) {
            return Err(ConfigError::Validation(format!(
                "{field_name} must have 6 or 7 fields (sec min hour day month weekday [year]), got {fields}"
            )));
        }
        cron::Schedule::from_str(expr).map_err(|e| {
            ConfigError::Validation(format!("{field_name} is not a valid cron expression: {e}"))
        })?;
        Ok(())
    }
}
