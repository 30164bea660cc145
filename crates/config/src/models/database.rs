use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:lesson-scheduler.db".to_string(),
            max_connections: 5,
            min_connections: 1,
            connection_timeout_seconds: 30,
            idle_timeout_seconds: 600,
        }
    }
}

impl DatabaseConfig {
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

impl ConfigValidator for DatabaseConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.url, "database.url")?;

        if !self.url.starts_with("sqlite:") {
            return Err(crate::ConfigError::Validation(
                "database.url must start with sqlite:".to_string(),
            ));
        }

        ValidationUtils::validate_count(self.max_connections as usize, "database.max_connections")?;
        ValidationUtils::validate_count(self.min_connections as usize, "database.min_connections")?;

        if self.min_connections > self.max_connections {
            return Err(crate::ConfigError::Validation(
                "database.min_connections must be less than or equal to max_connections"
                    .to_string(),
            ));
        }

        ValidationUtils::validate_timeout_seconds(
            self.connection_timeout_seconds,
            "database.connection_timeout_seconds",
        )?;
        ValidationUtils::validate_timeout_seconds(
            self.idle_timeout_seconds,
            "database.idle_timeout_seconds",
        )?;

        Ok(())
    }
}
