use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SweeperConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// 1 表示逐个顺序投递
    pub max_concurrent_deliveries: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 60,
            max_concurrent_deliveries: 1,
        }
    }
}

impl ConfigValidator for SweeperConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_timeout_seconds(self.interval_seconds, "sweeper.interval_seconds")?;
        if self.max_concurrent_deliveries > 64 {
            return Err(crate::ConfigError::Validation(
                "sweeper.max_concurrent_deliveries must be less than or equal to 64".to_string(),
            ));
        }
        ValidationUtils::validate_count(
            self.max_concurrent_deliveries,
            "sweeper.max_concurrent_deliveries",
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobScheduleConfig {
    pub enabled: bool,
    pub schedule: String,
}

impl JobScheduleConfig {
    fn validate_named(&self, name: &str) -> crate::ConfigResult<()> {
        if self.enabled {
            let field = format!("jobs.{name}.schedule");
            ValidationUtils::validate_not_empty(&self.schedule, &field)?;
            ValidationUtils::validate_cron_expression(&self.schedule, &field)?;
        }
        Ok(())
    }
}

/// 每周课程主题任务
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobsConfig {
    pub lesson_topic_broadcast: JobScheduleConfig,
    pub lesson_topic_clearing: JobScheduleConfig,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            // 周一 08:00 发送本周主题
            lesson_topic_broadcast: JobScheduleConfig {
                enabled: true,
                schedule: "0 0 8 * * Mon".to_string(),
            },
            // 周日 23:00 清空
            lesson_topic_clearing: JobScheduleConfig {
                enabled: true,
                schedule: "0 0 23 * * Sun".to_string(),
            },
        }
    }
}

impl ConfigValidator for JobsConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.lesson_topic_broadcast
            .validate_named("lesson_topic_broadcast")?;
        self.lesson_topic_clearing
            .validate_named("lesson_topic_clearing")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweeper_config_validation() {
        let config = SweeperConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent_deliveries, 1);

        let mut invalid = config.clone();
        invalid.interval_seconds = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.max_concurrent_deliveries = 0;
        assert!(invalid.validate().is_err());

        let mut invalid = config;
        invalid.max_concurrent_deliveries = 65;
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_jobs_config_validation() {
        let config = JobsConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid = config.clone();
        invalid.lesson_topic_broadcast.schedule = "0 8 * * 1".to_string();
        assert!(invalid.validate().is_err());

        let mut invalid = config.clone();
        invalid.lesson_topic_clearing.schedule = "0 0 23 * * Funday".to_string();
        assert!(invalid.validate().is_err());

        // disabled jobs are not checked
        let mut disabled = config;
        disabled.lesson_topic_clearing.enabled = false;
        disabled.lesson_topic_clearing.schedule = String::new();
        assert!(disabled.validate().is_ok());
    }
}
