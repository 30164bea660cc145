use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    api_observability::{ApiConfig, ObservabilityConfig},
    database::DatabaseConfig,
    delivery::{MailConfig, RendererConfig},
    sweeper_jobs::{JobsConfig, SweeperConfig},
};
use crate::validation::ConfigValidator;
use crate::{ConfigError, ConfigResult};

pub const ENV_PREFIX: &str = "LESSON_SCHEDULER";

const DEFAULT_PATHS: [&str; 2] = ["config/lesson-scheduler.toml", "lesson-scheduler.toml"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sweeper: SweeperConfig,
    pub jobs: JobsConfig,
    pub mail: MailConfig,
    pub renderer: RendererConfig,
    pub api: ApiConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 按 默认值 -> TOML文件 -> 环境变量 的顺序合并配置
    pub fn load(config_path: Option<&str>) -> ConfigResult<Self> {
        let mut builder =
            ConfigBuilder::builder().add_source(ConfigBuilder::try_from(&AppConfig::default())?);

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(ConfigError::File(format!("配置文件不存在: {path}")));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_PATHS.iter().find(|p| Path::new(p).exists()) {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> ConfigResult<Self> {
        let config: AppConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.database.validate()?;
        self.sweeper.validate()?;
        self.jobs.validate()?;
        self.mail.validate()?;
        self.renderer.validate()?;
        self.api.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
