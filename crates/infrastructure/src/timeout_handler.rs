//! Timeout handling for outbound delivery calls
//!
//! Document rendering and mail dispatch are both bounded so that a hung
//! external service cannot stall a sweep batch.

use std::future::Future;
use std::time::Duration;

use lesson_config::{MailConfig, RendererConfig};
use lesson_errors::{SchedulerError, SchedulerResult};
use tokio::time::timeout;
use tracing::{error, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub render_timeout: Duration,
    pub mail_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            render_timeout: Duration::from_secs(20),
            mail_timeout: Duration::from_secs(30),
        }
    }
}

impl TimeoutConfig {
    pub fn from_configs(renderer: &RendererConfig, mail: &MailConfig) -> Self {
        Self {
            render_timeout: Duration::from_secs(renderer.timeout_seconds),
            mail_timeout: Duration::from_secs(mail.timeout_seconds),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimeoutHandler {
    config: TimeoutConfig,
}

impl TimeoutHandler {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TimeoutConfig {
        &self.config
    }

    #[instrument(skip(self, operation))]
    pub async fn render_operation<F, T>(&self, operation: F, operation_name: &str) -> SchedulerResult<T>
    where
        F: Future<Output = SchedulerResult<T>>,
    {
        self.execute_with_timeout(operation, self.config.render_timeout, "文档渲染", operation_name)
            .await
    }

    #[instrument(skip(self, operation))]
    pub async fn mail_operation<F, T>(&self, operation: F, operation_name: &str) -> SchedulerResult<T>
    where
        F: Future<Output = SchedulerResult<T>>,
    {
        self.execute_with_timeout(operation, self.config.mail_timeout, "邮件发送", operation_name)
            .await
    }

    async fn execute_with_timeout<F, T>(
        &self,
        operation: F,
        timeout_duration: Duration,
        operation_type: &str,
        operation_name: &str,
    ) -> SchedulerResult<T>
    where
        F: Future<Output = SchedulerResult<T>>,
    {
        match timeout(timeout_duration, operation).await {
            Ok(result) => result,
            Err(_) => {
                let error_msg = format!(
                    "{operation_type}操作 '{operation_name}' 超时 (超时时间: {timeout_duration:?})"
                );
                error!("{}", error_msg);
                Err(SchedulerError::Timeout(error_msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> TimeoutHandler {
        TimeoutHandler::new(TimeoutConfig {
            render_timeout: Duration::from_millis(50),
            mail_timeout: Duration::from_millis(50),
        })
    }

    #[tokio::test]
    async fn test_fast_operation_passes_through() {
        let result = handler()
            .mail_operation(async { Ok::<_, SchedulerError>(7) }, "fast")
            .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_inner_error_is_preserved() {
        let result: SchedulerResult<()> = handler()
            .render_operation(async { Err(SchedulerError::render_error("bad")) }, "render")
            .await;
        assert!(matches!(result, Err(SchedulerError::DocumentRender(_))));
    }

    #[tokio::test]
    async fn test_slow_operation_times_out() {
        let result: SchedulerResult<()> = handler()
            .mail_operation(
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                },
                "slow",
            )
            .await;
        match result {
            Err(SchedulerError::Timeout(msg)) => assert!(msg.contains("slow")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_from_configs() {
        let renderer = RendererConfig {
            timeout_seconds: 12,
            ..RendererConfig::default()
        };
        let mail = MailConfig {
            timeout_seconds: 8,
            ..MailConfig::default()
        };
        let config = TimeoutConfig::from_configs(&renderer, &mail);
        assert_eq!(config.render_timeout, Duration::from_secs(12));
        assert_eq!(config.mail_timeout, Duration::from_secs(8));
    }
}
