use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("计划任务未找到或无法取消: {id}")]
    TaskNotFound { id: i64 },
    #[error("数据验证失败: {0}")]
    ValidationError(String),
    #[error("投递所需数据缺失: {0}")]
    MissingData(String),
    #[error("文档渲染失败: {0}")]
    DocumentRender(String),
    #[error("邮件发送失败: {0}")]
    MailDispatch(String),
    #[error("操作超时: {0}")]
    Timeout(String),
    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

impl SchedulerError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn task_not_found(id: i64) -> Self {
        Self::TaskNotFound { id }
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
    pub fn missing_data<S: Into<String>>(msg: S) -> Self {
        Self::MissingData(msg.into())
    }
    pub fn render_error<S: Into<String>>(msg: S) -> Self {
        Self::DocumentRender(msg.into())
    }
    pub fn mail_error<S: Into<String>>(msg: S) -> Self {
        Self::MailDispatch(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 稳定的错误类别名，用于日志字段和指标标签
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerError::Database(_) | SchedulerError::DatabaseOperation(_) => "database",
            SchedulerError::TaskNotFound { .. } => "not_found",
            SchedulerError::ValidationError(_) => "validation",
            SchedulerError::MissingData(_) => "missing_data",
            SchedulerError::DocumentRender(_) => "document_render",
            SchedulerError::MailDispatch(_) => "mail_dispatch",
            SchedulerError::Timeout(_) => "timeout",
            SchedulerError::InvalidCron { .. } => "invalid_cron",
            SchedulerError::Serialization(_) => "serialization",
            SchedulerError::Configuration(_) => "configuration",
            SchedulerError::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests;
