//! 仓储操作的错误上下文
//!
//! 数据库错误在转换为 `SchedulerError` 前附带操作类型和实体信息并记录日志。

use chrono::{DateTime, Utc};
use lesson_errors::SchedulerError;
use sqlx::Error as SqlxError;
use std::fmt;
use tracing::{error, instrument};

/// Operation context for repository operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOperation {
    Create,
    Read,
    Query,
    Transition,
    Claim,
    Delete,
    Update,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "查询"),
            RepositoryOperation::Query => write!(f, "检索"),
            RepositoryOperation::Transition => write!(f, "状态迁移"),
            RepositoryOperation::Claim => write!(f, "占用"),
            RepositoryOperation::Delete => write!(f, "删除"),
            RepositoryOperation::Update => write!(f, "更新"),
        }
    }
}

/// 被操作实体的描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryEntity {
    ScheduledTask,
    Student,
    Test,
}

impl fmt::Display for RepositoryEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryEntity::ScheduledTask => write!(f, "计划任务"),
            RepositoryEntity::Student => write!(f, "学生"),
            RepositoryEntity::Test => write!(f, "测试"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: RepositoryOperation,
    pub entity: RepositoryEntity,
    pub entity_id: Option<String>,
    pub owner_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub additional_info: Option<String>,
}

impl OperationContext {
    pub fn new(operation: RepositoryOperation, entity: RepositoryEntity) -> Self {
        Self {
            operation,
            entity,
            entity_id: None,
            owner_id: None,
            timestamp: Utc::now(),
            additional_info: None,
        }
    }

    pub fn with_entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn with_owner_id(mut self, owner_id: &str) -> Self {
        self.owner_id = Some(owner_id.to_string());
        self
    }

    pub fn with_additional_info(mut self, info: String) -> Self {
        self.additional_info = Some(info);
        self
    }

    pub fn entity_description(&self) -> String {
        match (&self.entity_id, &self.owner_id) {
            (Some(id), Some(owner)) => format!("{} (ID: {id}, 所有者: {owner})", self.entity),
            (Some(id), None) => format!("{} (ID: {id})", self.entity),
            (None, Some(owner)) => format!("{} (所有者: {owner})", self.entity),
            (None, None) => self.entity.to_string(),
        }
    }
}

pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    #[instrument(skip_all, fields(
        operation = %context.operation,
        entity = %context.entity,
        entity_id = ?context.entity_id,
        owner_id = ?context.owner_id,
    ))]
    pub fn database_error(context: OperationContext, error: SqlxError) -> SchedulerError {
        let entity_desc = context.entity_description();
        let operation_desc = context.operation.to_string();

        let mut error_msg = match &error {
            SqlxError::Database(db_error) => match db_error.constraint() {
                Some(constraint) => {
                    format!("{operation_desc}{entity_desc}时发生数据库约束冲突: {constraint}")
                }
                None => format!("{operation_desc}{entity_desc}时发生数据库错误: {db_error}"),
            },
            SqlxError::PoolClosed => format!("{operation_desc}{entity_desc}时数据库连接池已关闭"),
            SqlxError::PoolTimedOut => format!("{operation_desc}{entity_desc}时数据库连接池超时"),
            SqlxError::ColumnDecode { index, source } => {
                format!("{operation_desc}{entity_desc}时字段 {index} 解码失败: {source}")
            }
            other => format!("{operation_desc}{entity_desc}时发生数据库错误: {other}"),
        };
        if let Some(info) = &context.additional_info {
            error_msg.push_str(&format!(" ({info})"));
        }

        error!(error = %error, "{}", error_msg);
        SchedulerError::database_error(error_msg)
    }

    #[instrument(skip_all, fields(
        operation = %context.operation,
        entity = %context.entity,
        entity_id = ?context.entity_id,
    ))]
    pub fn serialization_error(
        context: OperationContext,
        error: serde_json::Error,
    ) -> SchedulerError {
        let error_msg = format!(
            "{}{}时序列化失败: {error}",
            context.operation,
            context.entity_description()
        );
        error!(error = %error, "{}", error_msg);
        SchedulerError::Serialization(error_msg)
    }
}

/// Macro for creating repository operation context easily
#[macro_export]
macro_rules! repo_context {
    ($operation:expr, $entity:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity)
    };
    ($operation:expr, $entity:expr, id = $id:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity).with_entity_id($id)
    };
    ($operation:expr, $entity:expr, owner = $owner:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity).with_owner_id($owner)
    };
    ($operation:expr, $entity:expr, id = $id:expr, owner = $owner:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity)
            .with_entity_id($id)
            .with_owner_id($owner)
    };
}
