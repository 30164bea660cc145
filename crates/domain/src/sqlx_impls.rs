//! # SQLx 数据库类型转换实现
//!
//! 领域枚举以大写字符串形式存入 SQLite

use crate::entities::{ScheduledTaskStatus, TaskType};

impl sqlx::Type<sqlx::Sqlite> for ScheduledTaskStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ScheduledTaskStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match s {
            "PENDING" => Ok(ScheduledTaskStatus::Pending),
            "COMPLETED" => Ok(ScheduledTaskStatus::Completed),
            "FAILED" => Ok(ScheduledTaskStatus::Failed),
            _ => Err(format!("Invalid scheduled task status: {s}").into()),
        }
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ScheduledTaskStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

impl sqlx::Type<sqlx::Sqlite> for TaskType {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for TaskType {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        TaskType::parse(s).ok_or_else(|| format!("Invalid task type: {s}").into())
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for TaskType {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}
