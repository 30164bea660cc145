//! 领域仓储抽象
//!
//! 计划任务存储以及由CRUD子系统维护的学生/测试读模型

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{
    DueTask, LessonTopicRecipient, NewScheduledTask, ScheduledTask, ScheduledTaskStatus,
    ScheduledTaskView,
};
use crate::value_objects::TransitionOutcome;
use lesson_errors::SchedulerResult;

/// 计划任务存储
#[async_trait]
pub trait ScheduledTaskRepository: Send + Sync {
    /// 写入新任务，状态固定为 PENDING；缺少类型或计划时间时返回验证错误
    async fn insert(&self, task: &NewScheduledTask) -> SchedulerResult<ScheduledTask>;
    async fn find_by_id(&self, id: i64) -> SchedulerResult<Option<ScheduledTask>>;
    /// 按 scheduled_for 升序返回所有者的任务，附带学生/测试摘要
    async fn find_by_owner(&self, owner_id: &str) -> SchedulerResult<Vec<ScheduledTaskView>>;
    /// 所有 PENDING、未被占用且 scheduled_for <= now 的任务，一次查询解析出关联数据
    ///
    /// 单行数据损坏不影响其余行：该行以 `load_error` 返回。
    async fn find_due(&self, now: DateTime<Utc>) -> SchedulerResult<Vec<DueTask>>;
    /// 投递前占用任务，只有仍为 PENDING 且未被占用时返回 Applied
    ///
    /// 占用不会过期，同一任务至多投递一次。
    async fn claim(&self, id: i64, claimed_at: DateTime<Utc>) -> SchedulerResult<TransitionOutcome>;
    /// 原子地从 PENDING 迁移到终态；任务已不是 PENDING 时返回 Skipped
    async fn transition_status(
        &self,
        id: i64,
        new_status: ScheduledTaskStatus,
    ) -> SchedulerResult<TransitionOutcome>;
    /// 仅当任务存在、属于 owner_id、仍为 PENDING 且未被占用时删除
    async fn delete_if_pending(&self, id: i64, owner_id: &str) -> SchedulerResult<bool>;
}

#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// 下节课主题非空的学生及其教师
    async fn with_lesson_topic(&self) -> SchedulerResult<Vec<LessonTopicRecipient>>;
    async fn clear_lesson_topic(&self, student_id: &str) -> SchedulerResult<bool>;
}

#[async_trait]
pub trait TestRepository: Send + Sync {
    /// 投递成功后将测试标记为已发送
    async fn mark_sent(&self, test_id: &str, sent_at: DateTime<Utc>) -> SchedulerResult<bool>;
}
