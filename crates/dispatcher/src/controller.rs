use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use lesson_domain::entities::{NewScheduledTask, ScheduledTask, ScheduledTaskView, TaskType};
use lesson_domain::repositories::ScheduledTaskRepository;
use lesson_errors::{SchedulerError, SchedulerResult};
use lesson_infrastructure::{MetricsCollector, StructuredLogger};

/// 创建计划任务的输入，字段缺失时在控制器中校验
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTaskInput {
    pub task_type: Option<TaskType>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub student_id: Option<String>,
    pub test_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// 面向用户的同步接口：创建、列出、取消
pub struct ScheduledTaskController {
    tasks: Arc<dyn ScheduledTaskRepository>,
    metrics: Arc<MetricsCollector>,
}

impl ScheduledTaskController {
    pub fn new(tasks: Arc<dyn ScheduledTaskRepository>, metrics: Arc<MetricsCollector>) -> Self {
        Self { tasks, metrics }
    }

    /// 不要求 scheduledFor 在未来：过去的时间会在下一次扫描时立即到期
    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        owner_id: &str,
        input: ScheduleTaskInput,
    ) -> SchedulerResult<ScheduledTask> {
        let student_id = input
            .student_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| SchedulerError::validation_error("缺少学生 studentId"))?;

        let new_task = NewScheduledTask {
            owner_id: owner_id.to_string(),
            task_type: input.task_type,
            scheduled_for: input.scheduled_for,
            student_id,
            test_id: input.test_id.filter(|id| !id.trim().is_empty()),
            metadata: input.metadata.unwrap_or_else(|| serde_json::json!({})),
        };
        if !new_task.metadata.is_object() {
            return Err(SchedulerError::validation_error("metadata 必须是 JSON 对象"));
        }

        let task = self.tasks.insert(&new_task).await?;
        StructuredLogger::log_task_scheduled(
            task.id,
            owner_id,
            task.task_type.as_str(),
            task.scheduled_for,
        );
        self.metrics.record_task_created(task.task_type.as_str());
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn list(&self, owner_id: &str) -> SchedulerResult<Vec<ScheduledTaskView>> {
        let tasks = self.tasks.find_by_owner(owner_id).await?;
        debug!(count = tasks.len(), "列出计划任务");
        Ok(tasks)
    }

    /// 只有仍处于 PENDING 且属于调用者的任务可以取消；
    /// 不存在、他人所有、已完成或已失败统一返回未找到
    #[instrument(skip(self))]
    pub async fn cancel(&self, task_id: i64, owner_id: &str) -> SchedulerResult<()> {
        if !self.tasks.delete_if_pending(task_id, owner_id).await? {
            debug!(task_id, "计划任务不存在或无法取消");
            return Err(SchedulerError::task_not_found(task_id));
        }
        StructuredLogger::log_task_cancelled(task_id, owner_id);
        self.metrics.record_task_cancelled();
        info!(task_id, "计划任务已取消");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lesson_domain::entities::ScheduledTaskStatus;
    use lesson_testing_utils::InMemoryLessonStore;

    fn controller(store: &InMemoryLessonStore) -> ScheduledTaskController {
        ScheduledTaskController::new(Arc::new(store.clone()), Arc::new(MetricsCollector::new()))
    }

    fn input(task_type: TaskType, when: DateTime<Utc>) -> ScheduleTaskInput {
        ScheduleTaskInput {
            task_type: Some(task_type),
            scheduled_for: Some(when),
            student_id: Some("student-1".into()),
            ..ScheduleTaskInput::default()
        }
    }

    #[tokio::test]
    async fn test_create_accepts_past_time() {
        let store = InMemoryLessonStore::new();
        let task = controller(&store)
            .create("teacher-1", input(TaskType::LessonTopic, Utc::now() - Duration::days(1)))
            .await
            .unwrap();
        assert_eq!(task.status, ScheduledTaskStatus::Pending);
        assert_eq!(task.owner_id, "teacher-1");
        assert_eq!(task.metadata, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_create_rejects_missing_fields() {
        let store = InMemoryLessonStore::new();
        let controller = controller(&store);

        let mut no_type = input(TaskType::Test, Utc::now());
        no_type.task_type = None;
        let mut no_time = input(TaskType::Test, Utc::now());
        no_time.scheduled_for = None;
        let mut no_student = input(TaskType::Test, Utc::now());
        no_student.student_id = Some(" ".into());
        let mut bad_metadata = input(TaskType::Test, Utc::now());
        bad_metadata.metadata = Some(serde_json::json!([1, 2]));

        for bad in [no_type, no_time, no_student, bad_metadata] {
            let err = controller.create("teacher-1", bad).await.unwrap_err();
            assert!(matches!(err, SchedulerError::ValidationError(_)));
        }
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn test_test_task_without_test_id_is_accepted() {
        let store = InMemoryLessonStore::new();
        let task = controller(&store)
            .create("teacher-1", input(TaskType::Test, Utc::now()))
            .await
            .unwrap();
        assert_eq!(task.test_id, None);
    }

    #[tokio::test]
    async fn test_cancel_rules() {
        let store = InMemoryLessonStore::new();
        let controller = controller(&store);
        let when = Utc::now() + Duration::hours(1);
        let task = controller
            .create("teacher-1", input(TaskType::LessonTopic, when))
            .await
            .unwrap();

        let err = controller.cancel(task.id, "teacher-2").await.unwrap_err();
        assert!(matches!(err, SchedulerError::TaskNotFound { id } if id == task.id));

        controller.cancel(task.id, "teacher-1").await.unwrap();
        assert!(controller.list("teacher-1").await.unwrap().is_empty());
        assert!(controller.cancel(task.id, "teacher-1").await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_processed_task_is_rejected() {
        let store = InMemoryLessonStore::new();
        let controller = controller(&store);
        let task = controller
            .create("teacher-1", input(TaskType::LessonTopic, Utc::now()))
            .await
            .unwrap();
        store.simulate_concurrent_transition(task.id, ScheduledTaskStatus::Completed);

        let err = controller.cancel(task.id, "teacher-1").await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
        assert_eq!(controller.list("teacher-1").await.unwrap().len(), 1);
    }

    #[test]
    fn test_input_deserializes_camel_case() {
        let parsed: ScheduleTaskInput = serde_json::from_value(serde_json::json!({
            "taskType": "TEST",
            "scheduledFor": "2026-03-01T09:30:00Z",
            "studentId": "student-1",
            "testId": "test-1"
        }))
        .unwrap();
        assert_eq!(parsed.task_type, Some(TaskType::Test));
        assert_eq!(parsed.test_id.as_deref(), Some("test-1"));
        assert!(parsed.metadata.is_none());
    }
}
