//! 每周的课程主题批量任务，逐个学生尽力执行

use std::sync::Arc;

use async_trait::async_trait;
use lesson_domain::repositories::StudentRepository;
use lesson_domain::value_objects::BatchReport;
use lesson_errors::{SchedulerError, SchedulerResult};
use tracing::info;

use crate::best_effort::run_best_effort;
use crate::handlers::{deliver_lesson_topic, DeliveryContext};

pub const LESSON_TOPIC_BROADCAST_JOB: &str = "lesson_topic_broadcast";
pub const LESSON_TOPIC_CLEARING_JOB: &str = "lesson_topic_clearing";

/// 由 cron 驱动的批量任务
#[async_trait]
pub trait BatchJob: Send + Sync {
    fn name(&self) -> &'static str;

    /// 读取批次失败时返回错误，单项失败只计入报告
    async fn run(&self) -> SchedulerResult<BatchReport>;
}

/// 向所有有下节课主题的学生发送通知
pub struct LessonTopicBroadcastJob {
    students: Arc<dyn StudentRepository>,
    context: DeliveryContext,
}

impl LessonTopicBroadcastJob {
    pub fn new(students: Arc<dyn StudentRepository>, context: DeliveryContext) -> Self {
        Self { students, context }
    }
}

#[async_trait]
impl BatchJob for LessonTopicBroadcastJob {
    fn name(&self) -> &'static str {
        LESSON_TOPIC_BROADCAST_JOB
    }

    async fn run(&self) -> SchedulerResult<BatchReport> {
        let recipients = self.students.with_lesson_topic().await?;
        info!(count = recipients.len(), "开始发送每周课程主题通知");

        let metadata = serde_json::json!({});
        let context = &self.context;
        let metadata = &metadata;
        let report = run_best_effort(
            self.name(),
            recipients,
            |r| r.student.id.clone(),
            context.observer().as_ref(),
            |recipient| async move {
                deliver_lesson_topic(
                    context,
                    None,
                    &recipient.student,
                    Some(&recipient.teacher),
                    metadata,
                )
                .await
            },
        )
        .await;
        Ok(report)
    }
}

/// 清空所有学生的下节课主题
pub struct LessonTopicClearingJob {
    students: Arc<dyn StudentRepository>,
    context: DeliveryContext,
}

impl LessonTopicClearingJob {
    pub fn new(students: Arc<dyn StudentRepository>, context: DeliveryContext) -> Self {
        Self { students, context }
    }
}

#[async_trait]
impl BatchJob for LessonTopicClearingJob {
    fn name(&self) -> &'static str {
        LESSON_TOPIC_CLEARING_JOB
    }

    async fn run(&self) -> SchedulerResult<BatchReport> {
        let recipients = self.students.with_lesson_topic().await?;
        let students = &self.students;
        let report = run_best_effort(
            self.name(),
            recipients,
            |r| r.student.id.clone(),
            self.context.observer().as_ref(),
            |recipient| async move {
                if students.clear_lesson_topic(&recipient.student.id).await? {
                    Ok(())
                } else {
                    Err(SchedulerError::missing_data(format!(
                        "学生 {} 已不存在",
                        recipient.student.id
                    )))
                }
            },
        )
        .await;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_testing_utils::{
        student, student_with_topic, teacher, InMemoryLessonStore, ObservedEvent,
        RecordingMailDispatcher, RecordingObserver,
    };

    fn seeded_store() -> InMemoryLessonStore {
        let store = InMemoryLessonStore::new();
        store.add_teacher(teacher("teacher-1", "Marta"));
        store.add_student("teacher-1", student_with_topic("student-1", "Ana", "Travel"));
        store.add_student("teacher-1", student_with_topic("student-2", "Bea", "Food"));
        store.add_student("teacher-1", student("student-3", "Carl"));
        store
    }

    #[tokio::test]
    async fn test_broadcast_continues_after_mail_failure() {
        let store = seeded_store();
        let mailer = RecordingMailDispatcher::new();
        mailer.fail_for("student-1@students.example.com");
        let observer = RecordingObserver::new();
        let context = DeliveryContext::new(Arc::new(mailer.clone()), Arc::new(observer.clone()));
        let job = LessonTopicBroadcastJob::new(Arc::new(store), context);

        let report = job.run().await.unwrap();
        assert_eq!(report, BatchReport { succeeded: 1, failed: 1 });
        assert_eq!(mailer.attempts(), 2);
        assert_eq!(mailer.sent()[0].mail.to, "student-2@students.example.com");
        assert!(observer.events().contains(&ObservedEvent::BatchItemFailed {
            job: LESSON_TOPIC_BROADCAST_JOB.into(),
            item: "student-1".into()
        }));
    }

    #[tokio::test]
    async fn test_clearing_resets_topics_best_effort() {
        let store = seeded_store();
        store.fail_clear_for("student-1");
        let observer = RecordingObserver::new();
        let context = DeliveryContext::new(
            Arc::new(RecordingMailDispatcher::new()),
            Arc::new(observer.clone()),
        );
        let job = LessonTopicClearingJob::new(Arc::new(store.clone()), context);

        let report = job.run().await.unwrap();
        assert_eq!(report, BatchReport { succeeded: 1, failed: 1 });
        assert!(store.student("student-1").unwrap().next_lesson_topic.is_some());
        assert!(store.student("student-2").unwrap().next_lesson_topic.is_none());
        assert_eq!(
            observer.count(|e| matches!(e, ObservedEvent::BatchFinished { .. })),
            1
        );
    }
}
