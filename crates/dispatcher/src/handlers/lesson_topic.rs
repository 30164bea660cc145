use async_trait::async_trait;
use lesson_domain::entities::{DueTask, StudentSnapshot, TaskType, TeacherSnapshot};
use lesson_errors::{SchedulerError, SchedulerResult};
use tracing::{debug, instrument};

use super::notice::{lesson_topic_mail, lesson_topic_render_options, lesson_topic_sheet};
use super::{DeliveryContext, DeliveryHandler, DeliveryReceipt};

/// 通知学生下节课主题；每周广播任务复用同一流程
pub(crate) async fn deliver_lesson_topic(
    context: &DeliveryContext,
    task_id: Option<i64>,
    student: &StudentSnapshot,
    teacher: Option<&TeacherSnapshot>,
    metadata: &serde_json::Value,
) -> SchedulerResult<()> {
    let topic = student.lesson_topic().ok_or_else(|| {
        SchedulerError::missing_data(format!("学生 {} 没有下节课主题", student.id))
    })?;

    let options = lesson_topic_render_options(topic, student, metadata);
    let document = context
        .render(task_id, &lesson_topic_sheet(topic, student), &options)
        .await;

    let mail = lesson_topic_mail(
        student,
        teacher,
        topic,
        document.as_ref().map(|d| d.as_attachment()),
    );
    context.dispatch(&mail, document).await?;

    debug!(student_id = %student.id, "课程主题通知已发送");
    Ok(())
}

pub struct LessonTopicDeliveryHandler {
    context: DeliveryContext,
}

impl LessonTopicDeliveryHandler {
    pub fn new(context: DeliveryContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl DeliveryHandler for LessonTopicDeliveryHandler {
    fn task_type(&self) -> TaskType {
        TaskType::LessonTopic
    }

    #[instrument(skip_all, fields(task_id = task.id))]
    async fn deliver(&self, task: &DueTask) -> SchedulerResult<DeliveryReceipt> {
        let student = task
            .student
            .as_ref()
            .ok_or_else(|| SchedulerError::missing_data(format!("学生 {}", task.student_id)))?;

        deliver_lesson_topic(
            &self.context,
            Some(task.id),
            student,
            task.teacher.as_ref(),
            &task.metadata,
        )
        .await?;
        Ok(DeliveryReceipt::done())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_testing_utils::{
        student, DueTaskBuilder, MockDocumentRenderer, RecordingMailDispatcher, RecordingObserver,
    };
    use std::sync::Arc;

    fn handler(mailer: &RecordingMailDispatcher) -> LessonTopicDeliveryHandler {
        let context = DeliveryContext::new(
            Arc::new(mailer.clone()),
            Arc::new(RecordingObserver::new()),
        )
        .with_renderer(Arc::new(MockDocumentRenderer::succeeding()));
        LessonTopicDeliveryHandler::new(context)
    }

    #[tokio::test]
    async fn test_sends_topic_notice() {
        let mailer = RecordingMailDispatcher::new();
        let task = DueTaskBuilder::lesson_topic(1, "Ordering food").build();

        let receipt = handler(&mailer).deliver(&task).await.unwrap();
        assert_eq!(receipt, DeliveryReceipt::done());

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].mail.subject.contains("Ordering food"));
        assert!(sent[0].mail.body_text.contains("Marta"));
        assert!(sent[0].mail.attachment.is_some());
    }

    #[tokio::test]
    async fn test_empty_topic_fails_without_mail() {
        let mailer = RecordingMailDispatcher::new();
        let task = DueTaskBuilder::new(2, TaskType::LessonTopic).build();

        let err = handler(&mailer).deliver(&task).await.unwrap_err();
        assert!(matches!(err, SchedulerError::MissingData(_)));
        assert_eq!(mailer.attempts(), 0);

        let blank = DueTaskBuilder::lesson_topic(3, "   ").build();
        assert!(handler(&mailer).deliver(&blank).await.is_err());
        assert_eq!(mailer.attempts(), 0);
    }

    #[tokio::test]
    async fn test_missing_teacher_uses_fallback_name() {
        let mailer = RecordingMailDispatcher::new();
        let task = DueTaskBuilder::lesson_topic(4, "Travel")
            .without_teacher()
            .build();

        handler(&mailer).deliver(&task).await.unwrap();
        assert!(mailer.sent()[0].mail.body_text.contains("your teacher"));
    }

    #[tokio::test]
    async fn test_mail_failure_propagates() {
        let mailer = RecordingMailDispatcher::failing();
        let task = DueTaskBuilder::new(5, TaskType::LessonTopic)
            .with_student(lesson_domain::entities::StudentSnapshot {
                next_lesson_topic: Some("Weather".into()),
                ..student("student-9", "Iris")
            })
            .build();

        let err = handler(&mailer).deliver(&task).await.unwrap_err();
        assert!(matches!(err, SchedulerError::MailDispatch(_)));
    }
}
