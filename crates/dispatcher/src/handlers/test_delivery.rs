use async_trait::async_trait;
use lesson_domain::entities::{DueTask, TaskType};
use lesson_errors::{SchedulerError, SchedulerResult};
use tracing::{debug, instrument};

use super::notice::{test_mail, test_render_options};
use super::{DeliveryContext, DeliveryHandler, DeliveryReceipt, FollowUp};

/// 发送测试：渲染 PDF（可选）并发邮件，成功后要求标记测试已发送
pub struct TestDeliveryHandler {
    context: DeliveryContext,
}

impl TestDeliveryHandler {
    pub fn new(context: DeliveryContext) -> Self {
        Self { context }
    }
}

#[async_trait]
impl DeliveryHandler for TestDeliveryHandler {
    fn task_type(&self) -> TaskType {
        TaskType::Test
    }

    #[instrument(skip_all, fields(task_id = task.id))]
    async fn deliver(&self, task: &DueTask) -> SchedulerResult<DeliveryReceipt> {
        let student = task
            .student
            .as_ref()
            .ok_or_else(|| SchedulerError::missing_data(format!("学生 {}", task.student_id)))?;
        let test = task.test.as_ref().ok_or_else(|| {
            SchedulerError::missing_data(format!(
                "测试 {}",
                task.test_id.as_deref().unwrap_or("<未指定>")
            ))
        })?;

        let options = test_render_options(test, student, &task.metadata);
        let document = self
            .context
            .render(Some(task.id), &test.content, &options)
            .await;

        let mail = test_mail(
            student,
            task.teacher.as_ref(),
            test,
            document.as_ref().map(|d| d.as_attachment()),
        );
        self.context.dispatch(&mail, document).await?;

        debug!(test_id = %test.id, to = %student.email, "测试邮件已发送");
        Ok(DeliveryReceipt::with_follow_up(FollowUp::MarkTestSent {
            test_id: test.id.clone(),
        }))
    }
}
