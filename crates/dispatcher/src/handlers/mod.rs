//! 按任务类型执行投递的处理器
//!
//! 处理器内部步骤严格顺序执行：前置检查、可选渲染、发送邮件、释放临时文档。
//! 对关联实体的写入（如标记测试已发送）不在处理器内完成，而是通过
//! [`DeliveryReceipt`] 交给扫描器，在任务状态迁移成功后执行。

mod lesson_topic;
mod notice;
mod test_delivery;

pub use lesson_topic::LessonTopicDeliveryHandler;
pub use test_delivery::TestDeliveryHandler;

pub(crate) use lesson_topic::deliver_lesson_topic;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use lesson_domain::entities::{DueTask, TaskType};
use lesson_domain::ports::{
    DeliveryObserver, DocumentRenderer, MailDispatcher, OutboundMail, RenderOptions,
    RenderedDocument,
};
use lesson_errors::SchedulerResult;
use lesson_infrastructure::TimeoutHandler;
use tracing::warn;

use crate::best_effort::absorb_enrichment;

/// 投递成功后需要由扫描器执行的后续写入
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUp {
    MarkTestSent { test_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub follow_up: Option<FollowUp>,
}

impl DeliveryReceipt {
    pub fn done() -> Self {
        Self::default()
    }

    pub fn with_follow_up(follow_up: FollowUp) -> Self {
        Self {
            follow_up: Some(follow_up),
        }
    }
}

#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    fn task_type(&self) -> TaskType;

    async fn deliver(&self, task: &DueTask) -> SchedulerResult<DeliveryReceipt>;
}

/// 处理器共享的外部协作者
#[derive(Clone)]
pub struct DeliveryContext {
    mailer: Arc<dyn MailDispatcher>,
    renderer: Option<Arc<dyn DocumentRenderer>>,
    timeouts: TimeoutHandler,
    observer: Arc<dyn DeliveryObserver>,
}

impl DeliveryContext {
    pub fn new(mailer: Arc<dyn MailDispatcher>, observer: Arc<dyn DeliveryObserver>) -> Self {
        Self {
            mailer,
            renderer: None,
            timeouts: TimeoutHandler::default(),
            observer,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutHandler) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn observer(&self) -> &Arc<dyn DeliveryObserver> {
        &self.observer
    }

    /// 渲染失败或超时都只降级为无附件
    pub(crate) async fn render(
        &self,
        task_id: Option<i64>,
        content: &str,
        options: &RenderOptions,
    ) -> Option<RenderedDocument> {
        let renderer = self.renderer.as_ref()?;
        absorb_enrichment(
            self.observer.as_ref(),
            task_id,
            self.timeouts
                .render_operation(renderer.render(content, options), &options.file_name),
        )
        .await
    }

    /// 发送邮件后释放文档，无论发送是否成功
    pub(crate) async fn dispatch(
        &self,
        mail: &OutboundMail,
        document: Option<RenderedDocument>,
    ) -> SchedulerResult<()> {
        let result = self
            .timeouts
            .mail_operation(self.mailer.send(mail), &mail.subject)
            .await;

        if let Some(document) = document {
            if let Err(e) = document.release() {
                warn!(error = %e, "临时文档清理失败");
            }
        }
        result
    }
}

/// 任务类型到处理器的映射
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Arc<dyn DeliveryHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册两个内置处理器
    pub fn standard(context: DeliveryContext) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TestDeliveryHandler::new(context.clone())));
        registry.register(Arc::new(LessonTopicDeliveryHandler::new(context)));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn DeliveryHandler>) {
        self.handlers.insert(handler.task_type(), handler);
    }

    pub fn get(&self, task_type: TaskType) -> Option<&Arc<dyn DeliveryHandler>> {
        self.handlers.get(&task_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
