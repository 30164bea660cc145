//! 到期任务扫描器
//!
//! 每次扫描读取 `scheduled_for <= now` 的 PENDING 任务，先占用再交给对应处理器，
//! 最后通过比较并设置写入终态。单个任务的失败只影响该任务本身。

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use lesson_domain::entities::{DueTask, ScheduledTaskStatus, TaskType};
use lesson_domain::ports::DeliveryObserver;
use lesson_domain::repositories::{ScheduledTaskRepository, TestRepository};
use lesson_domain::value_objects::{SweepReport, TransitionOutcome};
use lesson_errors::{SchedulerError, SchedulerResult};
use tracing::{debug, error, info, instrument};

use crate::handlers::{DeliveryHandler, DeliveryReceipt, FollowUp, HandlerRegistry};

/// 单个任务的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
    /// 任务已被并发扫描占用、处理或已取消
    Skipped,
}

pub struct DueTaskSweeper {
    tasks: Arc<dyn ScheduledTaskRepository>,
    tests: Arc<dyn TestRepository>,
    handlers: HandlerRegistry,
    observer: Arc<dyn DeliveryObserver>,
    max_concurrent: usize,
}

impl DueTaskSweeper {
    pub fn new(
        tasks: Arc<dyn ScheduledTaskRepository>,
        tests: Arc<dyn TestRepository>,
        handlers: HandlerRegistry,
        observer: Arc<dyn DeliveryObserver>,
    ) -> Self {
        Self {
            tasks,
            tests,
            handlers,
            observer,
            max_concurrent: 1,
        }
    }

    /// 同一次扫描内最多并行投递的任务数，1 表示顺序处理
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub async fn sweep(&self) -> SchedulerResult<SweepReport> {
        self.sweep_once(Utc::now()).await
    }

    /// 执行一次扫描。可以重叠调用：投递前的占用保证任务至多投递一次。
    #[instrument(skip(self), fields(now = %now))]
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> SchedulerResult<SweepReport> {
        let started = Instant::now();
        let due = match self.tasks.find_due(now).await {
            Ok(due) => due,
            Err(e) => {
                self.observer.sweep_aborted(&e);
                return Err(e);
            }
        };

        let mut report = SweepReport {
            due: due.len(),
            ..SweepReport::default()
        };
        self.observer.sweep_started(report.due);
        if due.is_empty() {
            debug!("没有到期的计划任务");
            self.observer.sweep_finished(&report, started.elapsed());
            return Ok(report);
        }

        // buffered 保持 find_due 的返回顺序
        let outcomes: Vec<TaskOutcome> = stream::iter(due)
            .map(|task| self.process(task))
            .buffered(self.max_concurrent)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                TaskOutcome::Completed => report.completed += 1,
                TaskOutcome::Failed => report.failed += 1,
                TaskOutcome::Skipped => report.skipped += 1,
            }
        }

        info!(
            due = report.due,
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            "扫描完成"
        );
        self.observer.sweep_finished(&report, started.elapsed());
        Ok(report)
    }

    /// 处理单个到期任务，所有错误都在这里消化
    pub async fn process(&self, task: DueTask) -> TaskOutcome {
        let started = Instant::now();
        match self.tasks.claim(task.id, Utc::now()).await {
            Ok(TransitionOutcome::Applied) => {}
            Ok(TransitionOutcome::Skipped) => {
                self.observer.task_claim_lost(task.id);
                return TaskOutcome::Skipped;
            }
            Err(e) => {
                // 未占用成功，任务保持原样留给下一次扫描
                error!(task_id = task.id, error = %e, "占用计划任务出错");
                self.observer.task_failed(&task, &e);
                return TaskOutcome::Failed;
            }
        }

        let result = match self.resolve_handler(&task) {
            Ok(handler) => handler.deliver(&task).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(receipt) => self.complete(&task, receipt, started).await,
            Err(e) => self.fail(&task, e).await,
        }
    }

    /// 数据损坏、未知类型或缺少关联数据的任务不调用处理器
    fn resolve_handler(&self, task: &DueTask) -> SchedulerResult<&Arc<dyn DeliveryHandler>> {
        if let Some(load_error) = &task.load_error {
            return Err(SchedulerError::Serialization(load_error.clone()));
        }
        let task_type = task.task_type.ok_or_else(|| {
            SchedulerError::validation_error(format!("未知的任务类型: {}", task.raw_task_type))
        })?;
        if task.student.is_none() {
            return Err(SchedulerError::missing_data(format!(
                "学生 {} 不存在或不属于任务所有者",
                task.student_id
            )));
        }
        if task_type == TaskType::Test && task.test.is_none() {
            return Err(SchedulerError::missing_data(match &task.test_id {
                Some(test_id) => format!("测试 {test_id} 不存在或不属于该学生"),
                None => "测试任务缺少 testId".to_string(),
            }));
        }
        self.handlers
            .get(task_type)
            .ok_or_else(|| SchedulerError::Internal(format!("没有注册 {task_type} 类型的处理器")))
    }

    async fn complete(
        &self,
        task: &DueTask,
        receipt: DeliveryReceipt,
        started: Instant,
    ) -> TaskOutcome {
        match self
            .tasks
            .transition_status(task.id, ScheduledTaskStatus::Completed)
            .await
        {
            Ok(TransitionOutcome::Applied) => {
                if let Some(follow_up) = receipt.follow_up {
                    self.apply_follow_up(task.id, follow_up).await;
                }
                self.observer.task_completed(task, started.elapsed());
                TaskOutcome::Completed
            }
            Ok(TransitionOutcome::Skipped) => {
                self.observer
                    .task_skipped(task.id, ScheduledTaskStatus::Completed);
                TaskOutcome::Skipped
            }
            Err(e) => {
                // 投递已完成但状态未写入，占用保留，后续扫描不会重发
                self.observer
                    .status_write_failed(task, ScheduledTaskStatus::Completed, &e);
                TaskOutcome::Failed
            }
        }
    }

    async fn fail(&self, task: &DueTask, error: SchedulerError) -> TaskOutcome {
        match self
            .tasks
            .transition_status(task.id, ScheduledTaskStatus::Failed)
            .await
        {
            Ok(TransitionOutcome::Applied) => {
                self.observer.task_failed(task, &error);
                TaskOutcome::Failed
            }
            Ok(TransitionOutcome::Skipped) => {
                self.observer.task_skipped(task.id, ScheduledTaskStatus::Failed);
                TaskOutcome::Skipped
            }
            Err(e) => {
                self.observer
                    .status_write_failed(task, ScheduledTaskStatus::Failed, &e);
                self.observer.task_failed(task, &error);
                TaskOutcome::Failed
            }
        }
    }

    async fn apply_follow_up(&self, task_id: i64, follow_up: FollowUp) {
        let result = match &follow_up {
            FollowUp::MarkTestSent { test_id } => {
                match self.tests.mark_sent(test_id, Utc::now()).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(SchedulerError::missing_data(format!(
                        "测试 {test_id} 已不存在"
                    ))),
                    Err(e) => Err(e),
                }
            }
        };
        if let Err(e) = result {
            self.observer.follow_up_failed(task_id, &e);
        }
    }
}
