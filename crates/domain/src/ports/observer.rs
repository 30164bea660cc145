use std::time::Duration;

use lesson_errors::SchedulerError;

use crate::entities::{DueTask, ScheduledTaskStatus};
use crate::value_objects::{BatchReport, SweepReport};

/// 投递过程的观察者，由调用方注入扫描器和处理器
pub trait DeliveryObserver: Send + Sync {
    fn sweep_started(&self, due: usize);
    fn sweep_finished(&self, report: &SweepReport, elapsed: Duration);
    fn sweep_aborted(&self, error: &SchedulerError);
    fn task_completed(&self, task: &DueTask, elapsed: Duration);
    fn task_failed(&self, task: &DueTask, error: &SchedulerError);
    /// 状态迁移被跳过：任务已被并发处理或已取消
    fn task_skipped(&self, task_id: i64, attempted: ScheduledTaskStatus);
    /// 占用失败，任务未投递
    fn task_claim_lost(&self, task_id: i64);
    /// 投递已有结果，但终态写入出错；任务保持占用，不会被再次投递
    fn status_write_failed(
        &self,
        task: &DueTask,
        attempted: ScheduledTaskStatus,
        error: &SchedulerError,
    );
    /// 文档渲染失败但投递继续
    fn render_degraded(&self, task_id: Option<i64>, error: &SchedulerError);
    fn follow_up_failed(&self, task_id: i64, error: &SchedulerError);
    fn batch_item_failed(&self, job: &str, item: &str, error: &SchedulerError);
    fn batch_finished(&self, job: &str, report: &BatchReport, elapsed: Duration);
}
