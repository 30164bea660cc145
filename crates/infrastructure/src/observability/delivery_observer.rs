use std::time::Duration;

use lesson_domain::entities::{DueTask, ScheduledTaskStatus};
use lesson_domain::ports::DeliveryObserver;
use lesson_domain::value_objects::{BatchReport, SweepReport};
use lesson_errors::SchedulerError;

use super::{MetricsCollector, StructuredLogger};

/// 生产环境的观察者：结构化日志 + Prometheus 指标
#[derive(Clone, Default)]
pub struct TracingDeliveryObserver {
    metrics: MetricsCollector,
}

impl TracingDeliveryObserver {
    pub fn new(metrics: MetricsCollector) -> Self {
        Self { metrics }
    }
}

fn type_label(task: &DueTask) -> &str {
    task.task_type
        .map(|t| t.as_str())
        .unwrap_or(task.raw_task_type.as_str())
}

impl DeliveryObserver for TracingDeliveryObserver {
    fn sweep_started(&self, due: usize) {
        StructuredLogger::log_sweep_started(due);
    }

    fn sweep_finished(&self, report: &SweepReport, elapsed: Duration) {
        self.metrics.record_sweep(report.due, elapsed.as_secs_f64());
        StructuredLogger::log_sweep_finished(report, elapsed.as_millis() as u64);
    }

    fn sweep_aborted(&self, error: &SchedulerError) {
        StructuredLogger::log_sweep_aborted(&error.to_string());
    }

    fn task_completed(&self, task: &DueTask, elapsed: Duration) {
        let task_type = type_label(task);
        self.metrics
            .record_delivery_completed(task_type, elapsed.as_secs_f64());
        StructuredLogger::log_delivery_completed(task.id, task_type, elapsed.as_millis() as u64);
    }

    fn task_failed(&self, task: &DueTask, error: &SchedulerError) {
        let task_type = type_label(task);
        self.metrics.record_delivery_failed(task_type, error.kind());
        StructuredLogger::log_delivery_failed(task.id, task_type, error.kind(), &error.to_string());
    }

    fn task_skipped(&self, task_id: i64, attempted: ScheduledTaskStatus) {
        self.metrics.record_transition_skipped();
        StructuredLogger::log_transition_skipped(task_id, attempted.as_str());
    }

    fn task_claim_lost(&self, task_id: i64) {
        self.metrics.record_claim_lost();
        StructuredLogger::log_claim_lost(task_id);
    }

    fn status_write_failed(
        &self,
        task: &DueTask,
        attempted: ScheduledTaskStatus,
        error: &SchedulerError,
    ) {
        self.metrics.record_status_write_failure();
        StructuredLogger::log_status_write_failed(
            task.id,
            type_label(task),
            attempted.as_str(),
            &error.to_string(),
        );
    }

    fn render_degraded(&self, task_id: Option<i64>, error: &SchedulerError) {
        self.metrics.record_render_degraded();
        StructuredLogger::log_render_degraded(task_id, &error.to_string());
    }

    fn follow_up_failed(&self, task_id: i64, error: &SchedulerError) {
        self.metrics.record_follow_up_failure();
        StructuredLogger::log_follow_up_failed(task_id, &error.to_string());
    }

    fn batch_item_failed(&self, job: &str, item: &str, error: &SchedulerError) {
        StructuredLogger::log_batch_item_failed(job, item, &error.to_string());
    }

    fn batch_finished(&self, job: &str, report: &BatchReport, elapsed: Duration) {
        self.metrics
            .record_batch(job, report.succeeded, report.failed, elapsed.as_secs_f64());
        StructuredLogger::log_batch_finished(job, report, elapsed.as_millis() as u64);
    }
}
