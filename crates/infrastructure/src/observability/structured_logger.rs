//! Structured logging helpers
//!
//! Every event carries a stable `event` field so log pipelines can filter on it.

use chrono::{DateTime, Utc};
use lesson_domain::value_objects::{BatchReport, SweepReport};
use tracing::{debug, error, info, warn};

pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_task_scheduled(
        task_id: i64,
        owner_id: &str,
        task_type: &str,
        scheduled_for: DateTime<Utc>,
    ) {
        info!(
            event = "task_scheduled",
            task.id = task_id,
            task.owner_id = owner_id,
            task.task_type = task_type,
            task.scheduled_for = %scheduled_for,
            "Scheduled task created"
        );
    }

    pub fn log_task_cancelled(task_id: i64, owner_id: &str) {
        info!(
            event = "task_cancelled",
            task.id = task_id,
            task.owner_id = owner_id,
            "Scheduled task cancelled"
        );
    }

    pub fn log_sweep_started(due: usize) {
        if due == 0 {
            debug!(event = "sweep_started", sweep.due = due, "No due tasks");
        } else {
            info!(event = "sweep_started", sweep.due = due, "Processing due tasks");
        }
    }

    pub fn log_sweep_finished(report: &SweepReport, duration_ms: u64) {
        info!(
            event = "sweep_finished",
            sweep.due = report.due,
            sweep.completed = report.completed,
            sweep.failed = report.failed,
            sweep.skipped = report.skipped,
            sweep.duration_ms = duration_ms,
            "Sweep finished"
        );
    }

    pub fn log_sweep_aborted(error: &str) {
        error!(event = "sweep_aborted", error = error, "Sweep aborted before processing");
    }

    pub fn log_delivery_completed(task_id: i64, task_type: &str, duration_ms: u64) {
        info!(
            event = "delivery_completed",
            task.id = task_id,
            task.task_type = task_type,
            task.duration_ms = duration_ms,
            "Scheduled task delivered"
        );
    }

    pub fn log_delivery_failed(task_id: i64, task_type: &str, error_kind: &str, error: &str) {
        error!(
            event = "delivery_failed",
            task.id = task_id,
            task.task_type = task_type,
            error.kind = error_kind,
            error.message = error,
            "Scheduled task failed"
        );
    }

    pub fn log_transition_skipped(task_id: i64, attempted_status: &str) {
        warn!(
            event = "transition_skipped",
            task.id = task_id,
            task.attempted_status = attempted_status,
            "Task no longer pending, transition skipped"
        );
    }

    pub fn log_claim_lost(task_id: i64) {
        info!(
            event = "claim_lost",
            task.id = task_id,
            "Task already claimed by another sweep, not delivered"
        );
    }

    pub fn log_status_write_failed(
        task_id: i64,
        task_type: &str,
        attempted_status: &str,
        error: &str,
    ) {
        error!(
            event = "status_write_failed",
            task.id = task_id,
            task.task_type = task_type,
            task.attempted_status = attempted_status,
            error.message = error,
            "Delivery outcome could not be persisted, task stays claimed"
        );
    }

    pub fn log_render_degraded(task_id: Option<i64>, error: &str) {
        warn!(
            event = "render_degraded",
            task.id = task_id,
            error.message = error,
            "Document rendering failed, continuing without attachment"
        );
    }

    pub fn log_follow_up_failed(task_id: i64, error: &str) {
        error!(
            event = "follow_up_failed",
            task.id = task_id,
            error.message = error,
            "Post-delivery update failed"
        );
    }

    pub fn log_batch_item_failed(job: &str, item: &str, error: &str) {
        warn!(
            event = "batch_item_failed",
            job.name = job,
            job.item = item,
            error.message = error,
            "Batch item failed, continuing"
        );
    }

    pub fn log_batch_finished(job: &str, report: &BatchReport, duration_ms: u64) {
        info!(
            event = "batch_finished",
            job.name = job,
            job.succeeded = report.succeeded,
            job.failed = report.failed,
            job.duration_ms = duration_ms,
            "Batch job finished"
        );
    }
}
