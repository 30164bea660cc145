//! Metrics for the scheduling pipeline, exported by the Prometheus recorder
//! installed in the binary. Without a recorder every call is a no-op.

use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};

#[derive(Clone)]
pub struct MetricsCollector {
    sweeps_total: Counter,
    sweep_duration: Histogram,
    due_tasks: Gauge,
    transitions_skipped_total: Counter,
    claims_lost_total: Counter,
    status_write_failures_total: Counter,
    render_degraded_total: Counter,
    follow_up_failures_total: Counter,
    tasks_cancelled_total: Counter,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            sweeps_total: counter!("lesson_scheduler_sweeps_total"),
            sweep_duration: histogram!("lesson_scheduler_sweep_duration_seconds"),
            due_tasks: gauge!("lesson_scheduler_due_tasks"),
            transitions_skipped_total: counter!("lesson_scheduler_transitions_skipped_total"),
            claims_lost_total: counter!("lesson_scheduler_claims_lost_total"),
            status_write_failures_total: counter!("lesson_scheduler_status_write_failures_total"),
            render_degraded_total: counter!("lesson_scheduler_render_degraded_total"),
            follow_up_failures_total: counter!("lesson_scheduler_follow_up_failures_total"),
            tasks_cancelled_total: counter!("lesson_scheduler_tasks_cancelled_total"),
        }
    }

    pub fn record_sweep(&self, due: usize, duration_seconds: f64) {
        self.sweeps_total.increment(1);
        self.due_tasks.set(due as f64);
        self.sweep_duration.record(duration_seconds);
    }

    pub fn record_delivery_completed(&self, task_type: &str, duration_seconds: f64) {
        counter!(
            "lesson_scheduler_deliveries_total",
            "task_type" => task_type.to_string(),
            "outcome" => "completed"
        )
        .increment(1);
        histogram!(
            "lesson_scheduler_delivery_duration_seconds",
            "task_type" => task_type.to_string()
        )
        .record(duration_seconds);
    }

    pub fn record_delivery_failed(&self, task_type: &str, error_kind: &'static str) {
        counter!(
            "lesson_scheduler_deliveries_total",
            "task_type" => task_type.to_string(),
            "outcome" => "failed"
        )
        .increment(1);
        counter!(
            "lesson_scheduler_delivery_failures_total",
            "task_type" => task_type.to_string(),
            "error_kind" => error_kind
        )
        .increment(1);
    }

    pub fn record_transition_skipped(&self) {
        self.transitions_skipped_total.increment(1);
    }

    pub fn record_claim_lost(&self) {
        self.claims_lost_total.increment(1);
    }

    pub fn record_status_write_failure(&self) {
        self.status_write_failures_total.increment(1);
    }

    pub fn record_render_degraded(&self) {
        self.render_degraded_total.increment(1);
    }

    pub fn record_follow_up_failure(&self) {
        self.follow_up_failures_total.increment(1);
    }

    pub fn record_task_created(&self, task_type: &str) {
        counter!(
            "lesson_scheduler_tasks_created_total",
            "task_type" => task_type.to_string()
        )
        .increment(1);
    }

    pub fn record_task_cancelled(&self) {
        self.tasks_cancelled_total.increment(1);
    }

    pub fn record_batch(&self, job: &str, succeeded: usize, failed: usize, duration_seconds: f64) {
        counter!(
            "lesson_scheduler_batch_items_total",
            "job" => job.to_string(),
            "outcome" => "succeeded"
        )
        .increment(succeeded as u64);
        counter!(
            "lesson_scheduler_batch_items_total",
            "job" => job.to_string(),
            "outcome" => "failed"
        )
        .increment(failed as u64);
        histogram!(
            "lesson_scheduler_batch_duration_seconds",
            "job" => job.to_string()
        )
        .record(duration_seconds);
    }
}
