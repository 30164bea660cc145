use axum::{
    routing::{delete, get},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use lesson_config::AuthConfig;
use lesson_dispatcher::ScheduledTaskController;

use crate::handlers::{
    health::health_check,
    metrics::prometheus_metrics,
    scheduled_tasks::{cancel_scheduled_task, create_scheduled_task, list_scheduled_tasks},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<ScheduledTaskController>,
    pub auth: Arc<AuthConfig>,
    pub metrics: Option<PrometheusHandle>,
}

fn scheduled_task_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/scheduled-tasks",
            get(list_scheduled_tasks).post(create_scheduled_task),
        )
        .route("/scheduled-tasks/{id}", delete(cancel_scheduled_task))
}

/// 创建API路由，计划任务接口同时挂在根路径和 `/api` 下
pub fn create_routes(state: AppState, metrics_path: &str) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(metrics_path, get(prometheus_metrics))
        .merge(scheduled_task_routes())
        .nest("/api", scheduled_task_routes())
        .with_state(state)
}
