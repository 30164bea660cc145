//! # Lesson Scheduler API
//!
//! 计划任务的 HTTP 接口，基于 Axum 构建。
//!
//! ## API 端点
//!
//! - `GET /health` - 健康检查
//! - `GET /metrics` - Prometheus 指标（路径可配置）
//! - `POST /scheduled-tasks` - 创建计划任务
//! - `GET /scheduled-tasks` - 列出当前教师的全部计划任务
//! - `DELETE /scheduled-tasks/{id}` - 取消待执行任务
//!
//! 计划任务接口同样可以通过 `/api` 前缀访问。
//!
//! ## 身份
//!
//! 启用认证时通过 `X-API-Key` 头映射到教师；关闭时读取 `X-Owner-Id`。
//!
//! ## 错误格式
//!
//! ```json
//! {
//!   "error": {
//!     "message": "计划任务不存在或无法取消",
//!     "type": "TASK_NOT_FOUND",
//!     "code": 404,
//!     "timestamp": "2024-01-01T00:00:00Z"
//!   }
//! }
//! ```

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use lesson_config::ApiConfig;
use lesson_dispatcher::ScheduledTaskController;
use middleware::{cors_layer, request_logging, trace_layer};
use routes::{create_routes, AppState};

pub use error::{ApiError, ApiResult};

/// 创建完整的API应用
pub fn create_app(
    controller: Arc<ScheduledTaskController>,
    api_config: &ApiConfig,
    metrics: Option<PrometheusHandle>,
    metrics_path: &str,
) -> Router {
    let state = AppState {
        controller,
        auth: Arc::new(api_config.auth.clone()),
        metrics,
    };

    let router = create_routes(state, metrics_path).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(TimeoutLayer::new(Duration::from_secs(
                api_config.request_timeout_seconds,
            )))
            .layer(axum::middleware::from_fn(request_logging)),
    );

    if api_config.cors_enabled {
        router.layer(cors_layer(api_config))
    } else {
        router
    }
}
