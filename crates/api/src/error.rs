use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lesson_errors::SchedulerError;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度器错误: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("验证错误: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("认证失败: {0}")]
    Unauthorized(String),

    #[error("未找到资源")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_type) = match &self {
            // 不存在、他人所有、已处理的任务统一返回 404，不泄露状态
            ApiError::Scheduler(SchedulerError::TaskNotFound { .. }) => (
                StatusCode::NOT_FOUND,
                "计划任务不存在或无法取消".to_string(),
                "TASK_NOT_FOUND",
            ),
            ApiError::Scheduler(SchedulerError::ValidationError(msg)) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数验证失败: {msg}"),
                "VALIDATION_ERROR",
            ),
            ApiError::Validation(errors) => {
                let error_details: Vec<String> = errors
                    .field_errors()
                    .iter()
                    .map(|(field, errors)| {
                        let messages: Vec<String> = errors
                            .iter()
                            .map(|e| {
                                e.message
                                    .as_ref()
                                    .map(|m| m.to_string())
                                    .unwrap_or_else(|| e.code.to_string())
                            })
                            .collect();
                        format!("{field}: {}", messages.join(", "))
                    })
                    .collect();
                (
                    StatusCode::BAD_REQUEST,
                    format!("请求参数验证失败: {}", error_details.join("; ")),
                    "VALIDATION_ERROR",
                )
            }
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                format!("请求参数错误: {msg}"),
                "BAD_REQUEST",
            ),
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                msg.clone(),
                "AUTHENTICATION_ERROR",
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "请求的资源不存在".to_string(),
                "NOT_FOUND",
            ),
            ApiError::Scheduler(e) => {
                error!(error = %e, kind = e.kind(), "请求处理失败");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "系统内部错误".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_scheduler_error_conversion() {
        let api_error: ApiError = SchedulerError::task_not_found(123).into();
        assert!(matches!(
            api_error,
            ApiError::Scheduler(SchedulerError::TaskNotFound { id: 123 })
        ));
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Scheduler(SchedulerError::task_not_found(1)),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Scheduler(SchedulerError::validation_error("缺少任务类型")),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::BadRequest("bad json".into()), StatusCode::BAD_REQUEST),
            (
                ApiError::Unauthorized("缺少身份".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::Scheduler(SchedulerError::database_error("down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::BadRequest("x".into()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["type"], "BAD_REQUEST");
        assert_eq!(body["error"]["code"], 400);
        assert!(body["error"]["message"].is_string());
        assert!(body["error"]["timestamp"].is_string());
    }
}
