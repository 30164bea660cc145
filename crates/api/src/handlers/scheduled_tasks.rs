use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

use lesson_dispatcher::ScheduleTaskInput;
use lesson_domain::entities::TaskType;

use crate::{
    auth::AuthenticatedOwner,
    error::{ApiError, ApiResult},
    response::{created, success, ApiResponse},
    routes::AppState,
};

/// 计划任务创建请求
///
/// 类型和时间在这里只做格式解析，是否缺失由控制器判定。
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateScheduledTaskRequest {
    pub task_type: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 128, message = "studentId 长度必须在 1 到 128 之间"))]
    pub student_id: Option<String>,
    #[validate(length(min = 1, max = 128, message = "testId 长度必须在 1 到 128 之间"))]
    pub test_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl CreateScheduledTaskRequest {
    fn into_input(self) -> ApiResult<ScheduleTaskInput> {
        let task_type = self
            .task_type
            .as_deref()
            .map(str::parse::<TaskType>)
            .transpose()?;
        Ok(ScheduleTaskInput {
            task_type,
            scheduled_for: self.scheduled_for,
            student_id: self.student_id,
            test_id: self.test_id,
            metadata: self.metadata,
        })
    }
}

/// 创建计划任务
pub async fn create_scheduled_task(
    State(state): State<AppState>,
    owner: AuthenticatedOwner,
    payload: Result<Json<CreateScheduledTaskRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    request.validate()?;

    let task = state
        .controller
        .create(&owner.owner_id, request.into_input()?)
        .await?;
    Ok(created(task))
}

/// 列出当前教师的全部计划任务（含已完成和失败的），按计划时间排序
pub async fn list_scheduled_tasks(
    State(state): State<AppState>,
    owner: AuthenticatedOwner,
) -> ApiResult<impl IntoResponse> {
    let tasks = state.controller.list(&owner.owner_id).await?;
    Ok(success(tasks))
}

/// 取消仍处于 PENDING 的计划任务
pub async fn cancel_scheduled_task(
    State(state): State<AppState>,
    owner: AuthenticatedOwner,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(id) = id.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    state.controller.cancel(id, &owner.owner_id).await?;
    Ok(ApiResponse::success_empty_with_message(
        "计划任务已取消".to_string(),
    ))
}
