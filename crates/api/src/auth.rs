use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::{error::ApiError, routes::AppState};

pub const API_KEY_HEADER: &str = "X-API-Key";
pub const OWNER_ID_HEADER: &str = "X-Owner-Id";

/// 当前请求所属的教师
///
/// 认证启用时只接受配置中的有效 API Key；关闭时信任上游网关注入的 `X-Owner-Id`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedOwner {
    pub owner_id: String,
}

impl FromRequestParts<AppState> for AuthenticatedOwner {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        if state.auth.enabled {
            let key = header(API_KEY_HEADER)
                .ok_or_else(|| ApiError::Unauthorized("缺少 API Key".to_string()))?;
            return match state.auth.owner_for_key(key) {
                Some(owner_id) => Ok(Self {
                    owner_id: owner_id.to_string(),
                }),
                None => {
                    warn!(path = %parts.uri.path(), "无效的 API Key");
                    Err(ApiError::Unauthorized("无效的 API Key".to_string()))
                }
            };
        }

        header(OWNER_ID_HEADER)
            .map(|owner_id| Self {
                owner_id: owner_id.to_string(),
            })
            .ok_or_else(|| ApiError::Unauthorized("缺少请求方身份".to_string()))
    }
}
