use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

use crate::state::AppState;
use crate::task::refresh::refresh_records_and_favorites;

/// GET /api/cron - 触发元数据刷新
///
/// 遍历过程中的单条失败不会出现在这里；只有遍历开始前的
/// 顶层错误才返回失败状态。
pub async fn trigger(State(state): State<Arc<AppState>>) -> Response {
    match refresh_records_and_favorites(&state).await {
        Ok(()) => Json(json!({
            "success": true,
            "message": "Cron job executed successfully",
            "timestamp": Utc::now().to_rfc3339(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("定时刷新任务失败: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "success": false,
                    "message": "Cron job failed",
                    "error": e.to_string(),
                    "timestamp": Utc::now().to_rfc3339(),
                })),
            )
                .into_response()
        }
    }
}
