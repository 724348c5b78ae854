//! 缓存运维处理器
//!
//! 底层数据变更后按模式失效缓存、重置统计计数

use axum::{extract::State, response::Json};
use serde_json::json;
use tracing::{info, instrument};

use crate::presentation::dto::{InvalidatePatternRequest, InvalidateResponse};
use crate::presentation::routes::AppState;
use crate::shared::{AppError, AppResult};

/// 按模式失效缓存
#[instrument(skip(state))]
pub async fn invalidate_cache(
    State(state): State<AppState>,
    Json(request): Json<InvalidatePatternRequest>,
) -> AppResult<Json<InvalidateResponse>> {
    if request.pattern.trim().is_empty() {
        return Err(AppError::Validation("失效模式不能为空".to_string()));
    }

    let deleted = state.cache_engine.invalidate(&request.pattern).await?;
    info!("缓存失效完成: pattern={}, deleted={}", request.pattern, deleted);

    Ok(Json(InvalidateResponse { deleted }))
}

/// 重置缓存统计计数
#[instrument(skip(state))]
pub async fn reset_cache_stats(
    State(state): State<AppState>,
) -> AppResult<Json<serde_json::Value>> {
    state.cache_engine.reset_stats().await;
    info!("缓存统计已重置");

    Ok(Json(json!({ "status": "ok" })))
}
