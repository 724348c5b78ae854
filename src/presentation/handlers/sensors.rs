//! 传感器遥测查询处理器

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use tracing::instrument;

use crate::infrastructure::timeseries::{
    fetch_aggregates, fetch_latest, Resolution, SensorReading, TimeFilter,
};
use crate::presentation::dto::{AggregatesQuery, AggregatesResponse};
use crate::presentation::routes::AppState;
use crate::shared::types::PaginationParams;
use crate::shared::{AppError, AppResult};

/// 单头牲畜的最新读数
#[instrument(skip(state))]
pub async fn get_latest_reading(
    State(state): State<AppState>,
    Path(cow_id): Path<String>,
) -> AppResult<Json<SensorReading>> {
    if cow_id.trim().is_empty() {
        return Err(AppError::Validation("耳标ID不能为空".to_string()));
    }

    let key = state.key_builder.latest_key(&cow_id);
    let ttl = Duration::from_secs(state.cache_config.latest_ttl_seconds);

    let pool = state.database.pool().clone();
    let fetch_id = cow_id.clone();
    let reading = state
        .cache_engine
        .get_or_compute(&key, ttl, false, move || async move {
            fetch_latest(&pool, &fetch_id).await
        })
        .await?;

    Ok(Json(reading))
}

/// 按粒度查询聚合数据
///
/// 整页返回时后台预热下一页的缓存条目
#[instrument(skip(state))]
pub async fn get_aggregates(
    State(state): State<AppState>,
    Query(query): Query<AggregatesQuery>,
) -> AppResult<Json<AggregatesResponse>> {
    // 验证失败在任何缓存/限流工作之前拒绝
    let resolution: Resolution = query.resolution.parse()?;

    let pagination = PaginationParams {
        page: query.page.unwrap_or(1),
        size: query.size.unwrap_or(50),
    };
    pagination.validate().map_err(AppError::Validation)?;

    let cow_ids: Option<Vec<String>> = query.cow_ids.as_deref().and_then(|raw| {
        let ids: Vec<String> = raw
            .split(',')
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            None
        } else {
            Some(ids)
        }
    });

    let filter = TimeFilter::resolve(query.start_time, query.end_time, query.hours_back)?;

    let key = state.key_builder.aggregates_key(
        resolution.as_str(),
        cow_ids.as_deref(),
        filter.start,
        filter.end,
        &pagination,
    );
    let ttl = Duration::from_secs(state.cache_config.aggregates_ttl_seconds);

    let pool = state.database.pool().clone();
    let fetch_ids = cow_ids.clone();
    let fetch_filter = filter.clone();
    let fetch_pagination = pagination.clone();
    let rows = state
        .cache_engine
        .get_or_compute(&key, ttl, true, move || async move {
            fetch_aggregates(&pool, resolution, fetch_ids, &fetch_filter, &fetch_pagination).await
        })
        .await?;

    // 整页返回说明可能还有下一页：后台预热，不阻塞响应
    if rows.len() as u32 == pagination.size {
        let next = pagination.next_page();
        let next_key = state.key_builder.aggregates_key(
            resolution.as_str(),
            cow_ids.as_deref(),
            filter.start,
            filter.end,
            &next,
        );
        let pool = state.database.pool().clone();
        let warm_ids = cow_ids.clone();
        let warm_filter = filter.clone();
        state
            .cache_engine
            .warm(next_key, ttl, true, move || async move {
                fetch_aggregates(&pool, resolution, warm_ids, &warm_filter, &next).await
            });
    }

    Ok(Json(AggregatesResponse {
        resolution: resolution.as_str().to_string(),
        page: pagination.page,
        size: pagination.size,
        data: rows,
    }))
}
