//! 健康检查处理器
//!
//! 同步上报缓存命中统计、熔断器状态与依赖连通性

use axum::{extract::State, response::Json};
use serde::Serialize;
use tracing::{info, instrument};

use crate::infrastructure::cache::{CacheStats, CircuitBreakerStatus};
use crate::presentation::routes::AppState;
use crate::shared::AppResult;

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub database_ok: bool,
    pub cache_store_ok: bool,
    pub cache: CacheReport,
}

/// 缓存健康报告
#[derive(Debug, Serialize)]
pub struct CacheReport {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
    pub circuit_breaker: CircuitBreakerStatus,
}

/// 健康检查
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    info!("健康检查请求");

    let database_ok = state.database.check_connection().await.is_ok();
    let cache_store_ok = state.cache_engine.store_ping().await.is_ok();
    let stats = state.cache_engine.stats().await;
    let circuit_breaker = state.cache_engine.breaker_status().await;

    // 缓存层故障只降级不致命，数据库是权威数据源
    let status = if database_ok {
        if cache_store_ok { "ok" } else { "degraded" }
    } else {
        "unhealthy"
    };

    let hit_rate = stats.hit_rate();
    Ok(Json(HealthResponse {
        status: status.to_string(),
        service: "livestock-telemetry-rust".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        database_ok,
        cache_store_ok,
        cache: CacheReport {
            stats,
            hit_rate,
            circuit_breaker,
        },
    }))
}
