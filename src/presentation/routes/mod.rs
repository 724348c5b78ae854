//! 路由配置模块
//!
//! 组织和配置所有HTTP路由

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::business::services::SharedRateLimitService;
use crate::infrastructure::cache::{CacheEngine, CacheKeyBuilder};
use crate::infrastructure::config::CacheConfig;
use crate::infrastructure::Database;
use crate::presentation::handlers;
use crate::presentation::middleware::rate_limit_middleware;

/// 应用共享状态
///
/// 熔断器与统计等进程本地状态封装在各服务实例内部，
/// 经由此结构克隆（内部Arc共享）传递给所有请求任务
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub cache_engine: CacheEngine,
    pub rate_limit_service: SharedRateLimitService,
    pub key_builder: CacheKeyBuilder,
    pub cache_config: CacheConfig,
}

/// 创建应用路由
pub async fn create_routes(state: AppState) -> anyhow::Result<Router> {
    // 遥测查询路由：先过限流准入
    let sensor_routes = Router::new()
        .route(
            "/api/sensors/:cow_id/latest",
            get(handlers::sensors::get_latest_reading),
        )
        .route(
            "/api/sensors/aggregates",
            get(handlers::sensors::get_aggregates),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    // 运维路由
    let admin_routes = Router::new()
        .route(
            "/api/admin/cache/invalidate",
            post(handlers::admin::invalidate_cache),
        )
        .route(
            "/api/admin/cache/stats/reset",
            post(handlers::admin::reset_cache_stats),
        );

    // 公开路由
    let public_routes = Router::new().route("/health", get(handlers::health::health_check));

    let app = Router::new()
        .merge(public_routes)
        .merge(sensor_routes)
        .merge(admin_routes)
        .with_state(state)
        // 全局中间件
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    Ok(app)
}
