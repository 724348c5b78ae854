//! 牧场传感器遥测服务主入口

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livestock_telemetry_rust::business::services::RateLimitService;
use livestock_telemetry_rust::infrastructure::cache::{
    CacheEngine, CacheKeyBuilder, CircuitBreaker, KeyValueStore, RedisStore,
};
use livestock_telemetry_rust::presentation::routes::AppState;
use livestock_telemetry_rust::{create_routes, Config, Database};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志 - 默认INFO等级，便于生产环境使用
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livestock_telemetry_rust=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载环境变量
    dotenv::dotenv().ok();

    info!("🚀 启动牧场传感器遥测服务");

    // 加载配置
    let config = Config::load()?;
    info!("✅ 配置加载成功");

    // 初始化数据库连接
    let database = Database::new(&config).await?;
    info!("✅ 数据库连接成功");

    // 初始化Redis存储（连接失败不致命：缓存降级直查，限流fail-open）
    let redis_store = RedisStore::new(
        &config.cache.redis_url,
        config.cache.redis_prefix.clone(),
        Duration::from_millis(config.cache.command_timeout_ms),
    )?;
    if let Err(e) = redis_store.ping().await {
        warn!("⚠️ Redis连接测试失败，缓存与限流将降级运行: {}", e);
    } else {
        info!("✅ Redis连接成功: {}", config.cache.redis_url);
    }
    let store: Arc<dyn KeyValueStore> = Arc::new(redis_store);

    // 初始化缓存旁路引擎
    let breaker = CircuitBreaker::new(
        config.cache.breaker_max_failures,
        Duration::from_secs(config.cache.breaker_reset_timeout_seconds),
    );
    let cache_engine = CacheEngine::new(store.clone(), breaker);
    info!("✅ 缓存引擎初始化成功");

    // 初始化速率限制服务
    let rate_limit_service = Arc::new(RateLimitService::new(
        store.clone(),
        &config.rate_limit.default_tier,
    ));
    info!(
        "✅ 速率限制服务初始化成功: 默认档位={}",
        config.rate_limit.default_tier
    );

    // 创建路由
    let state = AppState {
        database,
        cache_engine,
        rate_limit_service,
        key_builder: CacheKeyBuilder::new(),
        cache_config: config.cache.clone(),
    };
    let app = create_routes(state).await?;
    info!("✅ 路由创建成功");

    // 启动服务器
    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        config.server.host, config.server.port
    ))
    .await?;

    info!("🌐 服务器启动成功，监听端口: {}", config.server.port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
