use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub redis_url: String,
    pub redis_prefix: String,
    pub aggregates_ttl_seconds: u64,
    pub latest_ttl_seconds: u64,
    /// 单次Redis命令往返的超时（毫秒），超时按普通存储错误处理
    pub command_timeout_ms: u64,
    pub breaker_max_failures: u32,
    pub breaker_reset_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// 默认限流档位名称（standard/elevated/internal/unlimited）
    pub default_tier: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        // 从环境变量加载配置
        dotenv::dotenv().ok();

        let config = Config {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/livestock_telemetry".to_string()),

            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },

            database: DatabaseConfig {
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .unwrap_or(20),
                min_connections: env::var("DB_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
                acquire_timeout_seconds: env::var("DB_ACQUIRE_TIMEOUT")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(30),
                idle_timeout_seconds: env::var("DB_IDLE_TIMEOUT")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .unwrap_or(600),
            },

            cache: CacheConfig::load_default(),

            rate_limit: RateLimitConfig {
                default_tier: env::var("RATE_LIMIT_TIER")
                    .unwrap_or_else(|_| "standard".to_string()),
            },
        };

        Ok(config)
    }
}

impl CacheConfig {
    /// 加载默认的缓存配置（从环境变量）
    pub fn load_default() -> Self {
        Self {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            redis_prefix: env::var("CACHE_PREFIX")
                .unwrap_or_else(|_| "livestock:".to_string()),
            aggregates_ttl_seconds: env::var("CACHE_AGGREGATES_TTL")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            latest_ttl_seconds: env::var("CACHE_LATEST_TTL")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            command_timeout_ms: env::var("REDIS_COMMAND_TIMEOUT_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .unwrap_or(2000),
            breaker_max_failures: env::var("CACHE_BREAKER_MAX_FAILURES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            breaker_reset_timeout_seconds: env::var("CACHE_BREAKER_RESET_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        }
    }
}
