//! 数据库连接模块
//!
//! 管理TimescaleDB(PostgreSQL)连接池，时序查询见 `infrastructure::timeseries`

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::infrastructure::config::Config;

/// 数据库管理器 - 包装sqlx连接池
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 使用配置创建数据库实例
    pub async fn new(config: &Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .min_connections(config.database.min_connections)
            .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.database.idle_timeout_seconds))
            .connect(&config.database_url)
            .await?;

        info!("数据库连接池创建成功: max={}", config.database.max_connections);

        Ok(Database { pool })
    }

    /// 获取数据库连接池
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 检查数据库连通性
    pub async fn check_connection(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
