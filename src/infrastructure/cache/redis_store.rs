//! Redis存储封装
//!
//! 共享键值存储的客户端：多实例部署时所有实例读写同一份数据，
//! 任何键都可能被其他实例修改。所有往返都带有限定超时，
//! 超时与连接错误一律按普通存储错误上报给调用方

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info};

/// 共享键值存储接口
///
/// 缓存引擎与限流服务面向这个接口工作，便于在不依赖Redis的
/// 测试中替换为内存实现
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 读取键值
    async fn get(&self, key: &str) -> Result<Option<String>, String>;

    /// 写入键值并设置TTL
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), String>;

    /// 删除单个键
    async fn delete(&self, key: &str) -> Result<bool, String>;

    /// 按模式批量删除，零匹配不是错误
    async fn delete_pattern(&self, pattern: &str) -> Result<usize, String>;

    /// 滑动窗口原子计数
    ///
    /// 单个原子单元内执行四步：清除窗口外的时间戳、登记本次请求、
    /// 统计窗口内计数、刷新键TTL。原子性由存储端事务保证，
    /// 返回包含本次请求在内的窗口计数
    async fn sliding_window_count(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        member: &str,
        ttl_secs: u64,
    ) -> Result<u64, String>;

    /// 连通性检查
    async fn ping(&self) -> Result<(), String>;
}

/// Redis存储客户端封装
#[derive(Debug, Clone)]
pub struct RedisStore {
    client: redis::Client,
    key_prefix: String,
    command_timeout: Duration,
}

impl RedisStore {
    /// 创建新的Redis存储实例
    pub fn new(
        redis_url: &str,
        key_prefix: String,
        command_timeout: Duration,
    ) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;

        Ok(Self {
            client,
            key_prefix,
            command_timeout,
        })
    }

    /// 构建完整的存储键
    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// 获取连接（带超时）
    async fn get_connection(&self) -> Result<redis::aio::Connection, String> {
        match tokio::time::timeout(self.command_timeout, self.client.get_async_connection()).await
        {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => {
                error!("Redis连接失败: error={}", e);
                Err(format!("连接失败: {}", e))
            }
            Err(_) => {
                error!("Redis连接超时: timeout={:?}", self.command_timeout);
                Err(format!("连接超时: {:?}", self.command_timeout))
            }
        }
    }

    /// 执行单次命令往返（带超时）
    async fn run<T, F>(&self, op: &str, fut: F) -> Result<T, String>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("Redis {}操作失败: error={}", op, e);
                Err(format!("Redis错误: {}", e))
            }
            Err(_) => {
                error!("Redis {}操作超时: timeout={:?}", op, self.command_timeout);
                Err(format!("命令超时: {:?}", self.command_timeout))
            }
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, String> {
        let full_key = self.build_key(key);
        let mut conn = self.get_connection().await?;

        let value = self
            .run("GET", async {
                redis::cmd("GET")
                    .arg(&full_key)
                    .query_async::<_, Option<String>>(&mut conn)
                    .await
            })
            .await?;

        debug!("Redis GET: key={}, hit={}", key, value.is_some());
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), String> {
        let full_key = self.build_key(key);
        let mut conn = self.get_connection().await?;

        self.run("SETEX", async {
            redis::cmd("SETEX")
                .arg(&full_key)
                .arg(ttl.as_secs())
                .arg(value)
                .query_async::<_, ()>(&mut conn)
                .await
        })
        .await?;

        debug!("Redis SETEX: key={}, ttl={:?}", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, String> {
        let full_key = self.build_key(key);
        let mut conn = self.get_connection().await?;

        let deleted_count = self
            .run("DEL", async {
                redis::cmd("DEL")
                    .arg(&full_key)
                    .query_async::<_, i32>(&mut conn)
                    .await
            })
            .await?;

        debug!("Redis DEL: key={}, deleted={}", key, deleted_count > 0);
        Ok(deleted_count > 0)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize, String> {
        let full_pattern = self.build_key(pattern);
        let mut conn = self.get_connection().await?;

        // 先获取匹配的键
        let keys: Vec<String> = self
            .run("KEYS", async {
                redis::cmd("KEYS")
                    .arg(&full_pattern)
                    .query_async(&mut conn)
                    .await
            })
            .await?;

        if keys.is_empty() {
            debug!("Redis批量删除零匹配: pattern={}", pattern);
            return Ok(0);
        }

        // 批量删除
        let deleted_count = self
            .run("DEL", async {
                redis::cmd("DEL")
                    .arg(&keys)
                    .query_async::<_, i32>(&mut conn)
                    .await
            })
            .await?;

        info!("Redis批量删除: pattern={}, deleted={}", pattern, deleted_count);
        Ok(deleted_count as usize)
    }

    async fn sliding_window_count(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
        member: &str,
        ttl_secs: u64,
    ) -> Result<u64, String> {
        let full_key = self.build_key(key);
        let mut conn = self.get_connection().await?;

        // MULTI/EXEC事务：四步作为单个原子单元执行，
        // 并发请求共享同一个键时不会漏计或重复计数
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("ZREMRANGEBYSCORE")
            .arg(&full_key)
            .arg("-inf")
            .arg(now_ms - window_ms - 1)
            .ignore();
        pipe.cmd("ZADD").arg(&full_key).arg(now_ms).arg(member).ignore();
        pipe.cmd("ZCARD").arg(&full_key);
        pipe.cmd("EXPIRE").arg(&full_key).arg(ttl_secs).ignore();

        let (count,): (u64,) = self
            .run("滑动窗口", async { pipe.query_async(&mut conn).await })
            .await?;

        debug!(
            "Redis滑动窗口计数: key={}, window_ms={}, count={}",
            key, window_ms, count
        );
        Ok(count)
    }

    async fn ping(&self) -> Result<(), String> {
        let mut conn = self.get_connection().await?;
        self.run("PING", async {
            redis::cmd("PING").query_async::<_, ()>(&mut conn).await
        })
        .await?;
        Ok(())
    }
}
