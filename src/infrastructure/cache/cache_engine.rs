//! 缓存旁路引擎
//!
//! get-or-compute语义：先查缓存，未命中则调用方提供的fetcher
//! 查询权威数据源并回填。缓存层的任何故障都不会变成调用方
//! 可见的错误——熔断器打开时整体旁路，读写异常时降级为直查。
//! 唯一向上传播的失败是fetcher本身的失败（权威数据源故障）

use std::future::Future;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::shared::{AppError, AppResult};

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerStatus};
use super::redis_store::KeyValueStore;
use super::CacheStats;

/// 压缩载荷的标记前缀，保持Redis值始终是字符串
const COMPRESSED_PREFIX: &str = "gz:";

/// 缓存旁路引擎
///
/// 熔断器与统计计数都是进程本地状态，由引擎实例独占持有，
/// 通过克隆（内部Arc共享）传递给各请求任务
#[derive(Clone)]
pub struct CacheEngine {
    store: Arc<dyn KeyValueStore>,
    breaker: Arc<RwLock<CircuitBreaker>>,
    stats: Arc<RwLock<CacheStats>>,
}

impl CacheEngine {
    pub fn new(store: Arc<dyn KeyValueStore>, breaker: CircuitBreaker) -> Self {
        Self {
            store,
            breaker: Arc::new(RwLock::new(breaker)),
            stats: Arc::new(RwLock::new(CacheStats::default())),
        }
    }

    /// 查缓存，未命中则计算并回填
    ///
    /// - 熔断器打开：完全跳过缓存存储，直接调用fetcher
    /// - 命中：反序列化（必要时先解压）后返回
    /// - 未命中：调用fetcher，非阻塞回填（写失败只记日志和熔断计数）
    /// - 读写异常：计入错误并降级为直查，调用方不感知缓存故障
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compress: bool,
        fetcher: F,
    ) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        {
            let mut stats = self.stats.write().await;
            stats.total_requests += 1;
        }

        if self.breaker.write().await.is_open() {
            debug!("熔断器打开，旁路缓存直查数据源: key={}", key);
            return fetcher().await;
        }

        match self.store.get(key).await {
            Ok(Some(raw)) => match decode_payload::<T>(&raw) {
                Ok(value) => {
                    {
                        let mut stats = self.stats.write().await;
                        stats.hits += 1;
                    }
                    self.breaker.write().await.record_success();
                    debug!("缓存命中: key={}", key);
                    Ok(value)
                }
                Err(e) => {
                    self.record_error().await;
                    warn!("缓存载荷解码失败，降级直查: key={}, error={}", key, e);
                    fetcher().await
                }
            },
            Ok(None) => {
                {
                    let mut stats = self.stats.write().await;
                    stats.misses += 1;
                }
                debug!("缓存未命中: key={}", key);

                let value = fetcher().await?;

                // 非阻塞回填：写失败绝不影响本次调用的结果
                match encode_payload(&value, compress) {
                    Ok(raw) => {
                        if let Err(e) = self.store.set_ex(key, &raw, ttl).await {
                            self.record_error().await;
                            warn!("缓存写入失败: key={}, error={}", key, e);
                        } else {
                            self.breaker.write().await.record_success();
                        }
                    }
                    Err(e) => {
                        warn!("缓存序列化失败，跳过回填: key={}, error={}", key, e);
                    }
                }

                Ok(value)
            }
            Err(e) => {
                self.record_error().await;
                warn!("缓存读取失败，降级直查: key={}, error={}", key, e);
                fetcher().await
            }
        }
    }

    /// 后台缓存预热（fire-and-forget）
    ///
    /// 脱离触发请求的生命周期执行，失败只记日志，
    /// 不汇入响应路径也不影响统计计数
    pub fn warm<T, F, Fut>(&self, key: String, ttl: Duration, compress: bool, fetcher: F)
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let engine = self.clone();
        tokio::spawn(async move {
            if engine.breaker.write().await.is_open() {
                return;
            }

            // 已有缓存则不必预热
            match engine.store.get(&key).await {
                Ok(Some(_)) => return,
                Ok(None) => {}
                Err(e) => {
                    debug!("缓存预热读取失败，放弃: key={}, error={}", key, e);
                    return;
                }
            }

            match fetcher().await {
                Ok(value) => match encode_payload(&value, compress) {
                    Ok(raw) => {
                        if let Err(e) = engine.store.set_ex(&key, &raw, ttl).await {
                            warn!("缓存预热写入失败: key={}, error={}", key, e);
                        } else {
                            debug!("缓存预热完成: key={}", key);
                        }
                    }
                    Err(e) => warn!("缓存预热序列化失败: key={}, error={}", key, e),
                },
                Err(e) => debug!("缓存预热查询失败: key={}, error={}", key, e),
            }
        });
    }

    /// 按前缀模式失效缓存，返回删除条数（零匹配是no-op）
    pub async fn invalidate(&self, pattern: &str) -> AppResult<usize> {
        self.store
            .delete_pattern(pattern)
            .await
            .map_err(AppError::Cache)
    }

    /// 缓存统计快照
    pub async fn stats(&self) -> CacheStats {
        self.stats.read().await.clone()
    }

    /// 重置统计计数（仅限运维操作）
    pub async fn reset_stats(&self) {
        let mut stats = self.stats.write().await;
        *stats = CacheStats::default();
    }

    /// 熔断器状态快照
    pub async fn breaker_status(&self) -> CircuitBreakerStatus {
        self.breaker.write().await.status()
    }

    /// 存储连通性检查（用于健康上报）
    pub async fn store_ping(&self) -> Result<(), String> {
        self.store.ping().await
    }

    async fn record_error(&self) {
        {
            let mut stats = self.stats.write().await;
            stats.errors += 1;
        }
        self.breaker.write().await.record_failure();
    }
}

/// 序列化并按需压缩缓存载荷
///
/// 压缩只作用于序列化后的字节流：gzip后base64包装，
/// 带`gz:`前缀标记，保证往返无损
pub fn encode_payload<T: Serialize>(value: &T, compress: bool) -> Result<String, String> {
    let json = serde_json::to_string(value).map_err(|e| format!("序列化失败: {}", e))?;

    if !compress {
        return Ok(json);
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(json.as_bytes())
        .map_err(|e| format!("压缩失败: {}", e))?;
    let compressed = encoder.finish().map_err(|e| format!("压缩失败: {}", e))?;

    Ok(format!(
        "{}{}",
        COMPRESSED_PREFIX,
        general_purpose::STANDARD.encode(compressed)
    ))
}

/// 解码缓存载荷（按前缀标记自动识别压缩）
pub fn decode_payload<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    if let Some(encoded) = raw.strip_prefix(COMPRESSED_PREFIX) {
        let compressed = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| format!("base64解码失败: {}", e))?;
        let mut decoder = GzDecoder::new(&compressed[..]);
        let mut json = String::new();
        decoder
            .read_to_string(&mut json)
            .map_err(|e| format!("解压失败: {}", e))?;
        serde_json::from_str(&json).map_err(|e| format!("反序列化失败: {}", e))
    } else {
        serde_json::from_str(raw).map_err(|e| format!("反序列化失败: {}", e))
    }
}
