//! 速率限制服务
//!
//! 分布式滑动窗口限流：计数存放在共享的Redis中，多实例部署时
//! 原子性由存储端事务保证而不是进程内锁。存储不可用时fail-open：
//! 宁可放行也不让限流基础设施阻断业务请求

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::infrastructure::cache::{CacheKeyBuilder, KeyValueStore};

/// 限流档位：静态配置，启动时定义，按路由/调用方类别选择
#[derive(Debug, Clone)]
pub struct RateLimitTier {
    pub name: String,
    pub max_requests: u32,
    pub window_ms: i64,
}

impl RateLimitTier {
    pub fn new(name: &str, max_requests: u32, window_ms: i64) -> Self {
        Self {
            name: name.to_string(),
            max_requests,
            window_ms,
        }
    }

    /// 内置档位
    pub fn builtin_tiers() -> Vec<Self> {
        vec![
            Self::new("standard", 100, 60_000),
            Self::new("elevated", 500, 60_000),
            Self::new("internal", 2_000, 60_000),
            Self::new("unlimited", 10_000, 60_000),
        ]
    }

    /// 窗口对应的重置秒数（按窗口长度取整，不追踪精确过期时刻）
    pub fn reset_seconds(&self) -> u64 {
        ((self.window_ms + 999) / 1000) as u64
    }
}

/// 限流判定结果
///
/// 每次评估（放行或拒绝）都携带响应头所需的元数据
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_seconds: u64,
    pub retry_after_seconds: u64,
}

/// 速率限制服务
pub struct RateLimitService {
    store: Arc<dyn KeyValueStore>,
    // 档位名 -> 不可变档位配置，惰性注册、之后只读
    tiers: Arc<RwLock<HashMap<String, Arc<RateLimitTier>>>>,
    key_builder: CacheKeyBuilder,
    default_tier: String,
}

impl RateLimitService {
    /// 创建新的速率限制服务（带内置档位）
    pub fn new(store: Arc<dyn KeyValueStore>, default_tier: &str) -> Self {
        let mut tiers = HashMap::new();
        for tier in RateLimitTier::builtin_tiers() {
            tiers.insert(tier.name.clone(), Arc::new(tier));
        }

        Self {
            store,
            tiers: Arc::new(RwLock::new(tiers)),
            key_builder: CacheKeyBuilder::new(),
            default_tier: default_tier.to_string(),
        }
    }

    /// 注册自定义档位
    pub async fn register_tier(&self, tier: RateLimitTier) {
        let mut tiers = self.tiers.write().await;
        tiers.insert(tier.name.clone(), Arc::new(tier));
    }

    /// 解析档位配置，未知档位回退到默认档位
    async fn resolve_tier(&self, name: &str) -> Arc<RateLimitTier> {
        let tiers = self.tiers.read().await;
        if let Some(tier) = tiers.get(name) {
            return tier.clone();
        }
        if let Some(tier) = tiers.get(&self.default_tier) {
            return tier.clone();
        }
        // 内置档位在构造时注册，standard一定存在
        tiers
            .get("standard")
            .cloned()
            .unwrap_or_else(|| Arc::new(RateLimitTier::new("standard", 100, 60_000)))
    }

    /// 默认档位名
    pub fn default_tier(&self) -> &str {
        &self.default_tier
    }

    /// 检查并登记一次请求
    ///
    /// endpoint是逻辑路由模板（不含内插的ID），principal是调用方标识；
    /// 同一 档位×端点×主体 组合共享一个窗口计数器
    pub async fn check_rate_limit(
        &self,
        tier_name: &str,
        endpoint: &str,
        principal: &str,
    ) -> RateLimitDecision {
        let tier = self.resolve_tier(tier_name).await;
        let key = self
            .key_builder
            .rate_limit_key(&tier.name, endpoint, principal);

        let now_ms = Utc::now().timestamp_millis();
        // 成员必须全局唯一：同一毫秒到达的并发请求都要被计入
        let member = format!("{}-{}", now_ms, Uuid::new_v4());
        let reset_seconds = tier.reset_seconds();

        match self
            .store
            .sliding_window_count(&key, now_ms, tier.window_ms, &member, reset_seconds)
            .await
        {
            Ok(count) => {
                let allowed = count <= tier.max_requests as u64;
                let remaining = (tier.max_requests as u64).saturating_sub(count) as u32;

                if allowed {
                    debug!(
                        "限流检查通过: endpoint={}, principal={}, {}/{}",
                        endpoint, principal, count, tier.max_requests
                    );
                } else {
                    warn!(
                        "请求被限流: endpoint={}, principal={}, {}/{}",
                        endpoint, principal, count, tier.max_requests
                    );
                }

                RateLimitDecision {
                    allowed,
                    limit: tier.max_requests,
                    remaining,
                    reset_seconds,
                    retry_after_seconds: if allowed { 0 } else { reset_seconds },
                }
            }
            Err(e) => {
                // fail-open：限流存储故障绝不阻断业务请求
                warn!(
                    "限流存储不可用，放行请求: endpoint={}, principal={}, error={}",
                    endpoint, principal, e
                );
                RateLimitDecision {
                    allowed: true,
                    limit: tier.max_requests,
                    remaining: tier.max_requests,
                    reset_seconds,
                    retry_after_seconds: 0,
                }
            }
        }
    }
}

/// 全局速率限制服务实例
pub type SharedRateLimitService = Arc<RateLimitService>;

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;

    /// 内存滑动窗口存储替身：语义与Redis事务版本一致
    #[derive(Default)]
    struct WindowStore {
        windows: Mutex<HashMap<String, Vec<(i64, String)>>>,
    }

    #[async_trait]
    impl KeyValueStore for WindowStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, String> {
            Ok(None)
        }

        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), String> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> Result<bool, String> {
            Ok(false)
        }

        async fn delete_pattern(&self, _pattern: &str) -> Result<usize, String> {
            Ok(0)
        }

        async fn sliding_window_count(
            &self,
            key: &str,
            now_ms: i64,
            window_ms: i64,
            member: &str,
            _ttl_secs: u64,
        ) -> Result<u64, String> {
            let mut windows = self.windows.lock().await;
            let entries = windows.entry(key.to_string()).or_default();
            // 清除窗口外的时间戳
            entries.retain(|(ts, _)| *ts >= now_ms - window_ms);
            entries.push((now_ms, member.to_string()));
            Ok(entries.len() as u64)
        }

        async fn ping(&self) -> Result<(), String> {
            Ok(())
        }
    }

    /// 不可达的存储替身
    struct DownStore;

    #[async_trait]
    impl KeyValueStore for DownStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, String> {
            Err("连接失败".to_string())
        }

        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), String> {
            Err("连接失败".to_string())
        }

        async fn delete(&self, _key: &str) -> Result<bool, String> {
            Err("连接失败".to_string())
        }

        async fn delete_pattern(&self, _pattern: &str) -> Result<usize, String> {
            Err("连接失败".to_string())
        }

        async fn sliding_window_count(
            &self,
            _key: &str,
            _now_ms: i64,
            _window_ms: i64,
            _member: &str,
            _ttl_secs: u64,
        ) -> Result<u64, String> {
            Err("连接失败".to_string())
        }

        async fn ping(&self) -> Result<(), String> {
            Err("连接失败".to_string())
        }
    }

    fn service(store: Arc<dyn KeyValueStore>) -> RateLimitService {
        RateLimitService::new(store, "standard")
    }

    #[tokio::test]
    async fn test_window_boundary_denies_excess_request() {
        let svc = service(Arc::new(WindowStore::default()));
        let endpoint = "/api/sensors/{cow_id}/latest";

        // 100次请求全部放行，remaining从99严格递减到0
        for i in 0..100u32 {
            let decision = svc.check_rate_limit("standard", endpoint, "p1").await;
            assert!(decision.allowed, "request {} should be admitted", i + 1);
            assert_eq!(decision.limit, 100);
            assert_eq!(decision.remaining, 99 - i);
            assert_eq!(decision.retry_after_seconds, 0);
        }

        // 同窗口内第101次被拒绝，携带重试提示
        let decision = svc.check_rate_limit("standard", endpoint, "p1").await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reset_seconds, 60);
        assert_eq!(decision.retry_after_seconds, 60);
    }

    #[tokio::test]
    async fn test_fail_open_when_store_unreachable() {
        let svc = service(Arc::new(DownStore));

        // 存储不可达时始终放行
        for _ in 0..5 {
            let decision = svc
                .check_rate_limit("standard", "/api/sensors/aggregates", "p1")
                .await;
            assert!(decision.allowed);
            assert_eq!(decision.remaining, 100);
        }
    }

    #[tokio::test]
    async fn test_distinct_principals_and_endpoints_count_separately() {
        let store = Arc::new(WindowStore::default());
        let svc = service(store.clone());

        svc.register_tier(RateLimitTier::new("tiny", 1, 60_000)).await;

        assert!(svc.check_rate_limit("tiny", "/a", "p1").await.allowed);
        assert!(!svc.check_rate_limit("tiny", "/a", "p1").await.allowed);

        // 其他主体与其他端点不受影响
        assert!(svc.check_rate_limit("tiny", "/a", "p2").await.allowed);
        assert!(svc.check_rate_limit("tiny", "/b", "p1").await.allowed);
    }

    #[tokio::test]
    async fn test_unknown_tier_falls_back_to_default() {
        let svc = service(Arc::new(WindowStore::default()));

        let decision = svc.check_rate_limit("nonexistent", "/a", "p1").await;
        assert!(decision.allowed);
        assert_eq!(decision.limit, 100);
    }

    #[tokio::test]
    async fn test_builtin_tier_limits() {
        let svc = service(Arc::new(WindowStore::default()));

        assert_eq!(svc.check_rate_limit("standard", "/a", "p").await.limit, 100);
        assert_eq!(svc.check_rate_limit("elevated", "/a", "p").await.limit, 500);
        assert_eq!(svc.check_rate_limit("internal", "/a", "p").await.limit, 2_000);
        assert_eq!(
            svc.check_rate_limit("unlimited", "/a", "p").await.limit,
            10_000
        );
    }

    #[tokio::test]
    async fn test_expired_entries_purged_from_window() {
        let store = WindowStore::default();
        let now = 1_000_000i64;

        // 直接驱动窗口语义：窗口外的时间戳在计数前被清除
        for i in 0..3 {
            let count = store
                .sliding_window_count("k", now + i, 60_000, &format!("m{}", i), 60)
                .await
                .unwrap();
            assert_eq!(count, (i + 1) as u64);
        }

        // 60秒后旧条目全部过期，计数从零重新开始累计
        let count = store
            .sliding_window_count("k", now + 61_000, 60_000, "m-late", 60)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }
}
