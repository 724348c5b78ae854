//! 缓存基础设施模块
//!
//! 请求屏蔽层的核心：
//! - 缓存键构建器：语义参数到确定性键
//! - 熔断器：隔离Redis故障，避免逐请求的慢失败
//! - Redis存储封装：带超时的共享键值存储客户端
//! - 缓存旁路引擎：get-or-compute + TTL + 压缩 + 预热 + 失效

use serde::{Deserialize, Serialize};

pub mod cache_engine;
pub mod circuit_breaker;
pub mod key_builder;
pub mod redis_store;

// 重新导出主要类型
pub use cache_engine::CacheEngine;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerStatus};
pub use key_builder::CacheKeyBuilder;
pub use redis_store::{KeyValueStore, RedisStore};

/// 缓存指标统计
///
/// 进程生命周期内的计数器，只能由运维接口显式重置
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub total_requests: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.hits as f64 / self.total_requests as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            errors: 0,
            total_requests: 4,
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);

        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
