//! 熔断器
//!
//! 进程内的缓存后端健康跟踪：连续失败达到阈值后打开，
//! 打开期间所有缓存操作直接旁路；冷却时间过后自动闭合并清零计数。
//! 状态是进程本地的，不跨实例共享，每个实例独立探测和恢复

use std::time::{Duration, Instant};

use serde::Serialize;

/// 熔断器状态快照（用于健康检查上报）
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStatus {
    pub is_open: bool,
    pub failure_count: u32,
}

/// 缓存后端熔断器
///
/// 只有两个状态：闭合（正常通过）和打开（旁路缓存）。
/// 离开打开状态的唯一路径是时间冷却，不做半开试探
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_count: u32,
    last_failure_at: Option<Instant>,
    max_failures: u32,
    reset_timeout: Duration,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}

impl CircuitBreaker {
    pub fn new(max_failures: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_count: 0,
            last_failure_at: None,
            max_failures,
            reset_timeout,
        }
    }

    /// 当前是否应旁路缓存
    ///
    /// 冷却判断在回答之前执行：距最后一次失败超过reset_timeout
    /// 则先闭合并清零计数
    pub fn is_open(&mut self) -> bool {
        if let Some(last_failure) = self.last_failure_at {
            if last_failure.elapsed() > self.reset_timeout {
                tracing::info!(
                    "熔断器冷却完成，恢复闭合: failures={}",
                    self.failure_count
                );
                self.failure_count = 0;
                self.last_failure_at = None;
            }
        }
        self.failure_count >= self.max_failures
    }

    /// 记录一次缓存操作失败
    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_failure_at = Some(Instant::now());
        if self.failure_count == self.max_failures {
            tracing::warn!(
                "熔断器打开: failures={}, reset_timeout={:?}",
                self.failure_count,
                self.reset_timeout
            );
        }
    }

    /// 记录一次缓存操作成功
    ///
    /// 闭合状态下清零失败计数；打开状态不受影响（时间冷却是唯一出口）
    pub fn record_success(&mut self) {
        if self.failure_count < self.max_failures {
            self.failure_count = 0;
        }
    }

    /// 状态快照
    pub fn status(&mut self) -> CircuitBreakerStatus {
        CircuitBreakerStatus {
            is_open: self.is_open(),
            failure_count: self.failure_count,
        }
    }
}
