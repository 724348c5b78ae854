//! 业务服务模块

pub mod rate_limit_service;

pub use rate_limit_service::{
    RateLimitDecision, RateLimitService, RateLimitTier, SharedRateLimitService,
};
