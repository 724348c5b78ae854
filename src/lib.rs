//! 牧场传感器遥测服务
//!
//! 纯Rust实现的牲畜传感器遥测API，基于三层架构设计：
//! 缓存旁路引擎 + 熔断器 + 分布式滑动窗口限流，保护时序查询层

#![allow(async_fn_in_trait)]

// 核心模块
pub mod shared;          // 共享模块（错误处理、类型定义）
pub mod infrastructure;  // 基础设施层（数据库、配置、缓存、时序查询）
pub mod business;        // 业务逻辑层（限流服务）
pub mod presentation;    // 表示层（HTTP处理、路由、中间件）

// 重新导出核心类型
pub use infrastructure::{Config, Database};
pub use shared::{AppError, AppResult};
pub use presentation::routes::create_routes;
