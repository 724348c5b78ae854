//! HTTP请求处理器模块
//!
//! 处理器保持轻薄：验证参数、经由缓存引擎包装时序查询

pub mod admin;
pub mod health;
pub mod sensors;
