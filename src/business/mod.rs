//! 业务逻辑层模块

pub mod services;
