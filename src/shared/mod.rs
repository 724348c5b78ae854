//! 共享模块
//!
//! 包含跨层共享的类型、错误处理等

pub mod error;
pub mod types;

// 重新导出常用类型
pub use error::{AppError, AppResult};
pub use types::{CowId, PaginationParams};
