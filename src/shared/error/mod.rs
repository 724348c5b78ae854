//! 统一错误处理模块
//!
//! 定义系统中所有错误类型，提供统一的错误处理机制

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// 应用程序统一错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 数据库相关错误（权威数据源失败，原样传播）
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    /// 验证错误
    #[error("验证错误: {0}")]
    Validation(String),

    /// 缓存层错误（仅在运维接口上可见，请求路径上总是降级）
    #[error("缓存错误: {0}")]
    Cache(String),

    /// 请求被限流
    #[error("请求超出限额{limit}，请在{retry_after_seconds}秒后重试")]
    RateLimited {
        limit: u32,
        retry_after_seconds: u64,
    },

    /// 配置错误
    #[error("配置错误: {0}")]
    Configuration(String),

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),

    /// 资源未找到错误
    #[error("资源未找到: {0}")]
    NotFound(String),
}

impl AppError {
    /// 获取HTTP状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    /// 获取错误代码
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::Configuration(_) => "CONFIG_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_code = self.error_code();

        tracing::error!(
            status = ?status_code,
            error_code = error_code,
            error = %self,
            "处理请求时发生错误"
        );

        let retry_after = match &self {
            AppError::RateLimited {
                retry_after_seconds,
                ..
            } => Some(*retry_after_seconds),
            _ => None,
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        let mut response = (status_code, body).into_response();
        if let Some(seconds) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 验证错误构造宏
#[macro_export]
macro_rules! validation_error {
    ($msg:expr) => {
        $crate::shared::error::AppError::Validation($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::shared::error::AppError::Validation(format!($fmt, $($arg)*))
    };
}

/// 内部错误构造宏
#[macro_export]
macro_rules! internal_error {
    ($msg:expr) => {
        $crate::shared::error::AppError::Internal($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::shared::error::AppError::Internal(format!($fmt, $($arg)*))
    };
}
