//! 限流中间件
//!
//! 每个请求先经过准入判定；放行与拒绝都会在响应上
//! 附带限流元数据头，拒绝时额外给出重试提示

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::business::services::RateLimitDecision;
use crate::presentation::routes::AppState;
use crate::shared::AppError;

/// 限流准入中间件
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    // 端点用路由模板而不是内插后的路径：
    // /api/sensors/C001/latest 与 /api/sensors/C002/latest 共享计数器
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    // 主体优先取上游认证层传递的调用方标识，否则回退到连接地址
    let principal = request
        .headers()
        .get("x-api-client")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| addr.ip().to_string());

    let tier = state.rate_limit_service.default_tier().to_string();
    let decision = state
        .rate_limit_service
        .check_rate_limit(&tier, &endpoint, &principal)
        .await;

    if !decision.allowed {
        let mut response = AppError::RateLimited {
            limit: decision.limit,
            retry_after_seconds: decision.retry_after_seconds,
        }
        .into_response();
        apply_rate_limit_headers(response.headers_mut(), &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// 在响应上附加限流元数据头
fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    let entries = [
        (
            HeaderName::from_static("x-ratelimit-limit"),
            decision.limit.to_string(),
        ),
        (
            HeaderName::from_static("x-ratelimit-remaining"),
            decision.remaining.to_string(),
        ),
        (
            HeaderName::from_static("x-ratelimit-reset"),
            decision.reset_seconds.to_string(),
        ),
    ];
    for (name, value) in entries {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}
