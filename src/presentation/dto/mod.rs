//! 请求/响应DTO模块

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::infrastructure::timeseries::SensorAggRow;

/// 聚合查询参数
#[derive(Debug, Deserialize)]
pub struct AggregatesQuery {
    /// 时间粒度：5m/15m/1h/1d
    pub resolution: String,
    /// 逗号分隔的耳标ID列表，缺省表示全部
    pub cow_ids: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// 相对时间过滤：以数据集基准时间回推的小时数
    pub hours_back: Option<i64>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

/// 聚合查询响应
#[derive(Debug, Serialize)]
pub struct AggregatesResponse {
    pub resolution: String,
    pub page: u32,
    pub size: u32,
    pub data: Vec<SensorAggRow>,
}

/// 缓存失效请求
#[derive(Debug, Deserialize)]
pub struct InvalidatePatternRequest {
    /// 键前缀模式，如 "agg:1h:*"
    pub pattern: String,
}

/// 缓存失效响应
#[derive(Debug, Serialize)]
pub struct InvalidateResponse {
    pub deleted: usize,
}
