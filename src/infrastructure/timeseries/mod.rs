//! 时序查询模块
//!
//! 聚合分发器：把请求的时间粒度映射到对应的连续聚合视图，
//! 并构造有界的时间过滤条件；查询结果按时间倒序返回

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::debug;

use crate::shared::types::PaginationParams;
use crate::shared::{AppError, AppResult, CowId};

/// 数据集基准时间戳（Unix秒）
///
/// 相对时间过滤（hours_back）以此为基准，而不是每次请求都扫描
/// 原始表的最大时间戳。数据集为静态历史数据时这是一个纯粹的
/// 性能优化；如果接入持续写入的数据源，此常量必须随数据范围更新，
/// 否则过滤窗口会静默偏移。
const DATASET_REFERENCE_UNIX: i64 = 1_719_791_700; // 2024-06-30T23:55:00Z

/// 数据集基准时间戳
pub fn dataset_reference_ts() -> DateTime<Utc> {
    Utc.timestamp_opt(DATASET_REFERENCE_UNIX, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// 支持的时间粒度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    FiveMinute,
    FifteenMinute,
    Hourly,
    Daily,
}

impl Resolution {
    /// 粒度对应的连续聚合视图名
    pub fn view_name(&self) -> &'static str {
        match self {
            Resolution::FiveMinute => "sensor_agg_5m",
            Resolution::FifteenMinute => "sensor_agg_15m",
            Resolution::Hourly => "sensor_agg_1h",
            Resolution::Daily => "sensor_agg_1d",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::FiveMinute => "5m",
            Resolution::FifteenMinute => "15m",
            Resolution::Hourly => "1h",
            Resolution::Daily => "1d",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "5m" => Ok(Resolution::FiveMinute),
            "15m" => Ok(Resolution::FifteenMinute),
            "1h" => Ok(Resolution::Hourly),
            "1d" => Ok(Resolution::Daily),
            other => Err(AppError::Validation(format!(
                "不支持的时间粒度: {}，可用值: 5m/15m/1h/1d",
                other
            ))),
        }
    }
}

/// 有界时间过滤条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeFilter {
    pub start: DateTime<Utc>,
    /// 缺省表示无上界
    pub end: Option<DateTime<Utc>>,
}

impl TimeFilter {
    /// 解析调用方的时间参数
    ///
    /// 显式的start/end优先；只给hours_back时以数据集基准时间回推；
    /// 什么都不给时默认基准时间前24小时
    pub fn resolve(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        hours_back: Option<i64>,
    ) -> AppResult<Self> {
        if let Some(hours) = hours_back {
            if !(1..=24 * 365).contains(&hours) {
                return Err(AppError::Validation(format!(
                    "hours_back必须在1-{}之间: {}",
                    24 * 365,
                    hours
                )));
            }
        }

        if let Some(start) = start {
            if let Some(end) = end {
                if end < start {
                    return Err(AppError::Validation(
                        "end_time不能早于start_time".to_string(),
                    ));
                }
            }
            return Ok(Self { start, end });
        }

        let hours = hours_back.unwrap_or(24);
        Ok(Self {
            start: dataset_reference_ts() - Duration::hours(hours),
            end: None,
        })
    }
}

/// 聚合查询结果行：每个时间桶内各指标的avg/min/max与样本数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SensorAggRow {
    pub bucket: DateTime<Utc>,
    pub cow_id: CowId,
    pub avg_temperature: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    pub avg_heart_rate: f64,
    pub min_heart_rate: f64,
    pub max_heart_rate: f64,
    pub avg_activity: f64,
    pub min_activity: f64,
    pub max_activity: f64,
    pub sample_count: i64,
}

/// 单条原始传感器读数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SensorReading {
    pub cow_id: CowId,
    pub ts: DateTime<Utc>,
    pub temperature: f64,
    pub heart_rate: f64,
    pub activity: f64,
}

/// 按粒度查询聚合数据（时间倒序、行数有界）
pub async fn fetch_aggregates(
    pool: &PgPool,
    resolution: Resolution,
    cow_ids: Option<Vec<CowId>>,
    filter: &TimeFilter,
    pagination: &PaginationParams,
) -> AppResult<Vec<SensorAggRow>> {
    // 视图名来自枚举映射，不含用户输入
    let sql = format!(
        "SELECT bucket, cow_id, \
                avg_temperature, min_temperature, max_temperature, \
                avg_heart_rate, min_heart_rate, max_heart_rate, \
                avg_activity, min_activity, max_activity, \
                sample_count \
         FROM {} \
         WHERE ($1::text[] IS NULL OR cow_id = ANY($1)) \
           AND bucket >= $2 \
           AND ($3::timestamptz IS NULL OR bucket <= $3) \
         ORDER BY bucket DESC, cow_id \
         LIMIT $4 OFFSET $5",
        resolution.view_name()
    );

    debug!(
        "聚合查询: view={}, start={}, end={:?}, page={}, size={}",
        resolution.view_name(),
        filter.start,
        filter.end,
        pagination.page,
        pagination.size
    );

    let rows = sqlx::query_as::<_, SensorAggRow>(&sql)
        .bind(cow_ids)
        .bind(filter.start)
        .bind(filter.end)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// 查询单头牲畜的最新读数
pub async fn fetch_latest(pool: &PgPool, cow_id: &str) -> AppResult<SensorReading> {
    let reading = sqlx::query_as::<_, SensorReading>(
        "SELECT cow_id, ts, temperature, heart_rate, activity \
         FROM sensor_readings \
         WHERE cow_id = $1 \
         ORDER BY ts DESC \
         LIMIT 1",
    )
    .bind(cow_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("未找到牲畜 {} 的读数", cow_id)))?;

    Ok(reading)
}
