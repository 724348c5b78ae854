//! 缓存键构建器
//!
//! 从语义查询参数构造确定性、无碰撞的缓存/限流键。
//! 同一查询（不论参数顺序）总是得到同一个键；语义不同的查询不碰撞

use chrono::{DateTime, Utc};

use crate::shared::types::PaginationParams;

/// 键段分隔符，不允许出现在键段内容中
pub const KEY_SEPARATOR: char = ':';

/// 缓存键构建器
#[derive(Debug, Clone, Default)]
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    pub fn new() -> Self {
        Self
    }

    /// 清洗键段：分隔符替换为下划线，保证段边界唯一
    fn sanitize(part: &str) -> String {
        part.replace(KEY_SEPARATOR, "_")
    }

    /// 通用键构造：跳过缺省段，用固定分隔符连接
    pub fn build(&self, namespace: &str, parts: &[Option<String>]) -> String {
        let mut key = String::from(namespace);
        for part in parts.iter().flatten() {
            key.push(KEY_SEPARATOR);
            key.push_str(&Self::sanitize(part));
        }
        key
    }

    /// 最新读数缓存键
    pub fn latest_key(&self, cow_id: &str) -> String {
        self.build("latest", &[Some(cow_id.to_string())])
    }

    /// 聚合查询缓存键
    ///
    /// 耳标ID列表排序后拼接，保证等价查询映射到同一个键。
    /// 缺省的ID列表与上界用固定占位符，段数恒定，避免段位移碰撞
    pub fn aggregates_key(
        &self,
        resolution: &str,
        cow_ids: Option<&[String]>,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        pagination: &PaginationParams,
    ) -> String {
        let ids = cow_ids
            .map(|ids| {
                let mut sorted: Vec<String> = ids.to_vec();
                sorted.sort();
                sorted.join(",")
            })
            .unwrap_or_else(|| "all".to_string());

        self.build(
            "agg",
            &[
                Some(resolution.to_string()),
                Some(ids),
                Some(start.timestamp().to_string()),
                Some(
                    end.map(|e| e.timestamp().to_string())
                        .unwrap_or_else(|| "open".to_string()),
                ),
                Some(pagination.page.to_string()),
                Some(pagination.size.to_string()),
            ],
        )
    }

    /// 限流窗口键：每个 档位×端点×主体 组合一个独立计数器
    pub fn rate_limit_key(&self, tier: &str, endpoint: &str, principal: &str) -> String {
        self.build(
            "ratelimit",
            &[
                Some(tier.to_string()),
                Some(endpoint.to_string()),
                Some(principal.to_string()),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn test_build_skips_absent_parts() {
        let builder = CacheKeyBuilder::new();
        let key = builder.build(
            "ns",
            &[Some("a".to_string()), None, Some("b".to_string())],
        );
        assert_eq!(key, "ns:a:b");
    }

    #[test]
    fn test_batch_ids_order_independent() {
        let builder = CacheKeyBuilder::new();
        let pagination = PaginationParams::default();

        let ids1 = vec!["C003".to_string(), "C001".to_string(), "C002".to_string()];
        let ids2 = vec!["C001".to_string(), "C002".to_string(), "C003".to_string()];

        let k1 = builder.aggregates_key("1h", Some(&ids1), ts(0), None, &pagination);
        let k2 = builder.aggregates_key("1h", Some(&ids2), ts(0), None, &pagination);
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_distinct_queries_never_collide() {
        let builder = CacheKeyBuilder::new();
        let pagination = PaginationParams::default();
        let ids = vec!["C001".to_string()];

        let base = builder.aggregates_key("1h", Some(&ids), ts(0), None, &pagination);
        let other_resolution = builder.aggregates_key("1d", Some(&ids), ts(0), None, &pagination);
        let other_start = builder.aggregates_key("1h", Some(&ids), ts(6), None, &pagination);
        let other_end =
            builder.aggregates_key("1h", Some(&ids), ts(0), Some(ts(12)), &pagination);
        let other_page = builder.aggregates_key(
            "1h",
            Some(&ids),
            ts(0),
            None,
            &PaginationParams { page: 2, size: 50 },
        );
        let no_ids = builder.aggregates_key("1h", None, ts(0), None, &pagination);

        let keys = [
            &base,
            &other_resolution,
            &other_start,
            &other_end,
            &other_page,
            &no_ids,
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_separator_sanitized_in_parts() {
        let builder = CacheKeyBuilder::new();
        // IPv6地址等含分隔符的主体不会伪造段边界
        let key = builder.rate_limit_key("standard", "/api/sensors/{cow_id}/latest", "::1");
        assert!(key.ends_with(":__1"));
        assert_eq!(key.matches("::").count(), 0);
    }

    #[test]
    fn test_latest_key_deterministic() {
        let builder = CacheKeyBuilder::new();
        assert_eq!(builder.latest_key("C001"), builder.latest_key("C001"));
        assert_ne!(builder.latest_key("C001"), builder.latest_key("C002"));
    }
}
