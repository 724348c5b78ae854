//! 共享类型定义模块

use serde::{Deserialize, Serialize};

/// 牲畜耳标ID类型（如 "C001"）
pub type CowId = String;

/// 页码类型
pub type PageNumber = u32;

/// 页面大小类型
pub type PageSize = u32;

/// 分页参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationParams {
    pub page: PageNumber,
    pub size: PageSize,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, size: 50 }
    }
}

impl PaginationParams {
    /// 计算偏移量
    pub fn offset(&self) -> i64 {
        ((self.page - 1) * self.size) as i64
    }

    /// 计算限制数量
    pub fn limit(&self) -> i64 {
        self.size as i64
    }

    /// 验证分页参数
    pub fn validate(&self) -> Result<(), String> {
        if self.page == 0 {
            return Err("页码必须大于0".to_string());
        }
        if self.size == 0 || self.size > 500 {
            return Err("页面大小必须在1-500之间".to_string());
        }
        Ok(())
    }

    /// 下一页参数（用于缓存预热）
    pub fn next_page(&self) -> Self {
        Self {
            page: self.page + 1,
            size: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_offset() {
        let params = PaginationParams { page: 3, size: 50 };
        assert_eq!(params.offset(), 100);
        assert_eq!(params.limit(), 50);
    }

    #[test]
    fn test_pagination_validation() {
        assert!(PaginationParams { page: 0, size: 50 }.validate().is_err());
        assert!(PaginationParams { page: 1, size: 0 }.validate().is_err());
        assert!(PaginationParams { page: 1, size: 501 }.validate().is_err());
        assert!(PaginationParams::default().validate().is_ok());
    }
}
