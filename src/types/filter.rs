//! Offset pagination shared by every list operation.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_LIMIT: u64 = 50;
pub const MAX_LIMIT: u64 = 200;

/// `limit` / `offset` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
pub struct Pagination {
    /// Maximum number of items to return (default: 50, max: 200)
    #[param(example = 50)]
    pub limit: Option<u64>,
    /// Number of items to skip (default: 0)
    #[param(example = 0)]
    pub offset: Option<u64>,
}

impl Pagination {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }

    pub fn info(&self, total: u64) -> PaginationInfo {
        let limit = self.limit();
        let offset = self.offset();
        PaginationInfo {
            total,
            limit,
            offset,
            has_more: offset + limit < total,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct PaginationInfo {
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
    pub has_more: bool,
}

/// Page of results with its pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    pub pagination: PaginationInfo,
}

impl<T> ListResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListResult<U> {
        ListResult {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_clamps() {
        assert_eq!(Pagination::default().limit(), DEFAULT_LIMIT);
        assert_eq!(Pagination::new(1000, 0).limit(), MAX_LIMIT);
        assert_eq!(Pagination::new(0, 0).limit(), 1);
    }

    #[test]
    fn has_more_reflects_remaining_rows() {
        assert!(Pagination::new(10, 0).info(11).has_more);
        assert!(!Pagination::new(10, 1).info(11).has_more);
        assert!(!Pagination::default().info(0).has_more);
    }
}
