//! Page/limit/search parameters shared by the admin listings

use crate::errors::{AppError, Result};
use serde::Deserialize;
use validator::Validate;

/// Highest page number a listing accepts
pub const MAX_PAGE: u64 = 1_000_000;

/// Query parameters of a paginated admin listing
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    #[validate(range(min = 1, max = 1_000_000, message = "page must be between 1 and 1000000"))]
    pub page: u64,

    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: u64,

    #[serde(default)]
    pub search: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            search: None,
        }
    }
}

impl ListQuery {
    /// Trimmed search term, if any
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    10
}

/// Number of pages needed for `total` items
pub fn page_count(total: u64, per_page: u64) -> u64 {
    if per_page == 0 {
        0
    } else {
        total.div_ceil(per_page)
    }
}

/// Rows to skip for a 1-based `page`; rejects pages whose offset does not
/// fit a SQL `BIGINT`
pub fn page_offset(page: u64, per_page: u64) -> Result<u64> {
    page.checked_sub(1)
        .and_then(|p| p.checked_mul(per_page))
        .filter(|offset| *offset <= i64::MAX as u64)
        .ok_or_else(|| AppError::validation("page is out of range"))
}
