//! Paginated list responses
//!
//! List endpoints answer `{ data: [...], pagination: {...} }`. The pagination
//! block may be missing; callers then keep paging while pages are non-empty.

use serde::{Deserialize, Serialize};

/// Pagination block of a list response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub current_page: u32,
    #[serde(default)]
    pub next_page: Option<u32>,
    #[serde(default)]
    pub prev_page: Option<u32>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_items: Option<u64>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// One page of a list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

impl<T> Page<T> {
    /// Whether another page follows the one requested as `page`
    pub fn has_next_page(&self, page: u32) -> bool {
        match &self.pagination {
            Some(pagination) => pagination.next_page.is_some() && page < pagination.total_pages,
            None => !self.data.is_empty(),
        }
    }
}
