//! Filters and pagination for the read side

use serde::{Deserialize, Serialize};

use super::action::ActionStatus;
use super::job::JobStatus;

/// 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub per_page: u64,
}

impl Pagination {
    pub const MAX_PER_PAGE: u64 = 100;

    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }.normalized()
    }

    /// Clamp to page >= 1 and 1 <= per_page <= MAX_PER_PAGE
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    /// 0-based page index
    pub fn index(&self) -> u64 {
        self.page.max(1) - 1
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            per_page: pagination.per_page,
            total_pages: total.div_ceil(pagination.per_page.max(1)),
        }
    }
}

/// Action list filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionFilter {
    pub account_id: Option<String>,
    pub status: Option<ActionStatus>,
    pub entity_type: Option<String>,
}

/// Job log filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub external_id: Option<String>,
}
