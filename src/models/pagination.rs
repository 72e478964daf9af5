//! Pagination
//!
//! `Paginator` turns a raw `?page=` value into bounded `ListParams`; a bad or
//! missing value means the first page and a value past the end means the
//! last page. `PagedResult` is handed to templates as `page_obj`.

use serde::{Deserialize, Serialize};

/// Offset/limit for one page of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Resolves page requests against a known item count
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    total: i64,
    per_page: u32,
}

impl Paginator {
    pub fn new(total: i64, per_page: u32) -> Self {
        Self {
            total: total.max(0),
            per_page: per_page.max(1),
        }
    }

    /// Number of pages; an empty listing still has one (empty) page
    pub fn num_pages(&self) -> u32 {
        let pages = (self.total + self.per_page as i64 - 1) / self.per_page as i64;
        pages.max(1) as u32
    }

    /// Pick the page to show for a raw query-string value
    pub fn get_page(&self, raw: Option<&str>) -> ListParams {
        let last = self.num_pages();
        let page = match raw.map(str::trim).and_then(|s| s.parse::<i64>().ok()) {
            None => 1,
            Some(n) if n < 1 => 1,
            Some(n) if n > last as i64 => last,
            Some(n) => n as u32,
        };
        ListParams::new(page, self.per_page)
    }
}

/// One page of items plus the navigation state templates need
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub count: i64,
    /// Current page number (1-indexed)
    pub number: u32,
    pub per_page: u32,
    pub num_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub next_page_number: Option<u32>,
    pub previous_page_number: Option<u32>,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, count: i64, params: &ListParams) -> Self {
        let num_pages = Paginator::new(count, params.per_page).num_pages();
        let has_next = params.page < num_pages;
        let has_previous = params.page > 1;
        Self {
            items,
            count,
            number: params.page,
            per_page: params.per_page,
            num_pages,
            has_next,
            has_previous,
            next_page_number: has_next.then_some(params.page + 1),
            previous_page_number: has_previous.then_some(params.page - 1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
