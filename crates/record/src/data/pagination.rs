//! Page window over a result set

use crate::error::{ModelError, OrmResult};

pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Page size and 0-based page index.
///
/// A page size of zero or less disables paging: everything is one page.
/// Pages past the end are not clamped; they are simply empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    page_size: i64,
    page: u64,
    total_count: u64,
    page_size_limit: Option<(i64, i64)>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page: 0,
            total_count: 0,
            page_size_limit: None,
        }
    }
}

impl Pagination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.set_page_size(page_size);
        self
    }

    pub fn with_page(mut self, page: u64) -> Self {
        self.page = page;
        self
    }

    /// Clamp future page sizes to `[min, max]`
    pub fn with_page_size_limit(mut self, min: i64, max: i64) -> OrmResult<Self> {
        if min > max {
            return Err(ModelError::Configuration(format!(
                "Invalid page size limit: minimum {} is greater than maximum {}",
                min, max
            )));
        }
        self.page_size_limit = Some((min, max));
        self.set_page_size(self.page_size);
        Ok(self)
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: i64) {
        self.page_size = match self.page_size_limit {
            Some((min, _)) if page_size < min => min,
            Some((_, max)) if page_size > max => max,
            _ => page_size,
        };
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn set_page(&mut self, page: u64) {
        self.page = page;
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn set_total_count(&mut self, total_count: u64) {
        self.total_count = total_count;
    }

    pub fn is_paged(&self) -> bool {
        self.page_size > 0
    }

    pub fn page_count(&self) -> u64 {
        if !self.is_paged() {
            return u64::from(self.total_count > 0);
        }
        self.total_count.div_ceil(self.page_size as u64)
    }

    /// Index of the first item of the current page, saturating at `u64::MAX`
    pub fn offset(&self) -> u64 {
        if self.is_paged() {
            self.page.saturating_mul(self.page_size as u64)
        } else {
            0
        }
    }

    /// Items per page, `None` when paging is disabled
    pub fn limit(&self) -> Option<u64> {
        self.is_paged().then(|| self.page_size as u64)
    }
}
