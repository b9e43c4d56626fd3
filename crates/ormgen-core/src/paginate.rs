//! Page-number pagination.

use serde::Serialize;

use crate::error::Error;

/// Upper bound on a requested page size.
pub const MAX_PAGE_SIZE: usize = 100;

/// Page value selecting the final page.
pub const LAST_PAGE: &str = "last";

/// Page size requested through the query string.
///
/// Numeric values are clamped to [`MAX_PAGE_SIZE`]; anything else, including
/// zero or negative numbers, keeps `default`.
pub fn page_size_from_param(raw: Option<&str>, default: usize) -> usize {
    match raw.map(str::trim).map(str::parse::<i64>) {
        Some(Ok(size)) if size >= 1 => (size as u64).min(MAX_PAGE_SIZE as u64) as usize,
        _ => default,
    }
}

/// One page of a result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    /// 1-based page number.
    pub number: usize,
    /// Total number of pages, at least 1.
    pub num_pages: usize,
    /// Total number of rows.
    pub count: usize,
    /// Rows per page.
    pub per_page: usize,
    /// Rows skipped before this page.
    pub offset: usize,
    /// 1-based index of the first row on the page, 0 when there are no rows.
    pub start_index: usize,
    /// 1-based index of the last row on the page.
    pub end_index: usize,
    /// Check if a later page exists.
    pub has_next: bool,
    /// Check if an earlier page exists.
    pub has_previous: bool,
}

impl Page {
    /// Check if there is more than one page.
    pub fn is_paginated(&self) -> bool {
        self.num_pages > 1
    }
}

/// Splits `count` rows into pages of `per_page`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    per_page: usize,
}

impl Paginator {
    /// Create a paginator; a zero page size is treated as 1.
    pub fn new(per_page: usize) -> Self {
        Self {
            per_page: per_page.max(1),
        }
    }

    /// Rows per page.
    pub fn per_page(&self) -> usize {
        self.per_page
    }

    /// Number of pages for `count` rows. An empty result still has one page.
    pub fn num_pages(&self, count: usize) -> usize {
        count.div_ceil(self.per_page).max(1)
    }

    /// Validate a page parameter: a positive integer or `last`. A missing
    /// parameter selects the first page.
    pub fn page(&self, raw: Option<&str>, count: usize) -> Result<Page, Error> {
        let num_pages = self.num_pages(count);
        let number = match raw.map(str::trim) {
            None | Some("") => 1,
            Some(LAST_PAGE) => num_pages,
            Some(text) => text
                .parse::<i64>()
                .map_err(|_| Error::InvalidPage(format!("'{}' is not an integer", text)))?
                .try_into()
                .map_err(|_| Error::InvalidPage(format!("'{}' is less than 1", text)))?,
        };
        if number < 1 {
            return Err(Error::InvalidPage(format!("'{}' is less than 1", number)));
        }
        if number > num_pages {
            return Err(Error::InvalidPage(format!("page {} contains no results", number)));
        }

        let offset = (number - 1) * self.per_page;
        let end_index = if number == num_pages {
            count
        } else {
            number * self.per_page
        };
        Ok(Page {
            number,
            num_pages,
            count,
            per_page: self.per_page,
            offset,
            start_index: if count == 0 { 0 } else { offset + 1 },
            end_index,
            has_next: number < num_pages,
            has_previous: number > 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_param() {
        assert_eq!(page_size_from_param(Some("30"), 20), 30);
        assert_eq!(page_size_from_param(Some("500"), 20), 100);
        assert_eq!(page_size_from_param(Some("abc"), 20), 20);
        assert_eq!(page_size_from_param(Some("0"), 20), 20);
        assert_eq!(page_size_from_param(Some("-3"), 20), 20);
        assert_eq!(page_size_from_param(None, 20), 20);
    }

    #[test]
    fn test_pages() {
        let paginator = Paginator::new(20);
        let first = paginator.page(None, 45).unwrap();
        assert_eq!((first.number, first.num_pages, first.offset), (1, 3, 0));
        assert!(first.has_next && !first.has_previous);

        let last = paginator.page(Some("last"), 45).unwrap();
        assert_eq!((last.number, last.start_index, last.end_index), (3, 41, 45));
        assert!(!last.has_next);
    }

    #[test]
    fn test_empty_first_page_allowed() {
        let page = Paginator::new(20).page(Some("1"), 0).unwrap();
        assert_eq!((page.num_pages, page.start_index, page.end_index), (1, 0, 0));
        assert!(!page.is_paginated());
    }

    #[test]
    fn test_invalid_pages() {
        let paginator = Paginator::new(20);
        assert!(matches!(paginator.page(Some("x"), 45), Err(Error::InvalidPage(_))));
        assert!(matches!(paginator.page(Some("0"), 45), Err(Error::InvalidPage(_))));
        assert!(matches!(paginator.page(Some("-1"), 45), Err(Error::InvalidPage(_))));
        assert!(matches!(paginator.page(Some("4"), 45), Err(Error::InvalidPage(_))));
    }
}
