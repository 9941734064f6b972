//! Page/limit handling shared by every list endpoint.

use serde::{Deserialize, Serialize};

/// Raw `page` / `limit` query parameters.
///
/// Kept as strings so that garbage values fall back to defaults instead of
/// rejecting the request.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// A resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    /// Resolve query parameters: pages below 1 become 1, limits outside
    /// `1..=max_limit` become `default_limit`.
    #[must_use]
    pub fn resolve(params: &PageParams, default_limit: i64, max_limit: i64) -> Self {
        let page = parse_number(params.page.as_deref()).unwrap_or(1).max(1);
        let limit = match parse_number(params.limit.as_deref()) {
            Some(limit) if (1..=max_limit).contains(&limit) => limit,
            _ => default_limit,
        };
        Self { page, limit }
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    #[must_use]
    pub const fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            return 0;
        }
        (total + self.limit - 1) / self.limit
    }

    /// Page metadata for a response.
    #[must_use]
    pub const fn meta(&self, total: i64) -> PageMeta {
        PageMeta {
            current_page: self.page,
            total_pages: self.total_pages(total),
            limit: self.limit,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PageMeta {
    pub current_page: i64,
    pub total_pages: i64,
    pub limit: i64,
}

fn parse_number(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, limit: Option<&str>) -> PageParams {
        PageParams {
            page: page.map(String::from),
            limit: limit.map(String::from),
        }
    }

    #[test]
    fn test_defaults_when_absent() {
        let p = Pagination::resolve(&PageParams::default(), 10, 50);
        assert_eq!(p, Pagination { page: 1, limit: 10 });
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_out_of_range_values_fall_back() {
        let p = Pagination::resolve(&params(Some("-3"), Some("51")), 10, 50);
        assert_eq!(p, Pagination { page: 1, limit: 10 });

        let p = Pagination::resolve(&params(Some("abc"), Some("0")), 20, 50);
        assert_eq!(p, Pagination { page: 1, limit: 20 });
    }

    #[test]
    fn test_offset_and_total_pages() {
        let p = Pagination::resolve(&params(Some("3"), Some("20")), 10, 50);
        assert_eq!(p.offset(), 40);
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(20), 1);
        assert_eq!(p.total_pages(41), 3);
    }
}
