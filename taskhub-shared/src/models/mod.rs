/// Database models for TaskHub
///
/// Each model owns its SQL. The PostgreSQL store delegates to these
/// associated functions; the in-memory store mirrors their semantics.
///
/// # Models
///
/// - `user`: User accounts and the immutable global role
/// - `project`: Projects and their single owner
/// - `membership`: Project membership rows (project, user, free-form role)
/// - `task`: Tasks within a project
/// - `comment`: Comments on tasks
/// - `idempotency`: Stored responses for idempotent POSTs
///
/// List endpoints share [`Page`], [`SortOrder`] and [`TimeRange`]; each
/// listed model adds its own filter and sort-field types.

pub mod comment;
pub mod idempotency;
pub mod membership;
pub mod project;
pub mod task;
pub mod user;

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Largest page size accepted by list endpoints
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page request for list queries (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    /// Builds a page request, falling back to page 1 / 10 items and clamping
    /// the limit to `1..=MAX_PAGE_SIZE`
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            limit: limit.filter(|l| *l > 0).unwrap_or(10).min(MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination block returned alongside list results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: Page, total: u64) -> Self {
        Self {
            page: page.page,
            limit: page.limit,
            total,
            total_pages: total.div_ceil(u64::from(page.limit)),
        }
    }
}

/// Direction of a list sort
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// `asc` or `desc` in any case; anything else is `None`
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Orients an ascending comparison
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Inclusive bounds on a timestamp column; open on a missing side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Builds a range from raw query values, dropping any that don't parse
    pub fn parse(after: Option<&str>, before: Option<&str>) -> Self {
        Self {
            after: after.and_then(parse_timestamp),
            before: before.and_then(parse_timestamp),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.after.map_or(true, |after| at >= after) && self.before.map_or(true, |before| at <= before)
    }
}

/// Parses an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

/// Case-insensitive substring match used by `search` filters
pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// SQL twin of [`contains_ignore_case`]: `$n` is a substring of `column`,
/// ignoring case, with no LIKE wildcards
pub(crate) fn sql_contains(column: &str, param: usize) -> String {
    format!("strpos(lower({}), lower(${})) > 0", column, param)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order_parse() {
        assert_eq!(SortOrder::parse("asc"), Some(SortOrder::Asc));
        assert_eq!(SortOrder::parse(" DESC "), Some(SortOrder::Desc));
        assert_eq!(SortOrder::parse("sideways"), None);
        assert_eq!(SortOrder::Desc.apply(Ordering::Less), Ordering::Greater);
    }

    #[test]
    fn test_time_range_is_inclusive() {
        let start = parse_timestamp("2024-01-01").unwrap();
        let end = parse_timestamp("2024-01-31T23:59:59Z").unwrap();
        let range = TimeRange {
            after: Some(start),
            before: Some(end),
        };

        assert!(range.contains(start));
        assert!(range.contains(end));
        assert!(!range.contains(end + chrono::Duration::seconds(1)));
        assert!(TimeRange::default().contains(Utc::now()));
    }

    #[test]
    fn test_unparseable_bounds_are_dropped() {
        let range = TimeRange::parse(Some("yesterday"), Some("2024-02-30"));
        assert_eq!(range, TimeRange::default());

        let range = TimeRange::parse(Some("2024-03-01T12:00:00+02:00"), None);
        assert_eq!(range.after, parse_timestamp("2024-03-01T10:00:00Z"));
    }

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Fix Login Bug", "login"));
        assert!(contains_ignore_case("50% done", "50%"));
        assert!(!contains_ignore_case("Fix Login Bug", "logout"));
        assert_eq!(sql_contains("title", 2), "strpos(lower(title), lower($2)) > 0");
    }

    #[test]
    fn test_page_defaults_and_clamping() {
        assert_eq!(Page::new(None, None), Page { page: 1, limit: 10 });
        assert_eq!(Page::new(Some(0), Some(0)), Page { page: 1, limit: 10 });
        assert_eq!(Page::new(Some(3), Some(500)).limit, MAX_PAGE_SIZE);
        assert_eq!(Page::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn test_pagination_total_pages() {
        let page = Page::new(Some(1), Some(10));
        assert_eq!(Pagination::new(page, 0).total_pages, 0);
        assert_eq!(Pagination::new(page, 10).total_pages, 1);
        assert_eq!(Pagination::new(page, 11).total_pages, 2);
    }
}
