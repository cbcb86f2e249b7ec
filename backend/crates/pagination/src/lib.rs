//! Offset pagination primitives shared by list endpoints.
//!
//! Endpoints accept `skip`/`limit` query parameters, validate them against
//! per-endpoint [`PageBounds`], and reply with a [`Page`] envelope carrying
//! the total number of matching rows so clients can render pagers.

use serde::{Deserialize, Serialize};

/// Errors raised while validating pagination parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaginationError {
    /// `limit` was zero.
    #[error("limit must be at least 1")]
    LimitTooSmall,
    /// `limit` exceeded the endpoint maximum.
    #[error("limit must be at most {max}")]
    LimitTooLarge {
        /// Largest limit accepted by the endpoint.
        max: u32,
    },
}

/// Default and maximum page sizes for an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBounds {
    default_limit: u32,
    max_limit: u32,
}

impl PageBounds {
    /// Build bounds; `default_limit` is clamped into `1..=max_limit`.
    ///
    /// # Examples
    /// ```
    /// use pagination::PageBounds;
    ///
    /// let bounds = PageBounds::new(20, 100);
    /// assert_eq!(bounds.default_limit(), 20);
    /// assert_eq!(bounds.max_limit(), 100);
    /// ```
    #[must_use]
    pub const fn new(default_limit: u32, max_limit: u32) -> Self {
        let max_limit = if max_limit == 0 { 1 } else { max_limit };
        let default_limit = if default_limit == 0 {
            1
        } else if default_limit > max_limit {
            max_limit
        } else {
            default_limit
        };
        Self {
            default_limit,
            max_limit,
        }
    }

    /// Page size used when the client omits `limit`.
    #[must_use]
    pub const fn default_limit(&self) -> u32 {
        self.default_limit
    }

    /// Largest page size accepted.
    #[must_use]
    pub const fn max_limit(&self) -> u32 {
        self.max_limit
    }
}

/// Validated offset window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    skip: u32,
    limit: u32,
}

impl PageRequest {
    /// Validate raw query values against `bounds`.
    ///
    /// # Errors
    /// Returns [`PaginationError`] when `limit` is zero or above the
    /// endpoint maximum.
    ///
    /// # Examples
    /// ```
    /// use pagination::{PageBounds, PageRequest};
    ///
    /// let page = PageRequest::from_query(Some(40), None, PageBounds::new(20, 100))
    ///     .expect("valid window");
    /// assert_eq!(page.skip(), 40);
    /// assert_eq!(page.limit(), 20);
    /// ```
    pub const fn from_query(
        skip: Option<u32>,
        limit: Option<u32>,
        bounds: PageBounds,
    ) -> Result<Self, PaginationError> {
        let skip = match skip {
            Some(value) => value,
            None => 0,
        };
        let limit = match limit {
            Some(value) => value,
            None => bounds.default_limit,
        };
        if limit == 0 {
            return Err(PaginationError::LimitTooSmall);
        }
        if limit > bounds.max_limit {
            return Err(PaginationError::LimitTooLarge {
                max: bounds.max_limit,
            });
        }
        Ok(Self { skip, limit })
    }

    /// First page with the given size.
    #[must_use]
    pub const fn first(limit: u32) -> Self {
        Self {
            skip: 0,
            limit: if limit == 0 { 1 } else { limit },
        }
    }

    /// Number of rows to skip.
    #[must_use]
    pub const fn skip(&self) -> u32 {
        self.skip
    }

    /// Maximum number of rows to return.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// `skip` widened for SQL `OFFSET` clauses.
    #[must_use]
    pub fn offset_i64(&self) -> i64 {
        i64::from(self.skip)
    }

    /// `limit` widened for SQL `LIMIT` clauses.
    #[must_use]
    pub fn limit_i64(&self) -> i64 {
        i64::from(self.limit)
    }

    /// Slice an in-memory, already ordered collection.
    #[must_use]
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = usize::try_from(self.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(limit).collect()
    }
}

/// Response envelope for offset-paginated listings.
///
/// Serialised as `{"items": [...], "total": n, "skip": n, "limit": n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Rows in this window.
    pub items: Vec<T>,
    /// Total rows matching the query, ignoring the window.
    pub total: u64,
    /// Offset used for this window.
    pub skip: u32,
    /// Page size used for this window.
    pub limit: u32,
}

impl<T> Page<T> {
    /// Wrap `items` fetched for `request`.
    #[must_use]
    pub const fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            skip: request.skip,
            limit: request.limit,
        }
    }

    /// Convert each item, preserving the window metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            skip: self.skip,
            limit: self.limit,
        }
    }

    /// Fallible variant of [`Page::map`].
    ///
    /// # Errors
    /// Returns the first error produced by `f`.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        let items = self.items.into_iter().map(f).collect::<Result<Vec<_>, E>>()?;
        Ok(Page {
            items,
            total: self.total,
            skip: self.skip,
            limit: self.limit,
        })
    }

    /// Whether rows remain beyond this window.
    #[must_use]
    pub fn has_more(&self) -> bool {
        let seen = u64::from(self.skip).saturating_add(self.items.len() as u64);
        seen < self.total
    }
}

#[cfg(test)]
mod tests {
    //! Window validation and envelope behaviour.
    use super::*;
    use rstest::rstest;

    const BOUNDS: PageBounds = PageBounds::new(20, 100);

    #[rstest]
    #[case(None, None, 0, 20)]
    #[case(Some(5), Some(1), 5, 1)]
    #[case(Some(0), Some(100), 0, 100)]
    fn accepts_windows_within_bounds(
        #[case] skip: Option<u32>,
        #[case] limit: Option<u32>,
        #[case] expected_skip: u32,
        #[case] expected_limit: u32,
    ) {
        let page = PageRequest::from_query(skip, limit, BOUNDS).expect("valid window");
        assert_eq!(page.skip(), expected_skip);
        assert_eq!(page.limit(), expected_limit);
    }

    #[rstest]
    #[case(Some(0), PaginationError::LimitTooSmall)]
    #[case(Some(101), PaginationError::LimitTooLarge { max: 100 })]
    fn rejects_out_of_range_limits(
        #[case] limit: Option<u32>,
        #[case] expected: PaginationError,
    ) {
        let err = PageRequest::from_query(None, limit, BOUNDS).expect_err("invalid limit");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn bounds_clamp_default_into_range() {
        let bounds = PageBounds::new(500, 100);
        assert_eq!(bounds.default_limit(), 100);
        let bounds = PageBounds::new(0, 0);
        assert_eq!(bounds.default_limit(), 1);
        assert_eq!(bounds.max_limit(), 1);
    }

    #[rstest]
    fn apply_slices_in_memory_rows() {
        let page = PageRequest::from_query(Some(2), Some(3), BOUNDS).expect("valid window");
        assert_eq!(page.apply((0..10).collect()), vec![2, 3, 4]);
    }

    #[rstest]
    fn has_more_reports_remaining_rows() {
        let request = PageRequest::from_query(Some(0), Some(2), BOUNDS).expect("valid window");
        let page = Page::new(vec![1, 2], 3, request);
        assert!(page.has_more());
        let last = Page::new(vec![3], 3, PageRequest::from_query(Some(2), Some(2), BOUNDS).expect("valid"));
        assert!(!last.has_more());
    }

    #[rstest]
    fn envelope_serialises_in_camel_case() {
        let request = PageRequest::first(10);
        let page = Page::new(vec!["a"], 1, request).map(str::to_uppercase);
        let json = serde_json::to_value(&page).expect("serialise page");
        assert_eq!(
            json,
            serde_json::json!({ "items": ["A"], "total": 1, "skip": 0, "limit": 10 })
        );
    }
}
