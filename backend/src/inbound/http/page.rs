//! Paged list envelope shared by listing endpoints.

use pagination::Page;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `{items, total, skip, limit}` envelope.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    /// Rows matching the query, ignoring the window.
    pub total: u64,
    pub skip: u32,
    pub limit: u32,
}

impl<T, U> From<Page<U>> for PageResponse<T>
where
    U: Into<T>,
{
    fn from(page: Page<U>) -> Self {
        let Page {
            items,
            total,
            skip,
            limit,
        } = page;
        Self {
            items: items.into_iter().map(Into::into).collect(),
            total,
            skip,
            limit,
        }
    }
}
