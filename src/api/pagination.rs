use serde::{Deserialize, Serialize};

const fn default_limit() -> i64 {
    100
}

const MAX_LIMIT: i64 = 1000;

/// `?skip=&limit=` query parameters; out-of-range values are clamped, not rejected.
#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct PageParams {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

impl PageParams {
    pub(crate) fn skip(&self) -> i64 {
        self.skip.max(0)
    }

    pub(crate) fn limit(&self) -> i64 {
        self.limit.clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct PaginatedResponse<T> {
    pub(crate) items: Vec<T>,
    pub(crate) total_count: i64,
    pub(crate) skip: i64,
    pub(crate) limit: i64,
}

impl<T> PaginatedResponse<T> {
    pub(crate) fn new(items: Vec<T>, total_count: i64, page: PageParams) -> Self {
        Self { items, total_count, skip: page.skip(), limit: page.limit() }
    }
}
