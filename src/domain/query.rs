//! Query descriptors and paginated results.

use crate::domain::filter::Filter;
use crate::domain::record::Record;
use crate::error::{RepositoryError, RepositoryResult};
use serde::{Deserialize, Serialize};

/// Page size used when the caller does not paginate: one page holds the table.
pub const DEFAULT_PAGE_SIZE: u64 = i32::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub filter: Option<Filter>,
    pub sorts: Vec<Sort>,
    pub page_num: u64,
    pub page_size: u64,
    /// Caller-supplied page count. When set it is trusted and no count query runs.
    pub page_count: Option<u64>,
    pub projections: Vec<String>,
    pub index_hint: Option<String>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            filter: None,
            sorts: Vec::new(),
            page_num: 1,
            page_size: DEFAULT_PAGE_SIZE,
            page_count: None,
            projections: Vec::new(),
            index_hint: None,
        }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sorts.push(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn page(mut self, page_num: u64, page_size: u64) -> Self {
        self.page_num = page_num;
        self.page_size = page_size;
        self
    }

    pub fn page_count(mut self, page_count: u64) -> Self {
        self.page_count = Some(page_count);
        self
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projections.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn index_hint(mut self, index: impl Into<String>) -> Self {
        self.index_hint = Some(index.into());
        self
    }

    pub fn validate(&self) -> RepositoryResult<()> {
        if self.page_num < 1 {
            return Err(RepositoryError::invalid_query("page_num must be >= 1"));
        }
        if self.page_size < 1 {
            return Err(RepositoryError::invalid_query("page_size must be >= 1"));
        }
        Ok(())
    }

    /// Half-open row window `[start, end)` of the requested page.
    pub fn window(&self) -> (u64, u64) {
        let start = (self.page_num - 1).saturating_mul(self.page_size);
        (start, start.saturating_add(self.page_size))
    }
}

/// `ceil(record_count / page_size)`.
pub fn page_count_for(record_count: u64, page_size: u64) -> u64 {
    if record_count == 0 || page_size == 0 {
        return 0;
    }
    record_count.div_ceil(page_size)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Pagination {
    pub page_count: u64,
    /// Zero when the page count was supplied by the caller (not computed).
    pub record_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct QueryResult {
    pub pagination: Pagination,
    pub rows: Vec<Record>,
}

impl QueryResult {
    pub fn empty(pagination: Pagination) -> Self {
        Self {
            pagination,
            rows: Vec::new(),
        }
    }
}
