//! Page requests and page results for label-ordered mapping queries.
//!
//! Lives in `core` so the repository and HTTP layers agree on defaults,
//! clamping and the pinned secondary sort key.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default number of records per page.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum number of records per page.
pub const MAX_PAGE_SIZE: i64 = 500;

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Columns a caller may sort a label page by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    RunLabel,
    TargetId,
    SourceId,
    CreatedAt,
}

impl SortColumn {
    pub fn column(self) -> &'static str {
        match self {
            SortColumn::RunLabel => "run_label",
            SortColumn::TargetId => "target_id",
            SortColumn::SourceId => "source_id",
            SortColumn::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Default for SortOrder {
    /// Label descending.
    fn default() -> Self {
        Self {
            column: SortColumn::RunLabel,
            direction: SortDirection::Desc,
        }
    }
}

impl SortOrder {
    /// Parse `"<column>[,asc|desc]"`. A missing direction means ascending,
    /// except for `run_label` which defaults to descending.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let mut parts = raw.split(',').map(str::trim);
        let column = match parts.next().unwrap_or_default() {
            "run_label" => SortColumn::RunLabel,
            "target_id" => SortColumn::TargetId,
            "source_id" => SortColumn::SourceId,
            "created_at" => SortColumn::CreatedAt,
            other => {
                return Err(CoreError::Validation(format!(
                    "Cannot sort by '{other}'. Must be one of: run_label, target_id, source_id, created_at"
                )))
            }
        };
        let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            None | Some("") if column == SortColumn::RunLabel => SortDirection::Desc,
            None | Some("") => SortDirection::Asc,
            Some(other) => {
                return Err(CoreError::Validation(format!(
                    "Invalid sort direction '{other}'. Must be asc or desc"
                )))
            }
        };
        Ok(Self { column, direction })
    }

    /// `ORDER BY` body. `target_id ASC` is always appended so rows sharing a
    /// label come back in a stable order across pages.
    pub fn order_by_clause(&self) -> String {
        let primary = format!("{} {}", self.column.column(), self.direction.keyword());
        if self.column == SortColumn::TargetId {
            primary
        } else {
            format!("{primary}, target_id ASC")
        }
    }
}

// ---------------------------------------------------------------------------
// Page request
// ---------------------------------------------------------------------------

/// Query parameters for a paged read (`?page=&size=&sort=`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub sort: Option<String>,
}

/// A validated page request. `page` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
    pub sort: SortOrder,
}

impl PageRequest {
    pub fn new(page: i64, size: i64) -> Self {
        Self {
            page: page.max(0),
            size: size.clamp(1, MAX_PAGE_SIZE),
            sort: SortOrder::default(),
        }
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.size)
    }
}

impl TryFrom<PageParams> for PageRequest {
    type Error = CoreError;

    fn try_from(params: PageParams) -> Result<Self, Self::Error> {
        let mut request = PageRequest::new(
            params.page.unwrap_or(0),
            params.size.unwrap_or(DEFAULT_PAGE_SIZE),
        );
        if let Some(sort) = params.sort.as_deref().filter(|s| !s.trim().is_empty()) {
            request.sort = SortOrder::parse(sort)?;
        }
        Ok(request)
    }
}

// ---------------------------------------------------------------------------
// Page result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total_elements: i64,
    pub number_of_elements: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, request: &PageRequest, total_elements: i64) -> Self {
        let number_of_elements = content.len() as i64;
        Self {
            content,
            page: request.page,
            size: request.size,
            total_elements,
            number_of_elements,
            total_pages: total_pages(total_elements, request.size),
        }
    }
}

/// Number of pages needed for `total` rows at `size` per page.
pub fn total_pages(total: i64, size: i64) -> i64 {
    if size <= 0 || total <= 0 {
        return 0;
    }
    (total + size - 1) / size
}
