//! Query options: paging, sorting, projection and count-only execution.

use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::{SearchError, SearchResult};

/// Sort direction for the single sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

/// Options controlling how a search is executed.
///
/// Fields are optional so that a missing value can be reported instead of
/// silently defaulted; [`QueryOptions::new`] fills every required field from
/// [`SearchConfig::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Entity type to search.
    pub entity_type: Option<String>,
    /// Zero-based page number.
    pub page: Option<u32>,
    /// Rows per page.
    pub page_size: Option<u32>,
    /// Attribute to sort by.
    pub sort_field: Option<String>,
    /// Sort direction.
    pub sort_direction: Option<SortDirection>,
    /// Attributes to fetch; `None` fetches whole records.
    #[serde(default)]
    pub projection: Option<Vec<String>>,
    /// Skip the row fetch and only count.
    #[serde(default)]
    pub count_only: bool,
}

/// Options after validation, with every required field present.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOptions {
    /// Entity type to search.
    pub entity_type: String,
    /// Zero-based page number.
    pub page: u32,
    /// Rows per page, never zero.
    pub page_size: u32,
    /// Attribute to sort by.
    pub sort_field: String,
    /// Sort direction.
    pub sort_direction: SortDirection,
    /// Attributes to fetch.
    pub projection: Option<Vec<String>>,
    /// Skip the row fetch.
    pub count_only: bool,
}

impl ValidatedOptions {
    /// Number of rows skipped before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.page_size)
    }
}

impl QueryOptions {
    /// Creates options for `entity_type` with default paging and sorting.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self::from_config(entity_type, &SearchConfig::default())
    }

    /// Creates options for `entity_type` with defaults taken from `config`.
    pub fn from_config(entity_type: impl Into<String>, config: &SearchConfig) -> Self {
        Self {
            entity_type: Some(entity_type.into()),
            page: Some(0),
            page_size: Some(config.default_page_size),
            sort_field: Some(config.default_sort_field.clone()),
            sort_direction: Some(config.default_sort_direction),
            projection: None,
            count_only: false,
        }
    }

    /// Sets the page number.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Sets the sort field and direction.
    pub fn with_sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort_field = Some(field.into());
        self.sort_direction = Some(direction);
        self
    }

    /// Restricts fetched attributes.
    pub fn with_projection<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Only count matching rows.
    pub fn count_only(mut self) -> Self {
        self.count_only = true;
        self
    }

    /// Checks that every required option is present.
    pub fn validate(&self) -> SearchResult<ValidatedOptions> {
        let entity_type = required_text(self.entity_type.as_deref(), "entity type")?;
        let page = self
            .page
            .ok_or_else(|| SearchError::configuration("page is required"))?;
        let page_size = self
            .page_size
            .ok_or_else(|| SearchError::configuration("page size is required"))?;
        if page_size == 0 {
            return Err(SearchError::configuration("page size must be positive"));
        }
        let sort_field = required_text(self.sort_field.as_deref(), "sort field")?;
        let sort_direction = self
            .sort_direction
            .ok_or_else(|| SearchError::configuration("sort direction is required"))?;

        Ok(ValidatedOptions {
            entity_type,
            page,
            page_size,
            sort_field,
            sort_direction,
            projection: self.projection.clone(),
            count_only: self.count_only,
        })
    }
}

fn required_text(value: Option<&str>, name: &str) -> SearchResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(SearchError::configuration(format!("{} is required", name))),
    }
}
