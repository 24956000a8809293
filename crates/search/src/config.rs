//! Engine configuration.
//!
//! [`SearchConfig`] carries the defaults applied to [`QueryOptions`] and the
//! parser switches. It deserializes from JSON with every field optional:
//!
//! ```
//! use trawl_search::config::SearchConfig;
//!
//! let config = SearchConfig::from_json_str(r#"{ "default_page_size": 25 }"#).unwrap();
//! assert_eq!(config.default_page_size, 25);
//! assert_eq!(config.default_sort_field, "id");
//! ```
//!
//! [`QueryOptions`]: crate::types::QueryOptions

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SearchError, SearchResult};
use crate::types::SortDirection;

/// Configuration for parsing and evaluating searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Page size used when options are built from this config.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Sort field used when options are built from this config.
    #[serde(default = "default_sort_field")]
    pub default_sort_field: String,

    /// Sort direction used when options are built from this config.
    #[serde(default)]
    pub default_sort_direction: SortDirection,

    /// Reject `&` and `|` mixed at one nesting level instead of letting the
    /// first operator win.
    #[serde(default)]
    pub reject_mixed_operators: bool,

    /// Wrap LIKE/NOT LIKE values in `%` unless they already contain one.
    #[serde(default = "default_true")]
    pub wrap_like_values: bool,
}

fn default_page_size() -> u32 {
    50
}

fn default_sort_field() -> String {
    "id".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            default_sort_field: default_sort_field(),
            default_sort_direction: SortDirection::default(),
            reject_mixed_operators: false,
            wrap_like_values: true,
        }
    }
}

impl SearchConfig {
    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> SearchResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SearchError::configuration(format!("invalid search config: {}", e)))
    }

    /// Reads a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> SearchResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            SearchError::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}
