//! Records returned by backends and the search response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An entity as stored by a backend: its type, id and JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Entity type name.
    pub entity_type: String,
    /// Entity id.
    pub id: String,
    /// The entity document. Projected fetches hold only the requested
    /// attributes.
    pub data: Value,
}

impl EntityRecord {
    /// Creates a record.
    pub fn new(entity_type: impl Into<String>, id: impl Into<String>, data: Value) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            data,
        }
    }

    /// Creates a record taking its id from the document's `id` member.
    ///
    /// Returns `None` when the document has no string or numeric id.
    pub fn from_document(entity_type: impl Into<String>, data: Value) -> Option<Self> {
        let id = match data.get("id")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self::new(entity_type, id, data))
    }

    /// Returns the value at a dotted path in the document.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.data, |value, key| value.get(key))
    }
}

/// One page of results plus the total number of matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Rows on this page; empty for count-only searches.
    pub rows: Vec<EntityRecord>,
    /// Matches across all pages.
    pub total_count: u64,
    /// The requested page, echoed back.
    pub page: u32,
    /// The requested page size, echoed back.
    pub page_size: u32,
}

impl SearchResponse {
    /// Number of rows on this page.
    pub fn current_found(&self) -> usize {
        self.rows.len()
    }

    /// Number of pages needed to cover `total_count`.
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(u64::from(self.page_size))
    }

    /// Returns true if pages follow this one.
    pub fn has_next(&self) -> bool {
        u64::from(self.page) + 1 < self.total_pages()
    }
}
