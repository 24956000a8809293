//! Storage backends.
//!
//! | Backend | Feature | Storage |
//! |---------|---------|---------|
//! | [`memory::MemoryBackend`] | always | JSON documents behind a lock |
//! | [`sqlite::SqliteBackend`] | `sqlite` (default) | JSON documents in one SQLite table |
//!
//! Both evaluate predicates with SQL comparison rules so a request returns
//! the same rows from either.

use serde_json::{Map, Value};

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Inserts `value` at `path`, creating intermediate objects.
pub(crate) fn insert_path(node: &mut Map<String, Value>, path: &[&str], value: Value) {
    match path {
        [] => {}
        [last] => {
            node.insert(last.to_string(), value);
        }
        [first, rest @ ..] => {
            let entry = node
                .entry(first.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}
