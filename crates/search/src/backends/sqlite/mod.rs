//! SQLite backend.
//!
//! Entities are stored as JSON documents and filtered with SQLite's JSON
//! functions. Both file databases and in-memory databases (for tests) are
//! supported.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use trawl_search::backends::sqlite::SqliteBackend;
//! use trawl_search::core::EntityStore;
//! use trawl_search::types::EntityRecord;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.upsert(EntityRecord::new("Task", "t1", json!({"id": "t1", "title": "Write docs"})))?;
//! assert!(backend.remove("Task", "t1")?);
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE entities (
//!     entity_type TEXT NOT NULL,
//!     id TEXT NOT NULL,
//!     data TEXT NOT NULL,  -- JSON document
//!     PRIMARY KEY (entity_type, id)
//! );
//!
//! CREATE TABLE schema_version (
//!     version INTEGER NOT NULL
//! );
//! ```
//!
//! Attributes are read with `json_extract(data, '$.path')`. Conditions on a
//! to-many relation run over `json_each(data, '$.relation')` inside an
//! `EXISTS` subquery.

mod backend;
mod query_builder;
mod schema;
mod search;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use query_builder::{SqlFragment, SqlParam};
pub use schema::SCHEMA_VERSION;
