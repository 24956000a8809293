//! # trawl-search
//!
//! A filter expression language and query evaluator over entities described
//! by runtime metadata.
//!
//! ## Overview
//!
//! A search goes through four stages:
//!
//! 1. **Request model** ([`types`]): a [`SearchRequest`] holds criteria
//!    (attribute, operation, untyped value), groups of criteria joined by one
//!    operator, and merged groups nesting other groups. The root merged group
//!    is [`FINAL_GROUP`](types::FINAL_GROUP); groups outside the tree are
//!    ANDed onto it.
//! 2. **Expression parser** ([`parser`]): compiles text such as
//!    `status = 'OPEN' & (priority > 2 | [owners].id = '...')` into a request.
//! 3. **Attribute resolution** ([`resolver`]): resolves attribute paths
//!    against a [`MetadataProvider`] and coerces literals to the field types.
//! 4. **Evaluation** ([`service`]): folds the request into one backend
//!    predicate and runs a paginated fetch plus a count.
//!
//! ## Backends
//!
//! | Backend | Feature | Notes |
//! |---------|---------|-------|
//! | [`backends::memory::MemoryBackend`] | always | scans JSON documents |
//! | `backends::sqlite::SqliteBackend` | `sqlite` (default) | JSON documents in SQLite |
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use trawl_search::backends::memory::MemoryBackend;
//! use trawl_search::core::EntityStore;
//! use trawl_search::metadata::{EntityDescriptor, FieldType, MetadataRegistry};
//! use trawl_search::types::{EntityRecord, SortDirection};
//! use trawl_search::SearchService;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = MetadataRegistry::new();
//! registry.register(
//!     EntityDescriptor::new("Issue")
//!         .field("id", FieldType::Text)
//!         .field("title", FieldType::Text)
//!         .field("status", FieldType::Enum { constants: vec!["OPEN".into(), "CLOSED".into()] }),
//! )?;
//!
//! let backend = MemoryBackend::new();
//! backend.upsert(EntityRecord::new("Issue", "1", json!({"id": "1", "title": "Crash on start", "status": "OPEN"})))?;
//! backend.upsert(EntityRecord::new("Issue", "2", json!({"id": "2", "title": "Typo", "status": "CLOSED"})))?;
//!
//! let service = SearchService::new(backend, Arc::new(registry));
//! let request = service.parser().parse("status = 'OPEN' | title ~ 'typo'", "Issue")?;
//! let options = service.options("Issue").with_sort("title", SortDirection::Desc);
//! let response = service.search(&request, &options)?;
//!
//! assert_eq!(response.total_count, 2);
//! assert_eq!(response.rows[0].id, "2");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod core;
pub mod error;
pub mod metadata;
pub mod parser;
pub mod plan;
pub mod resolver;
pub mod scope;
pub mod service;
pub mod types;

// Re-export commonly used types at crate root
pub use config::SearchConfig;
pub use error::{BackendError, MetadataError, QuerySyntaxError, SearchError, SearchResult};
pub use metadata::{MetadataProvider, MetadataRegistry};
pub use parser::ExpressionParser;
pub use scope::RequestScope;
pub use service::SearchService;
pub use types::{QueryOptions, SearchRequest, SearchResponse};

// Re-export core traits
pub use core::{EntityStore, PredicateBuilder, SearchBackend};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise this crate logs at `level`
/// (error, warn, info, debug, trace). Call once at startup.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("trawl_search={}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
