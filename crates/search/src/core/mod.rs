//! Storage traits.
//!
//! ```text
//! PredicateBuilder
//!     └── SearchBackend     (fetch, count)
//!
//! EntityStore                (upsert, remove, clear)
//! ```
//!
//! The [`SearchService`](crate::service::SearchService) is generic over
//! [`SearchBackend`]; [`EntityStore`] is only used to load data.

mod backend;

pub use backend::{
    BackendKind, EntityStore, FetchQuery, PredicateBuilder, SearchBackend, SortSpec,
};
