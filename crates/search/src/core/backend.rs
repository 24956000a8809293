//! Backend abstraction.
//!
//! A backend contributes two things to a search: it turns resolved
//! attributes, operations and typed values into its own predicate type, and
//! it executes the final predicate as a paginated fetch and as a count.

use std::fmt::Debug;

use crate::error::SearchResult;
use crate::resolver::ResolvedAttribute;
use crate::types::{EntityRecord, SearchOperation, SortDirection, TypedValue};

/// Identifies the type of storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// In-process store over JSON documents.
    Memory,
    /// SQLite database (file-based or in-memory).
    Sqlite,
    /// Custom or unknown backend.
    Custom(&'static str),
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "memory"),
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Builds backend predicates.
///
/// Null handling follows SQL: comparisons involving a missing or null value
/// are false, `NOT IN` with a null element is false, `IN ()` is false and
/// `NOT IN ()` is true. Conditions on a to-many join hold when some related
/// entity satisfies them.
pub trait PredicateBuilder {
    /// The backend's predicate representation.
    type Predicate: Clone + Debug;

    /// A predicate matching every entity.
    fn match_all(&self) -> Self::Predicate;

    /// An atomic predicate comparing `attribute` with `value`.
    fn predicate(
        &self,
        attribute: &ResolvedAttribute,
        operation: SearchOperation,
        value: &TypedValue,
    ) -> SearchResult<Self::Predicate>;

    /// Conjunction; empty input matches everything.
    fn and(&self, predicates: Vec<Self::Predicate>) -> Self::Predicate;

    /// Disjunction; empty input matches nothing.
    fn or(&self, predicates: Vec<Self::Predicate>) -> Self::Predicate;
}

/// Sort order of a fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    /// Attribute to sort on.
    pub attribute: ResolvedAttribute,
    /// Direction.
    pub direction: SortDirection,
}

/// A paginated fetch.
#[derive(Debug, Clone)]
pub struct FetchQuery<'a, P> {
    /// Entity type to fetch.
    pub entity_type: &'a str,
    /// Filter.
    pub predicate: &'a P,
    /// Sort order.
    pub sort: &'a SortSpec,
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return.
    pub limit: u64,
    /// Attributes to keep in each record; `None` keeps whole documents.
    pub projection: Option<&'a [ResolvedAttribute]>,
}

/// A storage backend that can execute searches.
pub trait SearchBackend: PredicateBuilder + Send + Sync {
    /// Returns the kind of backend.
    fn kind(&self) -> BackendKind;

    /// Returns a human-readable name for this backend.
    fn name(&self) -> &'static str;

    /// Fetches one sorted page of matching records.
    fn fetch(&self, query: &FetchQuery<'_, Self::Predicate>) -> SearchResult<Vec<EntityRecord>>;

    /// Counts all matching records of `entity_type`.
    fn count(&self, entity_type: &str, predicate: &Self::Predicate) -> SearchResult<u64>;

    /// Fetches one page and counts every match.
    ///
    /// The default runs [`fetch`](Self::fetch) and [`count`](Self::count) as
    /// separate reads, so a concurrent write can make the two disagree.
    /// Backends that can read both from one snapshot override this.
    fn fetch_and_count(
        &self,
        query: &FetchQuery<'_, Self::Predicate>,
    ) -> SearchResult<(Vec<EntityRecord>, u64)> {
        let rows = self.fetch(query)?;
        let total = self.count(query.entity_type, query.predicate)?;
        Ok((rows, total))
    }
}

/// Write access used to load entities into a backend.
pub trait EntityStore {
    /// Inserts or replaces a record.
    fn upsert(&self, record: EntityRecord) -> SearchResult<()>;

    /// Removes a record, returning whether it existed.
    fn remove(&self, entity_type: &str, id: &str) -> SearchResult<bool>;

    /// Removes every record.
    fn clear(&self) -> SearchResult<()>;

    /// Inserts many records.
    fn upsert_all<I>(&self, records: I) -> SearchResult<()>
    where
        I: IntoIterator<Item = EntityRecord>,
        Self: Sized,
    {
        for record in records {
            self.upsert(record)?;
        }
        Ok(())
    }
}
