//! Test harness for running the same scenarios against every backend.
//!
//! [`TestContext`] wraps the backend in a [`CountingBackend`] so tests can
//! assert that failing searches never reach storage.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use trawl_search::backends::memory::MemoryBackend;
use trawl_search::core::{BackendKind, EntityStore, FetchQuery, PredicateBuilder, SearchBackend};
use trawl_search::error::SearchResult;
use trawl_search::resolver::ResolvedAttribute;
use trawl_search::types::{
    EntityRecord, QueryOptions, SearchOperation, SearchRequest, SearchResponse, TypedValue,
};
use trawl_search::{SearchConfig, SearchService};

use super::fixtures;

/// A backend the scenario suite can create and seed.
pub trait TestableBackend: SearchBackend + EntityStore + Sized {
    /// Creates an empty backend.
    fn create() -> Self;
}

impl TestableBackend for MemoryBackend {
    fn create() -> Self {
        MemoryBackend::new()
    }
}

#[cfg(feature = "sqlite")]
impl TestableBackend for trawl_search::backends::sqlite::SqliteBackend {
    fn create() -> Self {
        Self::in_memory().expect("Failed to create SQLite backend")
    }
}

/// Delegates to `B`, counting storage calls.
pub struct CountingBackend<B> {
    inner: B,
    fetches: AtomicUsize,
    counts: AtomicUsize,
}

impl<B> CountingBackend<B> {
    /// Wraps `inner`.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            fetches: AtomicUsize::new(0),
            counts: AtomicUsize::new(0),
        }
    }

    /// Fetches plus counts issued so far.
    pub fn storage_calls(&self) -> usize {
        self.fetches.load(Ordering::SeqCst) + self.counts.load(Ordering::SeqCst)
    }

    /// Fetches issued so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl<B: SearchBackend> PredicateBuilder for CountingBackend<B> {
    type Predicate = B::Predicate;

    fn match_all(&self) -> Self::Predicate {
        self.inner.match_all()
    }

    fn predicate(
        &self,
        attribute: &ResolvedAttribute,
        operation: SearchOperation,
        value: &TypedValue,
    ) -> SearchResult<Self::Predicate> {
        self.inner.predicate(attribute, operation, value)
    }

    fn and(&self, predicates: Vec<Self::Predicate>) -> Self::Predicate {
        self.inner.and(predicates)
    }

    fn or(&self, predicates: Vec<Self::Predicate>) -> Self::Predicate {
        self.inner.or(predicates)
    }
}

impl<B: SearchBackend> SearchBackend for CountingBackend<B> {
    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn fetch(&self, query: &FetchQuery<'_, Self::Predicate>) -> SearchResult<Vec<EntityRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(query)
    }

    fn count(&self, entity_type: &str, predicate: &Self::Predicate) -> SearchResult<u64> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        self.inner.count(entity_type, predicate)
    }

    fn fetch_and_count(
        &self,
        query: &FetchQuery<'_, Self::Predicate>,
    ) -> SearchResult<(Vec<EntityRecord>, u64)> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.counts.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_and_count(query)
    }
}

/// A seeded service over a counting backend.
pub struct TestContext<B: SearchBackend> {
    /// The service under test.
    pub service: SearchService<CountingBackend<B>>,
}

impl<B: TestableBackend> TestContext<B> {
    /// Creates a backend seeded with the fixture tasks and log entries.
    pub fn seeded() -> Self {
        Self::with_config(SearchConfig::default())
    }

    /// Like [`TestContext::seeded`] with a custom configuration.
    pub fn with_config(config: SearchConfig) -> Self {
        super::init_tracing();
        let backend = B::create();
        backend.upsert_all(fixtures::tasks()).expect("Failed to seed tasks");
        backend
            .upsert_all(fixtures::log_entries())
            .expect("Failed to seed log entries");

        Self {
            service: SearchService::with_config(
                CountingBackend::new(backend),
                Arc::new(fixtures::registry()),
                config,
            ),
        }
    }
}

impl<B: SearchBackend> TestContext<B> {
    /// Parses `query` against `entity_type`.
    pub fn parse(&self, query: &str, entity_type: &str) -> SearchRequest {
        self.service
            .parser()
            .parse(query, entity_type)
            .unwrap_or_else(|e| panic!("Failed to parse {:?}: {}", query, e))
    }

    /// Parses and runs `query` with default options.
    pub fn query(&self, query: &str, entity_type: &str) -> SearchResponse {
        let request = self.parse(query, entity_type);
        self.service
            .search(&request, &self.service.options(entity_type))
            .unwrap_or_else(|e| panic!("Search {:?} failed: {}", query, e))
    }

    /// Parses and runs `query`, returning the ids sorted.
    pub fn query_ids(&self, query: &str, entity_type: &str) -> Vec<String> {
        sorted_ids(&self.query(query, entity_type))
    }

    /// Runs `request` with `options`.
    pub fn search(
        &self,
        request: &SearchRequest,
        options: &QueryOptions,
    ) -> SearchResult<SearchResponse> {
        self.service.search(request, options)
    }

    /// Storage calls issued so far.
    pub fn storage_calls(&self) -> usize {
        self.service.backend().storage_calls()
    }
}

/// Ids of a response in row order.
pub fn ids(response: &SearchResponse) -> Vec<String> {
    response.rows.iter().map(|r| r.id.clone()).collect()
}

/// Ids of a response, sorted.
pub fn sorted_ids(response: &SearchResponse) -> Vec<String> {
    let mut ids = ids(response);
    ids.sort();
    ids
}
