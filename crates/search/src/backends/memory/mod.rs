//! In-process backend over JSON documents.
//!
//! Records are kept per entity type in insertion order behind a
//! `parking_lot::RwLock`. Predicates are [`MemoryPredicate`] trees evaluated
//! document by document, so every fetch and count is a full scan of the
//! entity type.

mod predicate;

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::debug;

use super::insert_path;
use crate::core::{BackendKind, EntityStore, FetchQuery, PredicateBuilder, SearchBackend};
use crate::error::SearchResult;
use crate::resolver::ResolvedAttribute;
use crate::types::{EntityRecord, SearchOperation, SortDirection, TypedValue};

pub use predicate::{LikePattern, MemoryPredicate, Target};

use predicate::{lookup, sort_order};

/// Backend holding every record in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<String, Vec<EntityRecord>>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records of `entity_type`.
    pub fn len(&self, entity_type: &str) -> usize {
        self.records.read().get(entity_type).map_or(0, Vec::len)
    }

    /// Returns true if no records of any type are stored.
    pub fn is_empty(&self) -> bool {
        self.records.read().values().all(Vec::is_empty)
    }
}

impl PredicateBuilder for MemoryBackend {
    type Predicate = MemoryPredicate;

    fn match_all(&self) -> MemoryPredicate {
        MemoryPredicate::All
    }

    fn predicate(
        &self,
        attribute: &ResolvedAttribute,
        operation: SearchOperation,
        value: &TypedValue,
    ) -> SearchResult<MemoryPredicate> {
        MemoryPredicate::compare(attribute, operation, value)
    }

    fn and(&self, predicates: Vec<MemoryPredicate>) -> MemoryPredicate {
        MemoryPredicate::And(predicates)
    }

    fn or(&self, predicates: Vec<MemoryPredicate>) -> MemoryPredicate {
        MemoryPredicate::Or(predicates)
    }
}

impl SearchBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn fetch(&self, query: &FetchQuery<'_, MemoryPredicate>) -> SearchResult<Vec<EntityRecord>> {
        let records = self.records.read();
        let (page, _) = search_page(records.get(query.entity_type), query);
        Ok(page)
    }

    fn count(&self, entity_type: &str, predicate: &MemoryPredicate) -> SearchResult<u64> {
        let records = self.records.read();
        let count = records
            .get(entity_type)
            .map_or(0, |r| r.iter().filter(|r| predicate.matches(&r.data)).count());
        Ok(count as u64)
    }

    fn fetch_and_count(
        &self,
        query: &FetchQuery<'_, MemoryPredicate>,
    ) -> SearchResult<(Vec<EntityRecord>, u64)> {
        // one guard, so no write lands between the page and the count
        let records = self.records.read();
        Ok(search_page(records.get(query.entity_type), query))
    }
}

/// Filters, sorts and pages `records`; returns the page and the match count.
fn search_page(
    records: Option<&Vec<EntityRecord>>,
    query: &FetchQuery<'_, MemoryPredicate>,
) -> (Vec<EntityRecord>, u64) {
    let Some(records) = records else {
        return (Vec::new(), 0);
    };

    let mut matched: Vec<&EntityRecord> = records
        .iter()
        .filter(|r| query.predicate.matches(&r.data))
        .collect();
    let total = matched.len() as u64;

    let sort_path = query.sort.attribute.document_path();
    matched.sort_by(|a, b| {
        let ordering = sort_order(lookup(&a.data, &sort_path), lookup(&b.data, &sort_path));
        match query.sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    let offset = usize::try_from(query.offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
    let page: Vec<EntityRecord> = matched
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(|record| match query.projection {
            Some(attributes) => project(record, attributes),
            None => record.clone(),
        })
        .collect();

    debug!(
        entity_type = query.entity_type,
        offset = query.offset,
        rows = page.len(),
        total,
        "Searched memory records"
    );
    (page, total)
}

impl EntityStore for MemoryBackend {
    fn upsert(&self, record: EntityRecord) -> SearchResult<()> {
        let mut records = self.records.write();
        let records = records.entry(record.entity_type.clone()).or_default();
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(())
    }

    fn remove(&self, entity_type: &str, id: &str) -> SearchResult<bool> {
        let mut records = self.records.write();
        let Some(records) = records.get_mut(entity_type) else {
            return Ok(false);
        };
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }

    fn clear(&self) -> SearchResult<()> {
        self.records.write().clear();
        Ok(())
    }
}

/// Copies `id` and the projected attributes into a new document, keeping
/// their nesting.
fn project(record: &EntityRecord, attributes: &[ResolvedAttribute]) -> EntityRecord {
    let mut data = Map::new();
    if let Some(id) = record.data.get("id") {
        data.insert("id".to_string(), id.clone());
    }

    for attribute in attributes {
        let path = attribute.document_path();
        let value = lookup(&record.data, &path);
        if !value.is_null() {
            insert_path(&mut data, &path, value.clone());
        }
    }

    EntityRecord::new(record.entity_type.clone(), record.id.clone(), Value::Object(data))
}
