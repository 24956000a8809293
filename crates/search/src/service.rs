//! The search service.
//!
//! [`SearchService`] evaluates a [`SearchRequest`] against a
//! [`SearchBackend`]:
//!
//! 1. validate the [`QueryOptions`]
//! 2. compile the group graph into a [`FilterExpr`]
//! 3. resolve and coerce every criterion, group by group, caching each
//!    criterion's predicate for the duration of the call
//! 4. fold the tree into one backend predicate
//! 5. fetch one sorted page and count all matches in one backend call, or
//!    only count
//!
//! Any failure aborts the search; no partial result is returned.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use trawl_search::backends::memory::MemoryBackend;
//! use trawl_search::core::EntityStore;
//! use trawl_search::metadata::{EntityDescriptor, FieldType, MetadataRegistry};
//! use trawl_search::service::SearchService;
//! use trawl_search::types::{EntityRecord, QueryOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = MetadataRegistry::new();
//! registry.register(
//!     EntityDescriptor::new("Task")
//!         .field("id", FieldType::Text)
//!         .field("priority", FieldType::Integer),
//! )?;
//!
//! let backend = MemoryBackend::new();
//! backend.upsert(EntityRecord::new("Task", "a", json!({"id": "a", "priority": 1})))?;
//! backend.upsert(EntityRecord::new("Task", "b", json!({"id": "b", "priority": 5})))?;
//!
//! let service = SearchService::new(backend, Arc::new(registry));
//! let request = service.parser().parse("priority > 2", "Task")?;
//! let response = service.search(&request, &QueryOptions::new("Task"))?;
//!
//! assert_eq!(response.total_count, 1);
//! assert_eq!(response.rows[0].id, "b");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::core::{FetchQuery, SearchBackend, SortSpec};
use crate::error::{SearchError, SearchResult};
use crate::metadata::MetadataProvider;
use crate::parser::ExpressionParser;
use crate::plan::FilterExpr;
use crate::resolver::{AttributeResolver, ResolvedAttribute};
use crate::scope::RequestScope;
use crate::types::{
    Criterion, EntityRecord, QueryOptions, SearchOperation, SearchRequest,
    SearchResponse, TypedValue, ValidatedOptions,
};

/// Evaluates search requests against a backend.
///
/// The service holds no per-search state; one instance can serve concurrent
/// searches when its backend is `Sync`.
pub struct SearchService<B: SearchBackend> {
    backend: B,
    metadata: Arc<dyn MetadataProvider>,
    config: SearchConfig,
}

impl<B: SearchBackend> std::fmt::Debug for SearchService<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchService")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<B: SearchBackend> SearchService<B> {
    /// Creates a service with the default configuration.
    pub fn new(backend: B, metadata: Arc<dyn MetadataProvider>) -> Self {
        Self::with_config(backend, metadata, SearchConfig::default())
    }

    /// Creates a service with a custom configuration.
    pub fn with_config(
        backend: B,
        metadata: Arc<dyn MetadataProvider>,
        config: SearchConfig,
    ) -> Self {
        Self {
            backend,
            metadata,
            config,
        }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the metadata provider.
    pub fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Returns a parser configured like this service.
    pub fn parser(&self) -> ExpressionParser {
        ExpressionParser::from_config(&self.config)
    }

    /// Options for `entity_type` with this service's defaults.
    pub fn options(&self, entity_type: impl Into<String>) -> QueryOptions {
        QueryOptions::from_config(entity_type, &self.config)
    }

    /// Runs a search and returns one page plus the total match count.
    ///
    /// The page and the count come from one
    /// [`fetch_and_count`](SearchBackend::fetch_and_count) call, so they agree
    /// whenever the backend reads both from one snapshot.
    pub fn search(
        &self,
        request: &SearchRequest,
        options: &QueryOptions,
    ) -> SearchResult<SearchResponse> {
        self.execute(request, options).inspect_err(|err| {
            warn!(
                entity_type = options.entity_type.as_deref().unwrap_or_default(),
                error = %err,
                "Search failed"
            );
        })
    }

    /// Applies `scope` to `request`, then searches.
    pub fn search_scoped(
        &self,
        request: SearchRequest,
        options: &QueryOptions,
        scope: &RequestScope,
    ) -> SearchResult<SearchResponse> {
        let entity_type = options
            .entity_type
            .as_deref()
            .ok_or_else(|| SearchError::configuration("entity type is required"))?;
        let scoped = scope.apply(request, entity_type, self.metadata());
        self.search(&scoped, options)
    }

    /// Counts the entities of `entity_type` matching `request`.
    pub fn count(&self, request: &SearchRequest, entity_type: &str) -> SearchResult<u64> {
        let options = self.options(entity_type).count_only();
        Ok(self.search(request, &options)?.total_count)
    }

    /// Loads the entity with `id`, if exactly one matches.
    pub fn find_by_id(&self, entity_type: &str, id: &str) -> SearchResult<Option<EntityRecord>> {
        let mut request = SearchRequest::new();
        request.add_id_equals_criteria("ID_EQUALS_GROUP", entity_type, id);
        let options = self.options(entity_type).with_page_size(2);

        let response = self.search(&request, &options)?;
        if response.total_count != 1 {
            debug!(
                entity_type,
                id,
                found = response.total_count,
                "Lookup by id did not match exactly one entity"
            );
            return Ok(None);
        }
        Ok(response.rows.into_iter().next())
    }

    /// Builds the backend predicate for `request` over `entity_type`.
    pub fn build_predicate(
        &self,
        request: &SearchRequest,
        entity_type: &str,
    ) -> SearchResult<B::Predicate> {
        let tree = FilterExpr::compile(request)?;
        let mut evaluation = Evaluation::new(self, entity_type);
        evaluation.resolve_groups(request)?;
        Ok(evaluation.fold(&tree))
    }

    fn execute(
        &self,
        request: &SearchRequest,
        options: &QueryOptions,
    ) -> SearchResult<SearchResponse> {
        let options = options.validate()?;
        let entity_type = options.entity_type.as_str();
        debug!(
            entity_type,
            groups = request.groups().len(),
            criteria = request.criteria().len(),
            merged_groups = request.merged_groups().len(),
            page = options.page,
            page_size = options.page_size,
            "Executing search"
        );

        let predicate = self.build_predicate(request, entity_type)?;

        let (rows, total_count) = if options.count_only {
            (Vec::new(), self.backend.count(entity_type, &predicate)?)
        } else {
            self.fetch_page(&options, &predicate)?
        };

        debug!(entity_type, rows = rows.len(), total_count, "Search complete");
        Ok(SearchResponse {
            rows,
            total_count,
            page: options.page,
            page_size: options.page_size,
        })
    }

    fn fetch_page(
        &self,
        options: &ValidatedOptions,
        predicate: &B::Predicate,
    ) -> SearchResult<(Vec<EntityRecord>, u64)> {
        let entity_type = options.entity_type.as_str();
        let resolver = AttributeResolver::new(self.metadata());

        let sort = SortSpec {
            attribute: self.plain_attribute(&resolver, entity_type, &options.sort_field, "sort")?,
            direction: options.sort_direction,
        };
        let projection = options
            .projection
            .as_ref()
            .map(|fields| {
                fields
                    .iter()
                    .map(|f| self.plain_attribute(&resolver, entity_type, f, "projection"))
                    .collect::<SearchResult<Vec<_>>>()
            })
            .transpose()?;

        self.backend.fetch_and_count(&FetchQuery {
            entity_type,
            predicate,
            sort: &sort,
            offset: options.offset(),
            limit: u64::from(options.page_size),
            projection: projection.as_deref(),
        })
    }

    fn plain_attribute(
        &self,
        resolver: &AttributeResolver<'_>,
        entity_type: &str,
        path: &str,
        purpose: &str,
    ) -> SearchResult<ResolvedAttribute> {
        let attribute = resolver.resolve(entity_type, path)?;
        if attribute.join.is_some() {
            return Err(SearchError::configuration(format!(
                "{} field '{}' cannot traverse a relation",
                purpose, path
            )));
        }
        if !attribute.field.field_type.is_scalar() && purpose == "sort" {
            return Err(SearchError::configuration(format!(
                "sort field '{}' is a {} field",
                path, attribute.field.field_type
            )));
        }
        Ok(attribute)
    }
}

/// State for one evaluation: the per-criterion predicate cache.
struct Evaluation<'s, B: SearchBackend> {
    service: &'s SearchService<B>,
    resolver: AttributeResolver<'s>,
    entity_type: &'s str,
    predicates: HashMap<String, B::Predicate>,
}

impl<'s, B: SearchBackend> Evaluation<'s, B> {
    fn new(service: &'s SearchService<B>, entity_type: &'s str) -> Self {
        Self {
            service,
            resolver: AttributeResolver::new(service.metadata()),
            entity_type,
            predicates: HashMap::new(),
        }
    }

    fn resolve_groups(&mut self, request: &SearchRequest) -> SearchResult<()> {
        for group in request.groups() {
            for criterion_id in &group.criteria_ids {
                if self.predicates.contains_key(criterion_id) {
                    continue;
                }
                let criterion = request.criterion(criterion_id).ok_or_else(|| {
                    SearchError::group_resolution(format!(
                        "group '{}' references unknown criterion '{}'",
                        group.id, criterion_id
                    ))
                })?;
                let predicate = self.criterion_predicate(criterion)?;
                self.predicates.insert(criterion_id.clone(), predicate);
            }
        }
        Ok(())
    }

    fn criterion_predicate(&self, criterion: &Criterion) -> SearchResult<B::Predicate> {
        if !criterion.entity_type.is_empty()
            && !criterion.entity_type.eq_ignore_ascii_case(self.entity_type)
        {
            return Err(SearchError::attribute(
                &criterion.entity_type,
                &criterion.attribute_path,
                format!(
                    "criterion targets {} but the search is over {}",
                    criterion.entity_type, self.entity_type
                ),
            ));
        }

        let attribute = self
            .resolver
            .resolve(self.entity_type, &criterion.attribute_path)?;
        let value =
            AttributeResolver::coerce_for(criterion.operation, &criterion.value, &attribute.field)?;
        let value = self.pattern_value(criterion.operation, value);

        debug!(
            criterion = %criterion.id,
            attribute = %attribute,
            operation = %criterion.operation,
            value = %value,
            "Resolved criterion"
        );
        self.service
            .backend
            .predicate(&attribute, criterion.operation, &value)
    }

    fn pattern_value(&self, operation: SearchOperation, value: TypedValue) -> TypedValue {
        match value {
            TypedValue::Text(text)
                if operation.is_pattern()
                    && self.service.config.wrap_like_values
                    && !text.contains('%') =>
            {
                TypedValue::Text(format!("%{}%", text))
            }
            other => other,
        }
    }

    fn fold(&self, expr: &FilterExpr) -> B::Predicate {
        let backend = &self.service.backend;
        match expr {
            FilterExpr::All => backend.match_all(),
            FilterExpr::Criterion(id) => match self.predicates.get(id) {
                Some(predicate) => predicate.clone(),
                // compile() rejects unknown criteria and every group was resolved
                None => backend.or(Vec::new()),
            },
            FilterExpr::And(children) => {
                backend.and(children.iter().map(|c| self.fold(c)).collect())
            }
            FilterExpr::Or(children) => backend.or(children.iter().map(|c| self.fold(c)).collect()),
        }
    }
}
