//! Core types of the search engine.
//!
//! - [`SearchRequest`] with its [`Criterion`], [`Group`] and [`MergedGroup`]
//!   parts
//! - [`Literal`] (untyped criterion value) and [`TypedValue`] (after
//!   coercion)
//! - [`QueryOptions`] for paging, sorting and projection
//! - [`SearchResponse`] and [`EntityRecord`]
//!
//! # Building a request
//!
//! ```
//! use trawl_search::types::{
//!     FINAL_GROUP, LogicalOperator, QueryOptions, SearchOperation, SearchRequest, SortDirection,
//! };
//!
//! let mut request = SearchRequest::new();
//! request.add_criterion("G1", LogicalOperator::And, "Task", "status", SearchOperation::Equals, "OPEN");
//! request.add_criterion("G2", LogicalOperator::And, "Task", "priority", SearchOperation::Greater, 2);
//! request.merge_group(FINAL_GROUP, LogicalOperator::Or, ["G1", "G2"]);
//!
//! let options = QueryOptions::new("Task")
//!     .with_page_size(20)
//!     .with_sort("priority", SortDirection::Desc);
//! assert!(options.validate().is_ok());
//! ```

mod criterion;
mod options;
mod request;
mod response;
mod value;

pub use criterion::{Criterion, Group, Literal, LogicalOperator, MergedGroup, SearchOperation};
pub use options::{QueryOptions, SortDirection, ValidatedOptions};
pub use request::{
    DELETED_FALSE_CRITERIA_GROUP, DELETED_FIELD, FINAL_GROUP, OWNER_ACCESS_GROUP, OWNER_ID_PATH,
    SearchRequest,
};
pub use response::{EntityRecord, SearchResponse};
pub use value::{DATE_FORMAT, DATETIME_FORMAT, TypedValue};
