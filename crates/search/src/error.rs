//! Error types for the search engine.
//!
//! Errors are split by the stage that raises them: option validation,
//! attribute resolution, type coercion, group graph compilation, expression
//! parsing, metadata loading and storage. None of them are transient; a
//! failed search is never retried and never yields a partial result.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all search operations.
#[derive(Error, Debug)]
pub enum SearchError {
    /// A required query option is missing or invalid.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// An attribute path could not be resolved against the entity metadata.
    #[error("cannot resolve attribute '{path}' on {entity_type}: {reason}")]
    AttributeResolution {
        entity_type: String,
        path: String,
        reason: String,
    },

    /// A literal could not be converted to the resolved field's type.
    #[error("cannot convert '{value}' to {target_type} for field '{field}'")]
    TypeCoercion {
        field: String,
        target_type: String,
        value: String,
    },

    /// The group graph of a request is inconsistent.
    #[error("group resolution failed: {message}")]
    GroupResolution { message: String },

    /// The filter expression is malformed.
    #[error(transparent)]
    Syntax(#[from] QuerySyntaxError),

    /// Entity metadata could not be registered or loaded.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Backend-specific errors.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SearchError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        SearchError::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn group_resolution(message: impl Into<String>) -> Self {
        SearchError::GroupResolution {
            message: message.into(),
        }
    }

    pub(crate) fn attribute(
        entity_type: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        SearchError::AttributeResolution {
            entity_type: entity_type.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A malformed filter expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid query syntax: {message}")]
pub struct QuerySyntaxError {
    pub message: String,
}

impl QuerySyntaxError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors raised while building a metadata registry.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// An entity with the same name is already registered.
    #[error("entity type already registered: {name}")]
    DuplicateEntity { name: String },

    /// A field is declared twice on the same entity.
    #[error("field '{field}' declared twice on {entity_type}")]
    DuplicateField { entity_type: String, field: String },

    /// A type or field name is not a plain identifier.
    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// The metadata document could not be read.
    #[error("failed to load metadata: {message}")]
    Load { message: String },
}

/// Errors originating from the storage backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// The backend cannot express the requested predicate.
    #[error("operation '{operation}' not supported by {backend_name}: {message}")]
    UnsupportedOperation {
        backend_name: String,
        operation: String,
        message: String,
    },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type alias for search operations.
pub type SearchResult<T> = Result<T, SearchError>;

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Load {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for SearchError {
    fn from(err: rusqlite::Error) -> Self {
        SearchError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for SearchError {
    fn from(_err: r2d2::Error) -> Self {
        SearchError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}
