//! Entity metadata.
//!
//! The resolver never inspects entities directly. It asks a
//! [`MetadataProvider`] for an [`EntityDescriptor`] by type name and walks
//! the declared [`FieldDescriptor`]s, following superclasses at most two
//! levels up.
//!
//! [`MetadataRegistry`] is the bundled provider. It is built in code or
//! loaded from JSON:
//!
//! ```
//! use trawl_search::metadata::{MetadataProvider, MetadataRegistry};
//!
//! let registry = MetadataRegistry::from_json_str(r#"{
//!     "entities": [
//!         { "name": "Base", "fields": [ { "name": "id", "kind": "uuid" } ] },
//!         {
//!             "name": "Task",
//!             "superclass": "Base",
//!             "fields": [
//!                 { "name": "title", "kind": "text" },
//!                 { "name": "status", "kind": "enum", "constants": ["OPEN", "DONE"] }
//!             ]
//!         }
//!     ]
//! }"#).unwrap();
//!
//! assert!(registry.find_field("Task", "id").is_some());
//! ```

mod registry;

pub use registry::MetadataRegistry;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of superclass levels searched after the declaring type.
pub const SUPERCLASS_LOOKUP_DEPTH: usize = 2;

/// Declared type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldType {
    /// Free text.
    Text,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    Long,
    /// Double precision float.
    Double,
    /// Arbitrary precision decimal.
    Decimal,
    /// Boolean.
    Boolean,
    /// UUID.
    Uuid,
    /// Calendar date.
    Date,
    /// Date and time.
    #[serde(rename = "datetime")]
    DateTime,
    /// Enumeration with named constants.
    Enum {
        /// Declared constant names.
        constants: Vec<String>,
    },
    /// A nested value object stored inline.
    Embedded {
        /// Entity type describing the nested object.
        type_name: String,
    },
    /// A relation to other entities.
    Relation {
        /// Related entity type.
        target: String,
        /// True for to-many relations stored as arrays.
        #[serde(default)]
        many: bool,
    },
}

impl FieldType {
    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Double => "double",
            FieldType::Decimal => "decimal",
            FieldType::Boolean => "boolean",
            FieldType::Uuid => "uuid",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Enum { .. } => "enum",
            FieldType::Embedded { .. } => "embedded",
            FieldType::Relation { .. } => "relation",
        }
    }

    /// Returns true for fields holding a single comparable value.
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldType::Embedded { .. } | FieldType::Relation { .. })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name, also its key in stored documents.
    pub name: String,
    /// Declared type.
    #[serde(flatten)]
    pub field_type: FieldType,
}

impl FieldDescriptor {
    /// Creates a field descriptor.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// The declared shape of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Type name.
    pub name: String,
    /// Parent type whose fields are inherited.
    #[serde(default)]
    pub superclass: Option<String>,
    /// Fields declared on this type only.
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    /// Creates a descriptor without fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            fields: Vec::new(),
        }
    }

    /// Sets the superclass.
    pub fn with_superclass(mut self, superclass: impl Into<String>) -> Self {
        self.superclass = Some(superclass.into());
        self
    }

    /// Declares a field.
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDescriptor::new(name, field_type));
        self
    }

    /// Looks up a field declared on this type.
    pub fn declared_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Source of entity metadata.
pub trait MetadataProvider: Send + Sync {
    /// Returns the descriptor for `type_name`.
    fn entity(&self, type_name: &str) -> Option<&EntityDescriptor>;

    /// Finds a field on `type_name`, then on its superclass and
    /// grand-superclass.
    fn find_field(&self, type_name: &str, field: &str) -> Option<&FieldDescriptor> {
        let mut current = self.entity(type_name)?;
        for level in 0..=SUPERCLASS_LOOKUP_DEPTH {
            if let Some(found) = current.declared_field(field) {
                return Some(found);
            }
            if level == SUPERCLASS_LOOKUP_DEPTH {
                break;
            }
            current = self.entity(current.superclass.as_deref()?)?;
        }
        None
    }

    /// Returns every field of `type_name` across its whole superclass chain,
    /// nearest declaration first.
    fn all_fields(&self, type_name: &str) -> Vec<&FieldDescriptor> {
        let mut fields = Vec::new();
        let mut seen_types = HashSet::new();
        let mut seen_fields = HashSet::new();
        let mut next = Some(type_name);

        while let Some(name) = next {
            if !seen_types.insert(name) {
                break;
            }
            let Some(entity) = self.entity(name) else {
                break;
            };
            for field in &entity.fields {
                if seen_fields.insert(field.name.as_str()) {
                    fields.push(field);
                }
            }
            next = entity.superclass.as_deref();
        }
        fields
    }
}

impl<T: MetadataProvider + ?Sized> MetadataProvider for std::sync::Arc<T> {
    fn entity(&self, type_name: &str) -> Option<&EntityDescriptor> {
        (**self).entity(type_name)
    }
}
