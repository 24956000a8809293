//! In-memory metadata registry.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::MetadataError;

use super::{EntityDescriptor, MetadataProvider};

/// A [`MetadataProvider`] backed by a map of entity descriptors.
///
/// Type and field names must be plain identifiers (ASCII letters, digits
/// and `_`, not starting with a digit) because they end up in JSON paths.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entities: HashMap<String, EntityDescriptor>,
}

#[derive(Deserialize)]
struct RegistryDocument {
    entities: Vec<EntityDescriptor>,
}

impl MetadataRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type.
    pub fn register(&mut self, entity: EntityDescriptor) -> Result<(), MetadataError> {
        validate_identifier(&entity.name)?;
        if let Some(superclass) = &entity.superclass {
            validate_identifier(superclass)?;
        }

        let mut seen = HashSet::new();
        for field in &entity.fields {
            validate_identifier(&field.name)?;
            if !seen.insert(field.name.as_str()) {
                return Err(MetadataError::DuplicateField {
                    entity_type: entity.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        if self.entities.contains_key(&entity.name) {
            return Err(MetadataError::DuplicateEntity { name: entity.name });
        }

        tracing::debug!(
            entity_type = %entity.name,
            fields = entity.fields.len(),
            "Registered entity metadata"
        );
        self.entities.insert(entity.name.clone(), entity);
        Ok(())
    }

    /// Builds a registry from a JSON document of the form
    /// `{ "entities": [ ... ] }`.
    pub fn from_json_str(json: &str) -> Result<Self, MetadataError> {
        let document: RegistryDocument =
            serde_json::from_str(json).map_err(|e| MetadataError::Load {
                message: e.to_string(),
            })?;

        let mut registry = Self::new();
        for entity in document.entities {
            registry.register(entity)?;
        }
        Ok(registry)
    }

    /// Reads a registry from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MetadataError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Number of registered entity types.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity type is registered.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns the registered type names, sorted.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl MetadataProvider for MetadataRegistry {
    fn entity(&self, type_name: &str) -> Option<&EntityDescriptor> {
        self.entities.get(type_name)
    }
}

fn validate_identifier(name: &str) -> Result<(), MetadataError> {
    let invalid = |reason: &str| MetadataError::InvalidIdentifier {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid("empty name")),
        Some(c) if c.is_ascii_digit() => return Err(invalid("starts with a digit")),
        _ => {}
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("only ASCII letters, digits and '_' are allowed"));
    }
    Ok(())
}
