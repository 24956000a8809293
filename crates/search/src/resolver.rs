//! Attribute path resolution and literal coercion.
//!
//! A path is a dot-separated list of field names, optionally starting with a
//! bracketed relation:
//!
//! | Path | Meaning |
//! |------|---------|
//! | `status` | field on the entity |
//! | `Task.status` | same; a leading segment naming the entity is skipped |
//! | `profile.age` | `age` inside the embedded `profile` object |
//! | `[owners].id` | `id` on any related `owners` entity |
//!
//! Every segment but the last must name an embedded field. Relations may
//! only be traversed with the bracket syntax, and only as the first segment.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use crate::error::{SearchError, SearchResult};
use crate::metadata::{FieldDescriptor, FieldType, MetadataProvider};
use crate::types::{DATE_FORMAT, Literal, SearchOperation, TypedValue};

/// A join across a relation field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSegment {
    /// Relation field name on the owning entity.
    pub relation: String,
    /// Related entity type.
    pub target_type: String,
    /// True when the relation holds many entities.
    pub many: bool,
}

/// An attribute path resolved against entity metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttribute {
    /// Entity type the path was resolved from.
    pub owner_type: String,
    /// The join taken by a bracketed first segment.
    pub join: Option<JoinSegment>,
    /// Field names inside the joined entity, or inside the owner when there
    /// is no join.
    pub path: Vec<String>,
    /// The target field.
    pub field: FieldDescriptor,
}

impl ResolvedAttribute {
    /// Full path from the owner document for attributes without a to-many
    /// join; a to-one join is folded into the path.
    pub fn document_path(&self) -> Vec<&str> {
        let mut segments = Vec::with_capacity(self.path.len() + 1);
        if let Some(join) = &self.join {
            segments.push(join.relation.as_str());
        }
        segments.extend(self.path.iter().map(String::as_str));
        segments
    }

    /// Returns the to-many join, if any.
    pub fn many_join(&self) -> Option<&JoinSegment> {
        self.join.as_ref().filter(|j| j.many)
    }
}

impl std::fmt::Display for ResolvedAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(join) = &self.join {
            write!(f, "[{}].", join.relation)?;
        }
        write!(f, "{}", self.path.join("."))
    }
}

/// Resolves attribute paths and coerces literals using entity metadata.
#[derive(Clone, Copy)]
pub struct AttributeResolver<'a> {
    metadata: &'a dyn MetadataProvider,
}

impl<'a> AttributeResolver<'a> {
    /// Creates a resolver over `metadata`.
    pub fn new(metadata: &'a dyn MetadataProvider) -> Self {
        Self { metadata }
    }

    /// Resolves `path` against `entity_type`.
    pub fn resolve(&self, entity_type: &str, path: &str) -> SearchResult<ResolvedAttribute> {
        let fail = |reason: String| SearchError::attribute(entity_type, path, reason);

        let entity = self
            .metadata
            .entity(entity_type)
            .ok_or_else(|| fail(format!("unknown entity type '{}'", entity_type)))?;

        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(fail("empty attribute path".to_string()));
        }

        let Some(rest) = trimmed.strip_prefix('[') else {
            let mut segments = self.split_segments(entity_type, path, trimmed)?;
            if segments.len() > 1 && segments[0].eq_ignore_ascii_case(&entity.name) {
                segments.remove(0);
            }
            let (path, field) = self.walk(entity_type, path, &entity.name, &segments)?;
            return Ok(ResolvedAttribute {
                owner_type: entity.name.clone(),
                join: None,
                path,
                field,
            });
        };

        let (relation, remainder) = rest
            .split_once(']')
            .ok_or_else(|| fail("missing ']' after relation name".to_string()))?;
        let relation = relation.trim();
        let remainder = remainder
            .strip_prefix('.')
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| fail(format!("expected a field after '[{}]'", relation)))?;
        if remainder.contains('[') {
            return Err(fail("only one relation join is supported".to_string()));
        }

        let relation_field = self
            .metadata
            .find_field(&entity.name, relation)
            .ok_or_else(|| fail(format!("no relation '{}'", relation)))?;
        let FieldType::Relation { target, many } = &relation_field.field_type else {
            return Err(fail(format!(
                "'{}' is a {} field, not a relation",
                relation, relation_field.field_type
            )));
        };

        let segments = self.split_segments(entity_type, path, remainder)?;
        let (inner_path, field) = self.walk(entity_type, path, target, &segments)?;
        Ok(ResolvedAttribute {
            owner_type: entity.name.clone(),
            join: Some(JoinSegment {
                relation: relation.to_string(),
                target_type: target.clone(),
                many: *many,
            }),
            path: inner_path,
            field,
        })
    }

    fn split_segments<'p>(
        &self,
        entity_type: &str,
        path: &str,
        text: &'p str,
    ) -> SearchResult<Vec<&'p str>> {
        let segments: Vec<&str> = text.split('.').map(str::trim).collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(SearchError::attribute(entity_type, path, "empty path segment"));
        }
        Ok(segments)
    }

    fn walk(
        &self,
        entity_type: &str,
        path: &str,
        start_type: &str,
        segments: &[&str],
    ) -> SearchResult<(Vec<String>, FieldDescriptor)> {
        let mut current_type = start_type.to_string();
        let mut resolved = Vec::with_capacity(segments.len());

        for (index, segment) in segments.iter().enumerate() {
            let field = self.metadata.find_field(&current_type, segment).ok_or_else(|| {
                SearchError::attribute(
                    entity_type,
                    path,
                    format!("no field '{}' on {}", segment, current_type),
                )
            })?;
            resolved.push(field.name.clone());

            if index + 1 == segments.len() {
                return Ok((resolved, field.clone()));
            }

            current_type = match &field.field_type {
                FieldType::Embedded { type_name } => type_name.clone(),
                FieldType::Relation { .. } => {
                    return Err(SearchError::attribute(
                        entity_type,
                        path,
                        format!("relation '{}' must be joined as [{}]", segment, segment),
                    ));
                }
                other => {
                    return Err(SearchError::attribute(
                        entity_type,
                        path,
                        format!("cannot traverse {} field '{}'", other, segment),
                    ));
                }
            };
        }

        Err(SearchError::attribute(entity_type, path, "empty attribute path"))
    }

    /// Converts `value` into the right shape for `operation` on `field`.
    ///
    /// - null checks ignore the value and yield `Null`
    /// - membership operations coerce every element
    /// - pattern operations keep the value as text
    /// - everything else is a scalar coercion
    pub fn coerce_for(
        operation: SearchOperation,
        value: &Literal,
        field: &FieldDescriptor,
    ) -> SearchResult<TypedValue> {
        if operation.is_null_check() {
            return Ok(TypedValue::Null);
        }
        if !field.field_type.is_scalar() {
            return Err(coercion_error(field, value));
        }
        if operation.is_membership() {
            return Self::coerce_many(value, field);
        }
        if operation.is_pattern() {
            return match value {
                Literal::Null => Ok(TypedValue::Null),
                other => other
                    .scalar_text()
                    .map(TypedValue::Text)
                    .ok_or_else(|| coercion_error(field, value)),
            };
        }
        Self::coerce(value, field)
    }

    /// Coerces a scalar literal into the native type of `field`.
    pub fn coerce(value: &Literal, field: &FieldDescriptor) -> SearchResult<TypedValue> {
        if value.is_null() {
            return Ok(TypedValue::Null);
        }
        let text = value
            .scalar_text()
            .ok_or_else(|| coercion_error(field, value))?;
        coerce_text(&text, field).ok_or_else(|| coercion_error(field, value))
    }

    /// Coerces a list literal, a comma-separated string or a single scalar
    /// element by element. Order and duplicates are kept.
    pub fn coerce_many(value: &Literal, field: &FieldDescriptor) -> SearchResult<TypedValue> {
        let items = match value {
            Literal::List(items) => items
                .iter()
                .map(|item| Self::coerce(item, field))
                .collect::<SearchResult<Vec<_>>>()?,
            Literal::Text(text) => text
                .split(',')
                .map(|part| Self::coerce(&Literal::Text(part.trim().to_string()), field))
                .collect::<SearchResult<Vec<_>>>()?,
            scalar => vec![Self::coerce(scalar, field)?],
        };
        Ok(TypedValue::List(items))
    }
}

fn coercion_error(field: &FieldDescriptor, value: &Literal) -> SearchError {
    SearchError::TypeCoercion {
        field: field.name.clone(),
        target_type: field.field_type.to_string(),
        value: value.to_string(),
    }
}

fn coerce_text(text: &str, field: &FieldDescriptor) -> Option<TypedValue> {
    let trimmed = text.trim();
    let value = match &field.field_type {
        FieldType::Text => TypedValue::Text(text.to_string()),
        FieldType::Integer => TypedValue::Integer(trimmed.parse().ok()?),
        FieldType::Long => TypedValue::Long(trimmed.parse().ok()?),
        FieldType::Double => TypedValue::Double(trimmed.parse().ok()?),
        FieldType::Decimal => TypedValue::Decimal(Decimal::from_str(trimmed).ok()?),
        FieldType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" => TypedValue::Bool(true),
            "false" => TypedValue::Bool(false),
            _ => return None,
        },
        FieldType::Uuid => TypedValue::Uuid(Uuid::parse_str(trimmed).ok()?),
        FieldType::Date => TypedValue::Date(NaiveDate::parse_from_str(trimmed, DATE_FORMAT).ok()?),
        FieldType::DateTime => TypedValue::DateTime(parse_datetime(trimmed)?),
        FieldType::Enum { constants } => match constants.iter().find(|c| c.as_str() == trimmed) {
            Some(constant) => TypedValue::Enum(constant.clone()),
            None => {
                warn!(
                    field = %field.name,
                    value = %trimmed,
                    "No enum constant matches query value, comparing against null"
                );
                TypedValue::Null
            }
        },
        FieldType::Embedded { .. } | FieldType::Relation { .. } => return None,
    };
    Some(value)
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
