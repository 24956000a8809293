//! Layering of ownership and soft-delete filters onto a request.
//!
//! Scoping builds a base request holding the standalone groups
//! [`OWNER_ACCESS_GROUP`] and [`DELETED_FALSE_CRITERIA_GROUP`], then merges
//! the caller's request into it. Standalone groups are ANDed onto the
//! caller's tree during evaluation.
//!
//! The scope only narrows requests that leave the reserved group ids alone.
//! A group referenced by a merged group is no longer standalone, so a caller
//! whose tree names [`DELETED_FALSE_CRITERIA_GROUP`] or
//! [`OWNER_ACCESS_GROUP`] decides how it combines, and can widen past it. A
//! request that already carries [`OWNER_ACCESS_GROUP`] keeps its own owner
//! group. Callers that accept untrusted requests must reject those ids first.
//!
//! [`DELETED_FALSE_CRITERIA_GROUP`]: crate::types::DELETED_FALSE_CRITERIA_GROUP

use tracing::debug;
use uuid::Uuid;

use crate::metadata::{FieldType, MetadataProvider};
use crate::types::{DELETED_FIELD, OWNER_ACCESS_GROUP, SearchRequest};

/// Relation holding the owners of an entity.
pub const OWNERS_RELATION: &str = "owners";

/// Who is searching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestScope {
    /// The calling user; `None` disables owner filtering.
    pub user_id: Option<Uuid>,
}

impl RequestScope {
    /// Scope for `user_id`.
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    /// Scope without an owner restriction.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Returns `request` with the scope's groups layered on.
    ///
    /// - the owner access group is added when a user is set, the request
    ///   allows owner criteria, does not already carry the group, and the
    ///   entity has an `owners` relation
    /// - the soft-delete group is added when the entity has a `deleted`
    ///   boolean field
    pub fn apply(
        &self,
        request: SearchRequest,
        entity_type: &str,
        metadata: &dyn MetadataProvider,
    ) -> SearchRequest {
        let mut scoped = SearchRequest::new();
        scoped.set_add_owner_criterion(request.is_add_owner_criterion());

        if let Some(user_id) = self.user_id {
            let owned = matches!(
                metadata.find_field(entity_type, OWNERS_RELATION).map(|f| &f.field_type),
                Some(FieldType::Relation { .. })
            );
            if !owned {
                debug!(entity_type, "Entity has no owners relation, skipping owner scope");
            } else if request.contains_group(OWNER_ACCESS_GROUP) {
                debug!(entity_type, "Request already carries an owner scope");
            } else {
                scoped.add_owner_access_criteria(entity_type, user_id);
            }
        }

        let soft_deletable = matches!(
            metadata.find_field(entity_type, DELETED_FIELD).map(|f| &f.field_type),
            Some(FieldType::Boolean)
        );
        if soft_deletable {
            scoped.add_deleted_false_criteria(entity_type);
        }

        scoped.merge(request);
        scoped
    }
}
