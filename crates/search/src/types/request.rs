//! The search request aggregate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SearchError, SearchResult};

use super::criterion::{Criterion, Group, Literal, LogicalOperator, MergedGroup, SearchOperation};

/// Id of the merged group that roots evaluation.
pub const FINAL_GROUP: &str = "FINAL_GROUP";

/// Id of the group restricting results to entities owned by the caller.
pub const OWNER_ACCESS_GROUP: &str = "OWNER_ACCESS_GROUP";

/// Id of the group excluding soft-deleted entities.
pub const DELETED_FALSE_CRITERIA_GROUP: &str = "DELETED_FALSE_CRITERIA_GROUP";

/// Relation path used by the owner access group.
pub const OWNER_ID_PATH: &str = "[owners].id";

/// Field name marking an entity as soft-deleted.
pub const DELETED_FIELD: &str = "deleted";

/// A set of criteria, groups of criteria and merged groups of groups.
///
/// Requests are built fresh for every search, either programmatically or
/// with [`ExpressionParser`](crate::parser::ExpressionParser), and can be
/// layered with [`SearchRequest::merge`].
///
/// # Example
///
/// ```
/// use trawl_search::types::{LogicalOperator, SearchOperation, SearchRequest};
///
/// let mut request = SearchRequest::new();
/// request.add_criterion("open", LogicalOperator::Or, "Task", "status", SearchOperation::Equals, "OPEN");
/// request.add_criterion("open", LogicalOperator::Or, "Task", "status", SearchOperation::Equals, "BLOCKED");
///
/// assert_eq!(request.groups().len(), 1);
/// assert_eq!(request.criteria().len(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    groups: Vec<Group>,
    criteria: Vec<Criterion>,
    merged_groups: BTreeMap<String, MergedGroup>,
    #[serde(default = "default_add_owner_criterion")]
    add_owner_criterion: bool,
}

fn default_add_owner_criterion() -> bool {
    true
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            criteria: Vec::new(),
            merged_groups: BTreeMap::new(),
            add_owner_criterion: true,
        }
    }
}

impl SearchRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the groups in declaration order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Returns all criteria.
    pub fn criteria(&self) -> &[Criterion] {
        &self.criteria
    }

    /// Returns the merged groups keyed by id.
    pub fn merged_groups(&self) -> &BTreeMap<String, MergedGroup> {
        &self.merged_groups
    }

    /// Looks up a group by id.
    pub fn group(&self, id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// Looks up a criterion by id.
    pub fn criterion(&self, id: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.id == id)
    }

    /// Returns true if a group with this id exists.
    pub fn contains_group(&self, id: &str) -> bool {
        self.group(id).is_some()
    }

    /// Returns true if the request has no groups and no merged groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.merged_groups.is_empty()
    }

    /// Whether scoping should add the owner access group.
    pub fn is_add_owner_criterion(&self) -> bool {
        self.add_owner_criterion
    }

    /// Enables or disables the owner access group for this request.
    pub fn set_add_owner_criterion(&mut self, value: bool) {
        self.add_owner_criterion = value;
    }

    /// Adds a criterion to `group_id` and returns the new criterion id.
    ///
    /// The group is created on first use with `group_operator`; later calls
    /// append to it and leave its operator unchanged.
    pub fn add_criterion(
        &mut self,
        group_id: impl Into<String>,
        group_operator: LogicalOperator,
        entity_type: impl Into<String>,
        attribute_path: impl Into<String>,
        operation: SearchOperation,
        value: impl Into<Literal>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        let criterion = Criterion::new(id.clone(), entity_type, attribute_path, operation, value);
        self.push_criterion(group_id.into(), Some(group_operator), criterion);
        id
    }

    /// Adds a prebuilt criterion to `group_id`.
    ///
    /// Used when ids are assigned by the caller, as the parser does.
    pub fn add_prepared_criterion(
        &mut self,
        group_id: impl Into<String>,
        group_operator: Option<LogicalOperator>,
        criterion: Criterion,
    ) {
        self.push_criterion(group_id.into(), group_operator, criterion);
    }

    fn push_criterion(
        &mut self,
        group_id: String,
        group_operator: Option<LogicalOperator>,
        criterion: Criterion,
    ) {
        let criterion_id = criterion.id.clone();
        self.criteria.push(criterion);

        match self.groups.iter_mut().find(|g| g.id == group_id) {
            Some(group) => group.criteria_ids.push(criterion_id),
            None => {
                let mut group = Group::new(group_id, group_operator);
                group.criteria_ids.push(criterion_id);
                self.groups.push(group);
            }
        }
    }

    /// Adds an `id = value` criterion.
    pub fn add_id_equals_criteria(
        &mut self,
        group_id: impl Into<String>,
        entity_type: impl Into<String>,
        id: impl Into<Literal>,
    ) -> String {
        self.add_criterion(
            group_id,
            LogicalOperator::And,
            entity_type,
            "id",
            SearchOperation::Equals,
            id,
        )
    }

    /// Adds the soft-delete exclusion group.
    pub fn add_deleted_false_criteria(&mut self, entity_type: &str) {
        self.add_criterion(
            DELETED_FALSE_CRITERIA_GROUP,
            LogicalOperator::Or,
            entity_type,
            DELETED_FIELD,
            SearchOperation::Equals,
            false,
        );
        self.add_criterion(
            DELETED_FALSE_CRITERIA_GROUP,
            LogicalOperator::Or,
            entity_type,
            DELETED_FIELD,
            SearchOperation::IsNull,
            Literal::Null,
        );
    }

    /// Adds the owner access group for `user_id`.
    ///
    /// Does nothing when owner criteria are disabled for this request.
    pub fn add_owner_access_criteria(&mut self, entity_type: &str, user_id: Uuid) {
        if !self.add_owner_criterion {
            return;
        }
        self.add_criterion(
            OWNER_ACCESS_GROUP,
            LogicalOperator::And,
            entity_type,
            OWNER_ID_PATH,
            SearchOperation::Equals,
            user_id,
        );
    }

    /// Records a merged group combining `group_ids` under `operator`.
    ///
    /// An existing merged group with the same id is replaced.
    pub fn merge_group<I, S>(&mut self, new_group_id: impl Into<String>, operator: LogicalOperator, group_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.merged_groups.insert(
            new_group_id.into(),
            MergedGroup {
                operator,
                group_ids: group_ids.into_iter().map(Into::into).collect(),
            },
        );
    }

    /// Renames a merged group and rewrites every reference to it.
    pub fn rename_merge_group(&mut self, old_id: &str, new_id: &str) -> SearchResult<()> {
        if old_id == new_id {
            return Ok(());
        }
        if self.merged_groups.contains_key(new_id) {
            return Err(SearchError::group_resolution(format!(
                "merged group '{}' already exists",
                new_id
            )));
        }
        let merged = self.merged_groups.remove(old_id).ok_or_else(|| {
            SearchError::group_resolution(format!("merged group '{}' does not exist", old_id))
        })?;
        self.merged_groups.insert(new_id.to_string(), merged);

        for merged in self.merged_groups.values_mut() {
            for id in merged.group_ids.iter_mut().filter(|id| id.as_str() == old_id) {
                *id = new_id.to_string();
            }
        }
        Ok(())
    }

    /// Appends the groups, criteria and merged groups of `other`.
    ///
    /// Ids are not renamed; callers layering requests must keep them
    /// disjoint.
    pub fn merge(&mut self, other: SearchRequest) {
        self.groups.extend(other.groups);
        self.criteria.extend(other.criteria);
        self.merged_groups.extend(other.merged_groups);
    }
}
