//! Compilation of a request's group graph into a filter tree.
//!
//! A [`SearchRequest`] describes its boolean structure indirectly: groups
//! combine criteria, merged groups combine groups and other merged groups by
//! id, and [`FINAL_GROUP`] names the root. [`FilterExpr::compile`] turns
//! that graph into an explicit tree, detecting cycles and dangling ids on
//! the way. Groups that no merged group references are ANDed onto the root,
//! which is how scoping groups layer onto a user's filter.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::error::{SearchError, SearchResult};
use crate::types::{FINAL_GROUP, Group, LogicalOperator, SearchRequest};

/// A boolean filter over criterion ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterExpr {
    /// Matches every entity.
    All,
    /// The criterion with this id.
    Criterion(String),
    /// All children must match; an empty conjunction matches everything.
    And(Vec<FilterExpr>),
    /// Some child must match; an empty disjunction matches nothing.
    Or(Vec<FilterExpr>),
}

impl FilterExpr {
    /// Combines `children` with `operator`.
    pub fn combine(operator: LogicalOperator, children: Vec<FilterExpr>) -> Self {
        match operator {
            LogicalOperator::And => FilterExpr::And(children),
            LogicalOperator::Or => FilterExpr::Or(children),
        }
    }

    /// Criterion ids referenced by this tree, depth-first.
    pub fn criterion_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids<'a>(&'a self, ids: &mut Vec<&'a str>) {
        match self {
            FilterExpr::All => {}
            FilterExpr::Criterion(id) => ids.push(id),
            FilterExpr::And(children) | FilterExpr::Or(children) => {
                for child in children {
                    child.collect_ids(ids);
                }
            }
        }
    }

    /// Compiles the group graph of `request` into a single tree.
    pub fn compile(request: &SearchRequest) -> SearchResult<FilterExpr> {
        GraphCompiler::new(request)?.root()
    }
}

struct GraphCompiler<'r> {
    request: &'r SearchRequest,
    groups: HashMap<&'r str, &'r Group>,
    compiled: HashMap<&'r str, FilterExpr>,
}

impl<'r> GraphCompiler<'r> {
    fn new(request: &'r SearchRequest) -> SearchResult<Self> {
        let criteria: HashSet<&str> = request.criteria().iter().map(|c| c.id.as_str()).collect();

        let mut groups = HashMap::new();
        for group in request.groups() {
            if let Some(missing) = group
                .criteria_ids
                .iter()
                .find(|id| !criteria.contains(id.as_str()))
            {
                return Err(SearchError::group_resolution(format!(
                    "group '{}' references unknown criterion '{}'",
                    group.id, missing
                )));
            }
            // the first declaration of a duplicated id wins
            groups.entry(group.id.as_str()).or_insert(group);
        }

        Ok(Self {
            request,
            groups,
            compiled: HashMap::new(),
        })
    }

    fn root(mut self) -> SearchResult<FilterExpr> {
        let merged = self.request.merged_groups();
        if !merged.is_empty() && !merged.contains_key(FINAL_GROUP) {
            return Err(SearchError::group_resolution(
                "merged groups are declared but no FINAL_GROUP root is present",
            ));
        }

        // compile every merged group so that errors in unreachable ones surface too
        for id in merged.keys() {
            let mut stack = Vec::new();
            self.node(id, &mut stack)?;
        }

        let referenced: HashSet<&str> = merged
            .values()
            .flat_map(|m| m.group_ids.iter().map(String::as_str))
            .collect();

        let mut parts = Vec::new();
        if let Some(final_tree) = self.compiled.get(FINAL_GROUP) {
            parts.push(final_tree.clone());
        }
        let mut seen = HashSet::new();
        for group in self.request.groups() {
            let id = group.id.as_str();
            if referenced.contains(id) || merged.contains_key(id) || !seen.insert(id) {
                continue;
            }
            parts.push(self.group_expr(id)?);
        }

        Ok(match parts.len() {
            0 => FilterExpr::All,
            1 => parts.remove(0),
            _ => FilterExpr::And(parts),
        })
    }

    fn node(&mut self, id: &'r str, stack: &mut Vec<&'r str>) -> SearchResult<FilterExpr> {
        if let Some(done) = self.compiled.get(id) {
            return Ok(done.clone());
        }
        if stack.contains(&id) {
            stack.push(id);
            return Err(SearchError::group_resolution(format!(
                "merged groups form a cycle: {}",
                stack.join(" -> ")
            )));
        }

        let Some((key, merged)) = self.request.merged_groups().get_key_value(id) else {
            return self.group_expr(id);
        };

        stack.push(key.as_str());
        let mut children = Vec::with_capacity(merged.group_ids.len());
        for child in &merged.group_ids {
            children.push(self.node(child.as_str(), stack)?);
        }
        stack.pop();

        let expr = FilterExpr::combine(merged.operator, children);
        self.compiled.insert(key.as_str(), expr.clone());
        Ok(expr)
    }

    fn group_expr(&self, id: &str) -> SearchResult<FilterExpr> {
        let group = self.groups.get(id).ok_or_else(|| {
            SearchError::group_resolution(format!("unknown group '{}'", id))
        })?;

        let operator = group.operator.unwrap_or_else(|| {
            warn!(group = %group.id, "Group has no operator, defaulting to AND");
            LogicalOperator::And
        });
        let leaves = group
            .criteria_ids
            .iter()
            .map(|c| FilterExpr::Criterion(c.clone()))
            .collect();
        Ok(FilterExpr::combine(operator, leaves))
    }
}
