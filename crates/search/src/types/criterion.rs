//! Criteria, groups and the operators that combine them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The comparison applied by a single criterion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchOperation {
    /// Value equals the literal.
    Equals,
    /// Value differs from the literal.
    NotEquals,
    /// Value matches a `%`/`_` pattern.
    Like,
    /// Value does not match a `%`/`_` pattern.
    NotLike,
    /// Value is greater than the literal.
    Greater,
    /// Value is greater than or equal to the literal.
    GreaterEqual,
    /// Value is less than the literal.
    Less,
    /// Value is less than or equal to the literal.
    LessEqual,
    /// Value is one of the listed literals.
    In,
    /// Value is none of the listed literals.
    NotIn,
    /// Value is absent or null.
    IsNull,
    /// Value is present and not null.
    IsNotNull,
}

impl SearchOperation {
    /// Returns true for operations that take a list of values.
    pub fn is_membership(self) -> bool {
        matches!(self, SearchOperation::In | SearchOperation::NotIn)
    }

    /// Returns true for operations that ignore the criterion value.
    pub fn is_null_check(self) -> bool {
        matches!(self, SearchOperation::IsNull | SearchOperation::IsNotNull)
    }

    /// Returns true for pattern operations.
    pub fn is_pattern(self) -> bool {
        matches!(self, SearchOperation::Like | SearchOperation::NotLike)
    }

    /// Returns the canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            SearchOperation::Equals => "EQUALS",
            SearchOperation::NotEquals => "NOT_EQUALS",
            SearchOperation::Like => "LIKE",
            SearchOperation::NotLike => "NOT_LIKE",
            SearchOperation::Greater => "GREATER",
            SearchOperation::GreaterEqual => "GREATER_EQUAL",
            SearchOperation::Less => "LESS",
            SearchOperation::LessEqual => "LESS_EQUAL",
            SearchOperation::In => "IN",
            SearchOperation::NotIn => "NOT_IN",
            SearchOperation::IsNull => "IS_NULL",
            SearchOperation::IsNotNull => "IS_NOT_NULL",
        }
    }
}

impl fmt::Display for SearchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean operator joining criteria or groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    /// Conjunction.
    #[default]
    And,
    /// Disjunction.
    Or,
}

impl LogicalOperator {
    /// Returns the expression-language symbol for this operator.
    pub fn symbol(self) -> char {
        match self {
            LogicalOperator::And => '&',
            LogicalOperator::Or => '|',
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => f.write_str("AND"),
            LogicalOperator::Or => f.write_str("OR"),
        }
    }
}

/// An untyped literal attached to a criterion.
///
/// The concrete type is only known once the attribute path has been
/// resolved against entity metadata; see
/// [`AttributeResolver::coerce`](crate::resolver::AttributeResolver::coerce).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    /// Explicit null.
    Null,
    /// Boolean literal.
    Bool(bool),
    /// Integral number.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Text, possibly holding a comma-separated list.
    Text(String),
    /// A native list of literals.
    List(Vec<Literal>),
}

impl Literal {
    /// Returns true if this literal is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    /// Returns the string form used as input for coercion.
    ///
    /// Lists have no scalar form and return `None`.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Literal::Null => None,
            Literal::Bool(b) => Some(b.to_string()),
            Literal::Integer(i) => Some(i.to_string()),
            Literal::Float(f) => Some(f.to_string()),
            Literal::Text(s) => Some(s.clone()),
            Literal::List(_) => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Text(s) => f.write_str(s),
            Literal::List(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Text(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Integer(i64::from(value))
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<uuid::Uuid> for Literal {
    fn from(value: uuid::Uuid) -> Self {
        Literal::Text(value.to_string())
    }
}

impl<T: Into<Literal>> From<Vec<T>> for Literal {
    fn from(values: Vec<T>) -> Self {
        Literal::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Literal>> From<Option<T>> for Literal {
    fn from(value: Option<T>) -> Self {
        value.map_or(Literal::Null, Into::into)
    }
}

/// An atomic filter condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Criterion {
    /// Identifier, unique within the owning request.
    pub id: String,
    /// Entity type the attribute path is resolved against.
    pub entity_type: String,
    /// Dotted path, optionally starting with a bracketed relation.
    pub attribute_path: String,
    /// The comparison to apply.
    pub operation: SearchOperation,
    /// The untyped value.
    pub value: Literal,
}

impl Criterion {
    /// Creates a criterion.
    pub fn new(
        id: impl Into<String>,
        entity_type: impl Into<String>,
        attribute_path: impl Into<String>,
        operation: SearchOperation,
        value: impl Into<Literal>,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type: entity_type.into(),
            attribute_path: attribute_path.into(),
            operation,
            value: value.into(),
        }
    }
}

/// A flat combination of criteria under one operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group identifier.
    pub id: String,
    /// `None` means unset; evaluation treats it as AND.
    pub operator: Option<LogicalOperator>,
    /// Member criteria, in declaration order.
    pub criteria_ids: Vec<String>,
}

impl Group {
    /// Creates an empty group.
    pub fn new(id: impl Into<String>, operator: Option<LogicalOperator>) -> Self {
        Self {
            id: id.into(),
            operator,
            criteria_ids: Vec::new(),
        }
    }
}

/// A combination of groups or other merged groups under one operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedGroup {
    /// Operator applied to the referenced groups.
    pub operator: LogicalOperator,
    /// Referenced group or merged-group ids.
    pub group_ids: Vec<String>,
}
