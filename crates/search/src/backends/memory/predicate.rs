//! Predicates evaluated directly over JSON documents.

use std::borrow::Cow;
use std::cmp::Ordering;

use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::error::{BackendError, SearchResult};
use crate::resolver::ResolvedAttribute;
use crate::types::{SearchOperation, TypedValue};

/// Where a predicate reads its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Array member holding related documents for a to-many join.
    pub relation: Option<String>,
    /// Path to the value, inside each related document when joined.
    pub path: Vec<String>,
}

impl Target {
    /// Builds the target for a resolved attribute.
    pub fn for_attribute(attribute: &ResolvedAttribute) -> Self {
        match attribute.many_join() {
            Some(join) => Self {
                relation: Some(join.relation.clone()),
                path: attribute.path.clone(),
            },
            None => Self {
                relation: None,
                path: attribute
                    .document_path()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            },
        }
    }

    /// Applies `test` to the value, or to each related document's value
    /// until one passes.
    fn any(&self, document: &Value, test: impl Fn(&Value) -> bool) -> bool {
        match &self.relation {
            None => test(lookup(document, &self.path)),
            Some(relation) => match document.get(relation) {
                Some(Value::Array(items)) => items.iter().any(|item| test(lookup(item, &self.path))),
                Some(item @ Value::Object(_)) => test(lookup(item, &self.path)),
                _ => false,
            },
        }
    }
}

/// A compiled LIKE pattern.
#[derive(Debug, Clone)]
pub struct LikePattern {
    source: String,
    regex: Regex,
}

impl LikePattern {
    /// Compiles a SQL LIKE pattern, where `%` matches any run and `_` one
    /// character. Matching is case-insensitive.
    pub fn new(source: &str) -> SearchResult<Self> {
        let mut expression = String::with_capacity(source.len() + 8);
        expression.push('^');
        for c in source.chars() {
            match c {
                '%' => expression.push_str(".*"),
                '_' => expression.push('.'),
                other => expression.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expression.push('$');

        let regex = RegexBuilder::new(&expression)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
            .map_err(|err| BackendError::QueryError {
                message: format!("invalid LIKE pattern '{}': {}", source, err),
            })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The pattern as given.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for LikePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// A filter over JSON documents.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryPredicate {
    /// Matches every document.
    All,
    /// Compares the target value with a typed value.
    Compare {
        /// Value location.
        target: Target,
        /// Comparison.
        operation: SearchOperation,
        /// Right-hand side.
        value: TypedValue,
    },
    /// LIKE or NOT LIKE.
    Like {
        /// Value location.
        target: Target,
        /// Compiled pattern.
        pattern: LikePattern,
        /// True for NOT LIKE.
        negated: bool,
    },
    /// Every child matches; empty matches all.
    And(Vec<MemoryPredicate>),
    /// Some child matches; empty matches nothing.
    Or(Vec<MemoryPredicate>),
}

impl MemoryPredicate {
    /// Builds the atomic predicate for `attribute`.
    pub fn compare(
        attribute: &ResolvedAttribute,
        operation: SearchOperation,
        value: &TypedValue,
    ) -> SearchResult<Self> {
        let target = Target::for_attribute(attribute);
        if operation.is_pattern() {
            let source = value.as_text().unwrap_or_else(|| value.to_string());
            return Ok(MemoryPredicate::Like {
                target,
                pattern: LikePattern::new(&source)?,
                negated: operation == SearchOperation::NotLike,
            });
        }
        Ok(MemoryPredicate::Compare {
            target,
            operation,
            value: value.clone(),
        })
    }

    /// Evaluates against one document.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            MemoryPredicate::All => true,
            MemoryPredicate::And(children) => children.iter().all(|c| c.matches(document)),
            MemoryPredicate::Or(children) => children.iter().any(|c| c.matches(document)),
            MemoryPredicate::Like {
                target,
                pattern,
                negated,
            } => target.any(document, |found| match scalar_text(found) {
                Some(text) => pattern.is_match(&text) != *negated,
                None => false,
            }),
            MemoryPredicate::Compare {
                target,
                operation,
                value,
            } => match operation {
                // NOT IN () holds even for null values
                SearchOperation::NotIn if matches!(value, TypedValue::List(items) if items.is_empty()) => {
                    true
                }
                _ => target.any(document, |found| compare(found, *operation, value)),
            },
        }
    }
}

fn compare(found: &Value, operation: SearchOperation, value: &TypedValue) -> bool {
    use SearchOperation::*;

    match operation {
        IsNull => found.is_null(),
        IsNotNull => !found.is_null(),
        In | NotIn => {
            let TypedValue::List(items) = value else {
                return false;
            };
            if found.is_null() {
                return false;
            }
            if operation == In {
                items.iter().any(|item| order(found, item) == Some(Ordering::Equal))
            } else {
                items
                    .iter()
                    .all(|item| matches!(order(found, item), Some(o) if o != Ordering::Equal))
            }
        }
        _ => match order(found, value) {
            Some(ordering) => match operation {
                Equals => ordering == Ordering::Equal,
                NotEquals => ordering != Ordering::Equal,
                Greater => ordering == Ordering::Greater,
                GreaterEqual => ordering != Ordering::Less,
                Less => ordering == Ordering::Less,
                LessEqual => ordering != Ordering::Greater,
                _ => false,
            },
            None => false,
        },
    }
}

/// A non-null value reduced to how SQLite compares it: numbers (booleans
/// included) sort before text, and arrays or objects compare as their JSON
/// text. Integers stay exact; floats are only involved when one side is a
/// float.
#[derive(Debug, PartialEq)]
enum Comparable<'v> {
    Integer(i64),
    Real(f64),
    Text(Cow<'v, str>),
}

impl Comparable<'_> {
    fn compare_to(&self, other: &Comparable<'_>) -> Ordering {
        use Comparable::*;

        match (self, other) {
            (Integer(a), Integer(b)) => a.cmp(b),
            (Integer(a), Real(b)) => integer_real(*a, *b),
            (Real(a), Integer(b)) => integer_real(*b, *a).reverse(),
            (Real(a), Real(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Text(a), Text(b)) => a.cmp(b),
            (Text(_), _) => Ordering::Greater,
            (_, Text(_)) => Ordering::Less,
        }
    }
}

/// Exact order of an integer against a float.
fn integer_real(integer: i64, real: f64) -> Ordering {
    // i64::MIN and 2^63 are exact as f64
    const LOWER: f64 = -9_223_372_036_854_775_808.0;
    if real.is_nan() {
        return Ordering::Equal;
    }
    if real < LOWER {
        return Ordering::Greater;
    }
    if real >= -LOWER {
        return Ordering::Less;
    }

    let whole = real.trunc();
    match integer.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0_f64.partial_cmp(&(real - whole)).unwrap_or(Ordering::Equal),
        other => other,
    }
}

fn stored(value: &Value) -> Option<Comparable<'_>> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(Comparable::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Comparable::Integer(i)),
            None => n.as_f64().map(Comparable::Real),
        },
        Value::String(s) => Some(Comparable::Text(Cow::Borrowed(s.as_str()))),
        other => Some(Comparable::Text(Cow::Owned(other.to_string()))),
    }
}

fn typed(value: &TypedValue) -> Option<Comparable<'static>> {
    if let Some(integer) = value.as_i64() {
        return Some(Comparable::Integer(integer));
    }
    if let Some(number) = value.as_f64() {
        return Some(Comparable::Real(number));
    }
    value.as_text().map(|text| Comparable::Text(Cow::Owned(text)))
}

/// Orders a stored value against a typed value; `None` when either is null.
fn order(found: &Value, value: &TypedValue) -> Option<Ordering> {
    Some(stored(found)?.compare_to(&typed(value)?))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        other => Some(other.to_string()),
    }
}

/// Returns the value at `path`, or `Null` when any segment is missing.
pub(crate) fn lookup<'v, S: AsRef<str>>(document: &'v Value, path: &[S]) -> &'v Value {
    path.iter()
        .try_fold(document, |value, key| value.get(key.as_ref()))
        .unwrap_or(&Value::Null)
}

/// Sort order over stored values: null first, then numbers and booleans,
/// then text.
pub(crate) fn sort_order(a: &Value, b: &Value) -> Ordering {
    match (stored(a), stored(b)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.compare_to(&y),
    }
}
