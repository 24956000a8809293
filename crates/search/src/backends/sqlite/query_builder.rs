//! SQL generation for predicates over JSON documents.
//!
//! Every attribute is read with `json_extract`, binding the JSON path as a
//! parameter. Placeholders are anonymous `?`, so fragments combine by
//! concatenating their SQL and their parameters in order.

use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};

use crate::resolver::ResolvedAttribute;
use crate::types::{SearchOperation, TypedValue};

/// Alias of the `entities` table in generated queries.
pub const ENTITY_ALIAS: &str = "e";

/// A SQL clause with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    /// The SQL clause.
    pub sql: String,
    /// Bound parameter values, in placeholder order.
    pub params: Vec<SqlParam>,
}

/// A bound SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// String parameter.
    String(String),
    /// Integer parameter.
    Integer(i64),
    /// Float parameter.
    Float(f64),
    /// Null parameter.
    Null,
}

impl SqlParam {
    /// Creates a string parameter.
    pub fn string(s: impl Into<String>) -> Self {
        SqlParam::String(s.into())
    }

    /// Converts a scalar typed value; lists and nulls bind as NULL.
    pub fn from_typed(value: &TypedValue) -> Self {
        match value {
            TypedValue::Bool(b) => SqlParam::Integer(i64::from(*b)),
            TypedValue::Integer(i) => SqlParam::Integer(i64::from(*i)),
            TypedValue::Long(l) => SqlParam::Integer(*l),
            TypedValue::Double(_) | TypedValue::Decimal(_) => {
                value.as_f64().map_or(SqlParam::Null, SqlParam::Float)
            }
            other => other.as_text().map_or(SqlParam::Null, SqlParam::String),
        }
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlParam::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            SqlParam::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            SqlParam::Null => ToSqlOutput::Owned(SqlValue::Null),
        })
    }
}

impl SqlFragment {
    /// Creates a fragment without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Creates a fragment with parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Always true.
    pub fn always() -> Self {
        Self::new("1")
    }

    /// Always false.
    pub fn never() -> Self {
        Self::new("0")
    }

    /// Joins fragments with `separator`, parenthesizing each.
    fn join(fragments: Vec<SqlFragment>, separator: &str) -> Self {
        let mut sql = Vec::with_capacity(fragments.len());
        let mut params = Vec::new();
        for fragment in fragments {
            sql.push(format!("({})", fragment.sql));
            params.extend(fragment.params);
        }
        Self::with_params(sql.join(separator), params)
    }

    /// Conjunction; empty input is always true.
    pub fn all(fragments: Vec<SqlFragment>) -> Self {
        match fragments.len() {
            0 => Self::always(),
            1 => fragments.into_iter().next().unwrap_or_else(Self::always),
            _ => Self::join(fragments, " AND "),
        }
    }

    /// Disjunction; empty input is always false.
    pub fn any(fragments: Vec<SqlFragment>) -> Self {
        match fragments.len() {
            0 => Self::never(),
            1 => fragments.into_iter().next().unwrap_or_else(Self::never),
            _ => Self::join(fragments, " OR "),
        }
    }
}

/// JSON path for `segments`, e.g. `$.profile.age`.
pub fn json_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut path = String::from("$");
    for segment in segments {
        path.push('.');
        path.push_str(segment.as_ref());
    }
    path
}

/// Builds the condition for one resolved attribute.
pub fn build_condition(
    attribute: &ResolvedAttribute,
    operation: SearchOperation,
    value: &TypedValue,
) -> SqlFragment {
    match (operation, value) {
        (SearchOperation::In, TypedValue::List(items)) if items.is_empty() => {
            return SqlFragment::never();
        }
        (SearchOperation::NotIn, TypedValue::List(items)) if items.is_empty() => {
            return SqlFragment::always();
        }
        _ => {}
    }

    let data = format!("{}.data", ENTITY_ALIAS);
    match attribute.many_join() {
        None => compare(&data, json_path(&attribute.document_path()), operation, value),
        Some(join) => {
            let inner = compare("j.value", json_path(&attribute.path), operation, value);
            let mut params = vec![SqlParam::String(json_path(&[join.relation.as_str()]))];
            params.extend(inner.params);
            SqlFragment::with_params(
                format!(
                    "EXISTS (SELECT 1 FROM json_each({}, ?) AS j WHERE {})",
                    data, inner.sql
                ),
                params,
            )
        }
    }
}

fn compare(
    source: &str,
    path: String,
    operation: SearchOperation,
    value: &TypedValue,
) -> SqlFragment {
    let column = format!("json_extract({}, ?)", source);
    let path = SqlParam::String(path);

    match operation {
        SearchOperation::IsNull => SqlFragment::with_params(format!("{} IS NULL", column), vec![path]),
        SearchOperation::IsNotNull => {
            SqlFragment::with_params(format!("{} IS NOT NULL", column), vec![path])
        }
        SearchOperation::Like | SearchOperation::NotLike => {
            let keyword = if operation == SearchOperation::Like {
                "LIKE"
            } else {
                "NOT LIKE"
            };
            let pattern = value.as_text().unwrap_or_else(|| value.to_string());
            SqlFragment::with_params(
                format!("{} {} ?", column, keyword),
                vec![path, SqlParam::String(pattern)],
            )
        }
        SearchOperation::In | SearchOperation::NotIn => {
            let items: Vec<SqlParam> = match value {
                TypedValue::List(items) => items.iter().map(SqlParam::from_typed).collect(),
                scalar => vec![SqlParam::from_typed(scalar)],
            };
            let keyword = if operation == SearchOperation::In {
                "IN"
            } else {
                "NOT IN"
            };
            let placeholders = vec!["?"; items.len()].join(", ");
            let mut params = vec![path];
            params.extend(items);
            SqlFragment::with_params(format!("{} {} ({})", column, keyword, placeholders), params)
        }
        _ if value.is_null() => SqlFragment::never(),
        _ => {
            let symbol = match operation {
                SearchOperation::Equals => "=",
                SearchOperation::NotEquals => "!=",
                SearchOperation::Greater => ">",
                SearchOperation::GreaterEqual => ">=",
                SearchOperation::Less => "<",
                _ => "<=",
            };
            SqlFragment::with_params(
                format!("{} {} ?", column, symbol),
                vec![path, SqlParam::from_typed(value)],
            )
        }
    }
}
