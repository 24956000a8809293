//! Values coerced into the native type of a resolved field.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A literal after coercion against a [`FieldType`](crate::metadata::FieldType).
///
/// `Null` is produced for null literals and for enum names that match no
/// declared constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    /// No value.
    Null,
    /// Boolean.
    Bool(bool),
    /// 32-bit integer.
    Integer(i32),
    /// 64-bit integer.
    Long(i64),
    /// Double precision float.
    Double(f64),
    /// Arbitrary precision decimal.
    Decimal(Decimal),
    /// Free text.
    Text(String),
    /// UUID.
    Uuid(Uuid),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time without zone.
    DateTime(NaiveDateTime),
    /// Name of a declared enum constant.
    Enum(String),
    /// Element-wise coerced list for membership operations.
    List(Vec<TypedValue>),
}

/// Storage format for datetimes; fractional seconds are omitted when zero.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Storage format for dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

impl TypedValue {
    /// Returns true if this is [`TypedValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// Returns the exact integer for integer and boolean variants.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Bool(b) => Some(i64::from(*b)),
            TypedValue::Integer(i) => Some(i64::from(*i)),
            TypedValue::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Returns the numeric value for numeric and boolean variants.
    ///
    /// `Long` values beyond 2^53 lose precision; compare those through
    /// [`TypedValue::as_i64`].
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TypedValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            TypedValue::Integer(i) => Some(f64::from(*i)),
            TypedValue::Long(l) => Some(*l as f64),
            TypedValue::Double(d) => Some(*d),
            TypedValue::Decimal(d) => rust_decimal::prelude::ToPrimitive::to_f64(d),
            _ => None,
        }
    }

    /// Returns the canonical text for text-like variants.
    ///
    /// Dates and datetimes use their storage formats, so text comparison
    /// orders them chronologically.
    pub fn as_text(&self) -> Option<String> {
        match self {
            TypedValue::Text(s) | TypedValue::Enum(s) => Some(s.clone()),
            TypedValue::Uuid(u) => Some(u.hyphenated().to_string()),
            TypedValue::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
            TypedValue::DateTime(dt) => Some(dt.format(DATETIME_FORMAT).to_string()),
            _ => None,
        }
    }

    /// Returns true for variants that compare numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypedValue::Bool(_)
                | TypedValue::Integer(_)
                | TypedValue::Long(_)
                | TypedValue::Double(_)
                | TypedValue::Decimal(_)
        )
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Null => f.write_str("null"),
            TypedValue::Bool(b) => write!(f, "{}", b),
            TypedValue::Integer(i) => write!(f, "{}", i),
            TypedValue::Long(l) => write!(f, "{}", l),
            TypedValue::Double(d) => write!(f, "{}", d),
            TypedValue::Decimal(d) => write!(f, "{}", d),
            TypedValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            other => f.write_str(other.as_text().as_deref().unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datetime_text_omits_zero_fraction() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(
            TypedValue::DateTime(dt).as_text().as_deref(),
            Some("2024-03-01T09:30:00")
        );
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(TypedValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(TypedValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(TypedValue::Long(9_007_199_254_740_993).as_i64(), Some(9_007_199_254_740_993));
        assert_eq!(TypedValue::Double(1.0).as_i64(), None);
        assert!(TypedValue::Long(1).is_numeric());
        assert!(!TypedValue::Text("1".into()).is_numeric());
        assert_eq!(TypedValue::Text("a".into()).as_f64(), None);
    }

    #[test]
    fn test_display() {
        let list = TypedValue::List(vec![TypedValue::Integer(1), TypedValue::Null]);
        assert_eq!(list.to_string(), "[1, null]");
        assert_eq!(TypedValue::Enum("OPEN".into()).to_string(), "OPEN");
    }
}
