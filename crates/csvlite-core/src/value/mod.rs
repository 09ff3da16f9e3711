//! The dynamically typed scalar and its coercions.
//!
//! Every coercion returns `None` when the value cannot be represented in the
//! target type. `None` never means SQL NULL unless the input was NULL.

pub mod comparison;
pub mod datetime;
pub mod sort_value;

use crate::ternary::Ternary;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Serialize, Serializer};
use std::fmt;

pub use comparison::{
    compare, compare_combinedly, compare_row_values, equal, equivalent, greater,
    greater_or_equal, is, less, less_or_equal, like, not_equal, ComparisonOperator,
    ComparisonResult,
};
pub use datetime::{convert_datetime_format, str_to_time, DatetimeOptions, Location};
pub use sort_value::{
    serialize_key, serialize_keys, NullPosition, SortDirection, SortValue, SortValues,
};

/// A single dynamically typed value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Primary {
    /// SQL NULL
    #[default]
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit float
    Float(f64),
    /// Datetime with its UTC offset
    Datetime(DateTime<FixedOffset>),
    /// Boolean produced by data or functions
    Boolean(bool),
    /// Result of a predicate
    Ternary(Ternary),
    /// Text
    String(String),
}

/// Shared NULL used where a reference to an empty value is needed.
pub(crate) static NULL: Primary = Primary::Null;

/// Quick check that a string could be a decimal number.
pub(crate) fn maybe_number(s: &str) -> bool {
    let bytes = s.as_bytes();
    let start = match bytes.first() {
        Some(b'+') | Some(b'-') => 1,
        Some(_) => 0,
        None => return false,
    };
    match bytes.get(start) {
        Some(b) if b.is_ascii_digit() => true,
        Some(b'.') => bytes.get(start + 1).is_some_and(|b| b.is_ascii_digit()),
        _ => false,
    }
}

fn float_to_integer(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

impl Primary {
    /// Re-expresses a float as an Integer when it is exactly integral.
    pub fn from_float(f: f64) -> Primary {
        match float_to_integer(f) {
            Some(i) => Primary::Integer(i),
            None => Primary::Float(f),
        }
    }

    /// Returns true for NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Primary::Null)
    }

    /// Name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Primary::Null => "NULL",
            Primary::Integer(_) => "INTEGER",
            Primary::Float(_) => "FLOAT",
            Primary::Datetime(_) => "DATETIME",
            Primary::Boolean(_) => "BOOLEAN",
            Primary::Ternary(_) => "TERNARY",
            Primary::String(_) => "STRING",
        }
    }

    /// Integers, integral floats and numeric strings.
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            Primary::Integer(i) => Some(*i),
            Primary::Float(f) => float_to_integer(*f),
            Primary::String(s) => {
                let s = s.trim();
                if !maybe_number(s) {
                    return None;
                }
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(float_to_integer))
            }
            _ => None,
        }
    }

    /// Integers and strings that spell an integer exactly.
    pub fn to_integer_strictly(&self) -> Option<i64> {
        match self {
            Primary::Integer(i) => Some(*i),
            Primary::String(s) => {
                let s = s.trim();
                if maybe_number(s) {
                    s.parse::<i64>().ok()
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Integers, floats and numeric strings.
    pub fn to_float(&self) -> Option<f64> {
        match self {
            Primary::Integer(i) => Some(*i as f64),
            Primary::Float(f) => Some(*f),
            Primary::String(s) => {
                let s = s.trim();
                if maybe_number(s) {
                    s.parse::<f64>().ok()
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Datetimes, Unix timestamps and datetime strings.
    pub fn to_datetime(&self, options: &DatetimeOptions) -> Option<DateTime<FixedOffset>> {
        match self {
            Primary::Datetime(dt) => Some(*dt),
            Primary::Integer(i) => options.location.from_timestamp(*i, 0),
            Primary::Float(f) => float_to_datetime(*f, options),
            Primary::String(s) => {
                if let Some(dt) = str_to_time(s, options) {
                    return Some(dt);
                }
                let s = s.trim();
                if !maybe_number(s) {
                    return None;
                }
                if let Ok(i) = s.parse::<i64>() {
                    return options.location.from_timestamp(i, 0);
                }
                s.parse::<f64>()
                    .ok()
                    .and_then(|f| float_to_datetime(f, options))
            }
            _ => None,
        }
    }

    /// Booleans and anything with a definite truth value.
    pub fn to_boolean(&self) -> Option<bool> {
        match self {
            Primary::Boolean(b) => Some(*b),
            Primary::String(_) | Primary::Integer(_) | Primary::Float(_) | Primary::Ternary(_) => {
                self.ternary().as_bool()
            }
            _ => None,
        }
    }

    /// Strings, integers and floats as text.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Primary::String(s) => Some(s.clone()),
            Primary::Integer(i) => Some(i.to_string()),
            Primary::Float(f) => Some(f.to_string()),
            _ => None,
        }
    }

    /// The truth value of this value when used as a predicate.
    pub fn ternary(&self) -> Ternary {
        match self {
            Primary::Ternary(t) => *t,
            Primary::Boolean(b) => Ternary::from_bool(*b),
            Primary::Integer(i) => match i {
                1 => Ternary::True,
                0 => Ternary::False,
                _ => Ternary::Unknown,
            },
            Primary::Float(f) => {
                if *f == 1.0 {
                    Ternary::True
                } else if *f == 0.0 {
                    Ternary::False
                } else {
                    Ternary::Unknown
                }
            }
            Primary::String(s) => match s.trim() {
                "1" | "t" | "T" | "TRUE" | "true" | "True" => Ternary::True,
                "0" | "f" | "F" | "FALSE" | "false" | "False" => Ternary::False,
                _ => Ternary::Unknown,
            },
            Primary::Datetime(_) | Primary::Null => Ternary::Unknown,
        }
    }
}

fn float_to_datetime(f: f64, options: &DatetimeOptions) -> Option<DateTime<FixedOffset>> {
    if !f.is_finite() {
        return None;
    }
    let secs = f.floor();
    let nanos = ((f - secs) * 1e9).round() as u32;
    options
        .location
        .from_timestamp(secs as i64, nanos.min(999_999_999))
}

impl fmt::Display for Primary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primary::Null => write!(f, "NULL"),
            Primary::Integer(i) => write!(f, "{}", i),
            Primary::Float(fl) => write!(f, "{}", fl),
            Primary::Datetime(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
            Primary::Boolean(b) => write!(f, "{}", b),
            Primary::Ternary(t) => write!(f, "{}", t),
            Primary::String(s) => write!(f, "{}", s),
        }
    }
}

/// Values serialize as plain JSON scalars; datetimes as RFC 3339 text.
impl Serialize for Primary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Primary::Null => serializer.serialize_none(),
            Primary::Integer(i) => serializer.serialize_i64(*i),
            Primary::Float(f) => serializer.serialize_f64(*f),
            Primary::Datetime(_) => serializer.collect_str(self),
            Primary::Boolean(b) => serializer.serialize_bool(*b),
            Primary::Ternary(t) => match t.as_bool() {
                Some(b) => serializer.serialize_bool(b),
                None => serializer.serialize_none(),
            },
            Primary::String(s) => serializer.serialize_str(s),
        }
    }
}

impl From<i64> for Primary {
    fn from(i: i64) -> Self {
        Primary::Integer(i)
    }
}

impl From<f64> for Primary {
    fn from(f: f64) -> Self {
        Primary::Float(f)
    }
}

impl From<bool> for Primary {
    fn from(b: bool) -> Self {
        Primary::Boolean(b)
    }
}

impl From<Ternary> for Primary {
    fn from(t: Ternary) -> Self {
        Primary::Ternary(t)
    }
}

impl From<&str> for Primary {
    fn from(s: &str) -> Self {
        Primary::String(s.to_string())
    }
}

impl From<String> for Primary {
    fn from(s: String) -> Self {
        Primary::String(s)
    }
}

impl From<DateTime<FixedOffset>> for Primary {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        Primary::Datetime(dt)
    }
}

impl<T: Into<Primary>> From<Option<T>> for Primary {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Primary::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_float_collapses_integral_values() {
        assert_eq!(Primary::from_float(19.0), Primary::Integer(19));
        assert_eq!(Primary::from_float(4.5), Primary::Float(4.5));
        assert!(matches!(Primary::from_float(f64::INFINITY), Primary::Float(_)));
    }

    #[test]
    fn test_to_integer() {
        assert_eq!(Primary::from(" 12 ").to_integer(), Some(12));
        assert_eq!(Primary::from("1e2").to_integer(), Some(100));
        assert_eq!(Primary::from("1.5").to_integer(), None);
        assert_eq!(Primary::Float(3.0).to_integer(), Some(3));
        assert_eq!(Primary::Boolean(true).to_integer(), None);
        assert_eq!(Primary::from("abc").to_integer(), None);
        assert_eq!(Primary::from("inf").to_float(), None);
    }

    #[test]
    fn test_strict_integer() {
        assert_eq!(Primary::from("7").to_integer_strictly(), Some(7));
        assert_eq!(Primary::from("7.0").to_integer_strictly(), None);
        assert_eq!(Primary::Float(7.0).to_integer_strictly(), None);
    }

    #[test]
    fn test_to_datetime() {
        let opts = DatetimeOptions::default();
        let dt = Primary::Integer(86400).to_datetime(&opts).unwrap();
        assert_eq!(dt.timestamp(), 86400);
        let dt = Primary::Float(1.5).to_datetime(&opts).unwrap();
        assert_eq!(dt.timestamp_subsec_nanos(), 500_000_000);
        assert!(Primary::from("2020-01-01").to_datetime(&opts).is_some());
        assert!(Primary::Boolean(true).to_datetime(&opts).is_none());
    }

    #[test]
    fn test_ternary_and_boolean() {
        assert_eq!(Primary::from("true").ternary(), Ternary::True);
        assert_eq!(Primary::Integer(0).ternary(), Ternary::False);
        assert_eq!(Primary::Integer(2).ternary(), Ternary::Unknown);
        assert_eq!(Primary::Integer(1).to_boolean(), Some(true));
        assert_eq!(Primary::from("maybe").to_boolean(), None);
        assert_eq!(Primary::Null.to_boolean(), None);
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Primary::Float(2.5).to_text(), Some("2.5".to_string()));
        assert_eq!(Primary::Integer(3).to_text(), Some("3".to_string()));
        assert_eq!(Primary::Boolean(true).to_text(), None);
        assert_eq!(Primary::Null.to_text(), None);
    }
}
