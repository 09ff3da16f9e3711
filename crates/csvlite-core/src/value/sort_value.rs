//! Normalized values for sorting and canonical keys for deduplication.

use super::{DatetimeOptions, Primary};
use crate::ternary::Ternary;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction of an ORDER BY key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    /// Ascending
    #[default]
    Asc,
    /// Descending
    Desc,
}

impl SortDirection {
    /// NULLS FIRST for ascending keys and NULLS LAST for descending keys.
    pub fn default_null_position(self) -> NullPosition {
        match self {
            SortDirection::Asc => NullPosition::First,
            SortDirection::Desc => NullPosition::Last,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Placement of NULLs for an ORDER BY key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NullPosition {
    /// NULLS FIRST
    First,
    /// NULLS LAST
    Last,
}

impl fmt::Display for NullPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NullPosition::First => write!(f, "NULLS FIRST"),
            NullPosition::Last => write!(f, "NULLS LAST"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SortValueType {
    Null,
    Integer,
    Float,
    Datetime,
    Boolean,
    String,
}

/// A value snapshot holding every representation needed to order it against
/// values of other types.
#[derive(Debug, Clone)]
pub struct SortValue {
    kind: SortValueType,
    integer: i64,
    float: f64,
    datetime: (i64, u32),
    string: String,
}

fn ternary_less<T: PartialOrd>(a: &T, b: &T) -> Ternary {
    match a.partial_cmp(b) {
        Some(std::cmp::Ordering::Less) => Ternary::True,
        Some(std::cmp::Ordering::Greater) => Ternary::False,
        _ => Ternary::Unknown,
    }
}

impl SortValue {
    /// Normalizes a value, trying integer, float, datetime, boolean and
    /// string in that order.
    pub fn new(value: &Primary, options: &DatetimeOptions) -> Self {
        let mut sv = SortValue {
            kind: SortValueType::Null,
            integer: 0,
            float: 0.0,
            datetime: (0, 0),
            string: String::new(),
        };

        if value.is_null() {
            return sv;
        }

        // Whole floats and numeric strings take the Integer kind, so they
        // pair with booleans the same way integers do.
        let text = || value.to_text().map(|s| s.trim().to_uppercase());
        if let Some(i) = value.to_integer() {
            sv.kind = SortValueType::Integer;
            sv.integer = i;
            sv.float = i as f64;
            sv.string = text().unwrap_or_else(|| i.to_string());
        } else if let Some(f) = value.to_float() {
            sv.kind = SortValueType::Float;
            sv.float = f;
            sv.string = text().unwrap_or_else(|| f.to_string().to_uppercase());
        } else if let Some(dt) = value.to_datetime(options) {
            sv.kind = SortValueType::Datetime;
            sv.datetime = (dt.timestamp(), dt.timestamp_subsec_nanos());
        } else if let Some(b) = value.to_boolean() {
            sv.kind = SortValueType::Boolean;
            sv.integer = i64::from(b);
        } else if let Primary::String(s) = value {
            sv.kind = SortValueType::String;
            sv.string = s.trim().to_uppercase();
        }
        sv
    }

    /// Returns true for NULL or any value with no usable representation.
    pub fn is_null(&self) -> bool {
        self.kind == SortValueType::Null
    }

    fn epoch(&self) -> f64 {
        self.datetime.0 as f64 + f64::from(self.datetime.1) / 1e9
    }

    /// Strict ordering. UNKNOWN when the values are equal or incommensurable,
    /// so that a multi-key sort falls through to the next key.
    pub fn less(&self, other: &SortValue) -> Ternary {
        use SortValueType::*;
        match (self.kind, other.kind) {
            (Boolean, Boolean) | (Boolean, Integer) | (Integer, Boolean) => {
                ternary_less(&self.integer, &other.integer)
            }
            (Integer, Integer) => ternary_less(&self.integer, &other.integer),
            (Integer | Float, Integer | Float) => ternary_less(&self.float, &other.float),
            (Integer | Float, Datetime) => ternary_less(&self.float, &other.epoch()),
            (Datetime, Integer | Float) => ternary_less(&self.epoch(), &other.float),
            (Datetime, Datetime) => ternary_less(&self.datetime, &other.datetime),
            (Integer | Float | String, String) | (String, Integer | Float) => {
                ternary_less(&self.string, &other.string)
            }
            _ => Ternary::Unknown,
        }
    }

    /// Equality across commensurable types; NULL equals only NULL.
    pub fn equivalent_to(&self, other: &SortValue) -> bool {
        use SortValueType::*;
        match (self.kind, other.kind) {
            (Null, Null) => true,
            (Boolean | Integer, Boolean | Integer) => self.integer == other.integer,
            (Integer | Float, Integer | Float) => self.float == other.float,
            (Datetime, Datetime) => self.datetime == other.datetime,
            (Integer | Float, Datetime) => self.float == other.epoch(),
            (Datetime, Integer | Float) => self.epoch() == other.float,
            (Integer | Float | String, String) | (String, Integer | Float) => {
                self.string == other.string
            }
            _ => false,
        }
    }
}

/// The ordered key tuple of one record.
#[derive(Debug, Clone, Default)]
pub struct SortValues(pub Vec<SortValue>);

impl SortValues {
    /// Normalizes every value of a key tuple.
    pub fn new(values: &[Primary], options: &DatetimeOptions) -> Self {
        SortValues(values.iter().map(|v| SortValue::new(v, options)).collect())
    }

    /// Returns true when `self` sorts strictly before `other`.
    ///
    /// Keys are compared in turn; a key that is equal, incommensurable or
    /// NULL on both sides defers to the next key.
    pub fn less(
        &self,
        other: &SortValues,
        directions: &[SortDirection],
        null_positions: &[NullPosition],
    ) -> bool {
        for (i, (v1, v2)) in self.0.iter().zip(&other.0).enumerate() {
            let direction = directions.get(i).copied().unwrap_or_default();
            match v1.less(v2) {
                Ternary::True => return direction == SortDirection::Asc,
                Ternary::False => return direction == SortDirection::Desc,
                Ternary::Unknown => {}
            }

            let null_position = null_positions
                .get(i)
                .copied()
                .unwrap_or_else(|| direction.default_null_position());
            match (v1.is_null(), v2.is_null()) {
                (true, false) => return null_position == NullPosition::First,
                (false, true) => return null_position == NullPosition::Last,
                _ => {}
            }
        }
        false
    }

    /// Returns true when every key is equivalent.
    pub fn equivalent_to(&self, other: &SortValues) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(v1, v2)| v1.equivalent_to(v2))
    }
}

/// Canonical text key of a value; equal keys mean duplicate values.
pub fn serialize_key(value: &Primary, options: &DatetimeOptions) -> String {
    let mut buf = String::new();
    write_key(&mut buf, value, options);
    buf
}

/// Canonical key of a row of values, joined by `:`.
pub fn serialize_keys(values: &[Primary], options: &DatetimeOptions) -> String {
    let mut buf = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            buf.push(':');
        }
        write_key(&mut buf, value, options);
    }
    buf
}

fn write_key(buf: &mut String, value: &Primary, options: &DatetimeOptions) {
    if value.is_null() {
        buf.push_str("[N]");
    } else if let Some(i) = value.to_integer_strictly() {
        buf.push_str("[I]");
        buf.push_str(&i.to_string());
    } else if let Some(f) = value.to_float() {
        buf.push_str("[F]");
        buf.push_str(&f.to_string());
    } else if let Some(dt) = value.to_datetime(options) {
        if dt.timestamp_subsec_nanos() > 0 {
            let f = dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9;
            buf.push_str("[F]");
            buf.push_str(&f.to_string());
        } else {
            buf.push_str("[I]");
            buf.push_str(&dt.timestamp().to_string());
        }
    } else if let Some(b) = value.to_boolean() {
        buf.push_str(if b { "[I]1[B]T" } else { "[I]0[B]F" });
    } else if let Primary::String(s) = value {
        buf.push_str("[S]");
        buf.push_str(&s.trim().to_uppercase());
    } else {
        buf.push_str("[N]");
    }
}
