//! Aggregate reducers.
//!
//! Every reducer is a pure function from the value list of one group to a
//! single value.

use crate::ternary::Ternary;
use crate::value::{equivalent, greater, less, DatetimeOptions, Primary};

/// Signature shared by the built-in reducers.
pub type AggregateFn = fn(&[Primary], &DatetimeOptions) -> Primary;

/// Removes later duplicates under ternary equivalence, keeping first occurrences.
pub fn distinct(values: Vec<Primary>, options: &DatetimeOptions) -> Vec<Primary> {
    let mut unique: Vec<Primary> = Vec::with_capacity(values.len());
    for value in values {
        if !unique
            .iter()
            .any(|u| equivalent(u, &value, options) == Ternary::True)
        {
            unique.push(value);
        }
    }
    unique
}

pub fn count(values: &[Primary], _options: &DatetimeOptions) -> Primary {
    Primary::Integer(values.iter().filter(|v| !v.is_null()).count() as i64)
}

pub fn max(values: &[Primary], options: &DatetimeOptions) -> Primary {
    extreme(values, options, greater)
}

pub fn min(values: &[Primary], options: &DatetimeOptions) -> Primary {
    extreme(values, options, less)
}

fn extreme(
    values: &[Primary],
    options: &DatetimeOptions,
    replaces: fn(&Primary, &Primary, &DatetimeOptions) -> Ternary,
) -> Primary {
    let mut result: Option<&Primary> = None;
    for value in values.iter().filter(|v| !v.is_null()) {
        match result {
            None => result = Some(value),
            Some(current) => {
                if replaces(value, current, options) == Ternary::True {
                    result = Some(value);
                }
            }
        }
    }
    result.cloned().unwrap_or(Primary::Null)
}

fn floats(values: &[Primary]) -> Vec<f64> {
    values.iter().filter_map(Primary::to_float).collect()
}

pub fn sum(values: &[Primary], _options: &DatetimeOptions) -> Primary {
    let list = floats(values);
    if list.is_empty() {
        return Primary::Null;
    }
    Primary::from_float(list.iter().sum())
}

pub fn avg(values: &[Primary], _options: &DatetimeOptions) -> Primary {
    let list = floats(values);
    if list.is_empty() {
        return Primary::Null;
    }
    Primary::from_float(list.iter().sum::<f64>() / list.len() as f64)
}

/// Median as a number. Datetimes count as Unix seconds.
pub fn median(values: &[Primary], options: &DatetimeOptions) -> Primary {
    let mut list: Vec<f64> = values
        .iter()
        .filter_map(|v| {
            v.to_float().or_else(|| {
                v.to_datetime(options)
                    .map(|dt| dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9)
            })
        })
        .collect();
    if list.is_empty() {
        return Primary::Null;
    }

    list.sort_by(f64::total_cmp);
    let mid = list.len() / 2;
    let median = if list.len() % 2 == 1 {
        list[mid]
    } else {
        (list[mid - 1] + list[mid]) / 2.0
    };
    Primary::from_float(median)
}

/// Joins the text of non-NULL values; NULL when nothing is left to join.
pub fn list_agg(values: &[Primary], separator: &str) -> Primary {
    let parts: Vec<String> = values
        .iter()
        .filter(|v| !v.is_null())
        .filter_map(|v| match v {
            Primary::String(s) => Some(s.clone()),
            other => other.to_text().or_else(|| Some(other.to_string())),
        })
        .collect();
    if parts.is_empty() {
        return Primary::Null;
    }
    Primary::String(parts.join(separator))
}
