//! Built-in scalar functions and the function registry.
//!
//! The registry is built once per engine and shared read-only by every
//! evaluation; nothing is registered lazily.

use super::aggregate::{self, AggregateFn};
use super::analytic::{self, AnalyticFunction};
use crate::error::{Error, Result};
use crate::value::{equal, DatetimeOptions, Primary};
use chrono::SecondsFormat;
use std::collections::HashMap;
use std::fmt;

/// Signature of a built-in scalar function: name, evaluated arguments, datetime settings.
pub type ScalarFn = fn(&str, &[Primary], &DatetimeOptions) -> Result<Primary>;

/// Case-insensitive tables of built-in functions.
pub struct FunctionRegistry {
    scalar: HashMap<&'static str, ScalarFn>,
    aggregate: HashMap<&'static str, AggregateFn>,
    analytic: HashMap<&'static str, Box<dyn AnalyticFunction>>,
}

impl FunctionRegistry {
    /// Registry holding every built-in function.
    pub fn new() -> Self {
        let mut scalar: HashMap<&'static str, ScalarFn> = HashMap::new();
        scalar.insert("COALESCE", coalesce);
        scalar.insert("IF", if_fn);
        scalar.insert("IFNULL", ifnull);
        scalar.insert("NULLIF", nullif);
        scalar.insert("UPPER", upper);
        scalar.insert("LOWER", lower);
        scalar.insert("TRIM", trim);
        scalar.insert("LEN", len);
        scalar.insert("ABS", abs);
        scalar.insert("ROUND", round);
        scalar.insert("CEIL", ceil);
        scalar.insert("FLOOR", floor);
        scalar.insert("INTEGER", integer);
        scalar.insert("FLOAT", float);
        scalar.insert("STRING", string);
        scalar.insert("BOOLEAN", boolean);
        scalar.insert("DATETIME", datetime);

        let mut aggregate: HashMap<&'static str, AggregateFn> = HashMap::new();
        aggregate.insert("COUNT", aggregate::count);
        aggregate.insert("MAX", aggregate::max);
        aggregate.insert("MIN", aggregate::min);
        aggregate.insert("SUM", aggregate::sum);
        aggregate.insert("AVG", aggregate::avg);
        aggregate.insert("MEDIAN", aggregate::median);

        Self {
            scalar,
            aggregate,
            analytic: analytic::builtin_functions(),
        }
    }

    pub fn scalar(&self, name: &str) -> Option<ScalarFn> {
        self.scalar.get(name.to_uppercase().as_str()).copied()
    }

    pub fn aggregate(&self, name: &str) -> Option<AggregateFn> {
        self.aggregate.get(name.to_uppercase().as_str()).copied()
    }

    pub fn analytic(&self, name: &str) -> Option<&dyn AnalyticFunction> {
        self.analytic
            .get(name.to_uppercase().as_str())
            .map(|f| f.as_ref())
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("scalar", &self.scalar.len())
            .field("aggregate", &self.aggregate.len())
            .field("analytic", &self.analytic.len())
            .finish()
    }
}

/// Fails unless `len` lies within `min..=max`.
pub(crate) fn check_arg_count(function: &str, len: usize, min: usize, max: Option<usize>) -> Result<()> {
    let ok = len >= min && max.map_or(true, |m| len <= m);
    if ok {
        return Ok(());
    }
    let plural = |n: usize| if n == 1 { "argument" } else { "arguments" };
    let expected = match max {
        Some(m) if m == min => format!("exactly {} {}", min, plural(min)),
        Some(m) => format!("{} to {} arguments", min, m),
        None => format!("at least {} {}", min, plural(min)),
    };
    Err(Error::FunctionArgumentCount {
        function: function.to_string(),
        expected,
    })
}

pub(crate) fn ordinal(position: usize) -> &'static str {
    match position {
        0 => "first",
        1 => "second",
        2 => "third",
        _ => "next",
    }
}

fn coalesce(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    check_arg_count(name, args.len(), 1, None)?;
    Ok(args
        .iter()
        .find(|a| !a.is_null())
        .cloned()
        .unwrap_or(Primary::Null))
}

fn if_fn(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    check_arg_count(name, args.len(), 3, Some(3))?;
    if args[0].ternary().is_true() {
        Ok(args[1].clone())
    } else {
        Ok(args[2].clone())
    }
}

fn ifnull(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    check_arg_count(name, args.len(), 2, Some(2))?;
    if args[0].is_null() {
        Ok(args[1].clone())
    } else {
        Ok(args[0].clone())
    }
}

fn nullif(name: &str, args: &[Primary], options: &DatetimeOptions) -> Result<Primary> {
    check_arg_count(name, args.len(), 2, Some(2))?;
    if equal(&args[0], &args[1], options).is_true() {
        Ok(Primary::Null)
    } else {
        Ok(args[0].clone())
    }
}

fn map_text(name: &str, args: &[Primary], f: impl Fn(&str) -> Primary) -> Result<Primary> {
    check_arg_count(name, args.len(), 1, Some(1))?;
    Ok(match args[0].to_text() {
        Some(s) => f(&s),
        None => Primary::Null,
    })
}

fn upper(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    map_text(name, args, |s| Primary::String(s.to_uppercase()))
}

fn lower(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    map_text(name, args, |s| Primary::String(s.to_lowercase()))
}

fn trim(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    map_text(name, args, |s| Primary::String(s.trim().to_string()))
}

fn len(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    map_text(name, args, |s| Primary::Integer(s.chars().count() as i64))
}

fn abs(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    check_arg_count(name, args.len(), 1, Some(1))?;
    Ok(match args[0].to_float() {
        Some(f) => Primary::from_float(f.abs()),
        None => Primary::Null,
    })
}

/// Number and decimal places for ROUND, CEIL and FLOOR; `None` yields NULL.
fn round_params(name: &str, args: &[Primary]) -> Result<Option<(f64, f64)>> {
    check_arg_count(name, args.len(), 1, Some(2))?;
    let Some(number) = args[0].to_float() else {
        return Ok(None);
    };
    let place = match args.get(1) {
        Some(p) => match p.to_integer() {
            Some(i) => i as f64,
            None => return Ok(None),
        },
        None => 0.0,
    };
    Ok(Some((number, place)))
}

fn round_half_away(f: f64, place: f64) -> f64 {
    let pow = 10f64.powf(place);
    if f < 0.0 {
        (pow * f - 0.5).ceil() / pow
    } else {
        (pow * f + 0.5).floor() / pow
    }
}

fn round(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    Ok(round_params(name, args)?
        .map(|(n, p)| Primary::from_float(round_half_away(n, p)))
        .unwrap_or(Primary::Null))
}

fn ceil(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    Ok(round_params(name, args)?
        .map(|(n, p)| {
            let pow = 10f64.powf(p);
            Primary::from_float((pow * n).ceil() / pow)
        })
        .unwrap_or(Primary::Null))
}

fn floor(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    Ok(round_params(name, args)?
        .map(|(n, p)| {
            let pow = 10f64.powf(p);
            Primary::from_float((pow * n).floor() / pow)
        })
        .unwrap_or(Primary::Null))
}

fn integer(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    check_arg_count(name, args.len(), 1, Some(1))?;
    Ok(match &args[0] {
        Primary::Integer(i) => Primary::Integer(*i),
        Primary::Float(f) => Primary::Integer(round_half_away(*f, 0.0) as i64),
        Primary::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Primary::Integer(i)
            } else if let Ok(f) = s.parse::<f64>() {
                Primary::Integer(round_half_away(f, 0.0) as i64)
            } else {
                Primary::Null
            }
        }
        Primary::Datetime(dt) => Primary::Integer(dt.timestamp()),
        _ => Primary::Null,
    })
}

fn float(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    check_arg_count(name, args.len(), 1, Some(1))?;
    Ok(match &args[0] {
        Primary::Datetime(dt) => {
            Primary::Float(dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9)
        }
        other => other.to_float().map(Primary::Float).unwrap_or(Primary::Null),
    })
}

fn string(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    check_arg_count(name, args.len(), 1, Some(1))?;
    Ok(match &args[0] {
        Primary::Null => Primary::Null,
        Primary::Boolean(b) => Primary::String(b.to_string()),
        Primary::Ternary(t) => Primary::String(t.to_string()),
        Primary::Datetime(dt) => Primary::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)),
        other => other.to_text().map(Primary::String).unwrap_or(Primary::Null),
    })
}

fn boolean(name: &str, args: &[Primary], _: &DatetimeOptions) -> Result<Primary> {
    check_arg_count(name, args.len(), 1, Some(1))?;
    Ok(args[0]
        .to_boolean()
        .map(Primary::Boolean)
        .unwrap_or(Primary::Null))
}

fn datetime(name: &str, args: &[Primary], options: &DatetimeOptions) -> Result<Primary> {
    check_arg_count(name, args.len(), 1, Some(1))?;
    Ok(args[0]
        .to_datetime(options)
        .map(Primary::Datetime)
        .unwrap_or(Primary::Null))
}
