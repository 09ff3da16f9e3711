//! Ternary comparison of two values of possibly different types.

use super::{DatetimeOptions, Primary};
use crate::ternary::Ternary;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Outcome of comparing two values after coercing them to a common type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonResult {
    /// Equal
    Equal,
    /// Equal as booleans; booleans have no order
    BoolEqual,
    /// Not equal
    NotEqual,
    /// Unequal booleans
    BoolNotEqual,
    /// Strictly less
    Less,
    /// Strictly greater
    Greater,
    /// The values share no common type, or one of them is NULL
    Incommensurable,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// =
    Equal,
    /// <> or !=
    NotEqual,
    /// <
    Less,
    /// <=
    LessOrEqual,
    /// >
    Greater,
    /// >=
    GreaterOrEqual,
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOperator::Equal => write!(f, "="),
            ComparisonOperator::NotEqual => write!(f, "<>"),
            ComparisonOperator::Less => write!(f, "<"),
            ComparisonOperator::LessOrEqual => write!(f, "<="),
            ComparisonOperator::Greater => write!(f, ">"),
            ComparisonOperator::GreaterOrEqual => write!(f, ">="),
        }
    }
}

fn from_ordering(ord: Option<Ordering>) -> ComparisonResult {
    match ord {
        Some(Ordering::Equal) => ComparisonResult::Equal,
        Some(Ordering::Less) => ComparisonResult::Less,
        Some(Ordering::Greater) => ComparisonResult::Greater,
        None => ComparisonResult::Incommensurable,
    }
}

/// Compares two values as integers, floats, datetimes, booleans or strings,
/// taking the first type both sides can be coerced to.
pub fn compare_combinedly(
    p1: &Primary,
    p2: &Primary,
    options: &DatetimeOptions,
) -> ComparisonResult {
    if p1.is_null() || p2.is_null() {
        return ComparisonResult::Incommensurable;
    }

    if let Some(i1) = p1.to_integer() {
        if let Some(i2) = p2.to_integer() {
            return from_ordering(Some(i1.cmp(&i2)));
        }
    }

    if let Some(f1) = p1.to_float() {
        if let Some(f2) = p2.to_float() {
            return from_ordering(f1.partial_cmp(&f2));
        }
    }

    if let Some(d1) = p1.to_datetime(options) {
        if let Some(d2) = p2.to_datetime(options) {
            return from_ordering(Some(d1.cmp(&d2)));
        }
    }

    if let Some(b1) = p1.to_boolean() {
        if let Some(b2) = p2.to_boolean() {
            return if b1 == b2 {
                ComparisonResult::BoolEqual
            } else {
                ComparisonResult::BoolNotEqual
            };
        }
    }

    if let (Primary::String(s1), Primary::String(s2)) = (p1, p2) {
        let s1 = s1.trim().to_uppercase();
        let s2 = s2.trim().to_uppercase();
        return from_ordering(Some(s1.cmp(&s2)));
    }

    ComparisonResult::Incommensurable
}

/// `p1 = p2`
pub fn equal(p1: &Primary, p2: &Primary, options: &DatetimeOptions) -> Ternary {
    match compare_combinedly(p1, p2, options) {
        ComparisonResult::Incommensurable => Ternary::Unknown,
        r => Ternary::from_bool(matches!(
            r,
            ComparisonResult::Equal | ComparisonResult::BoolEqual
        )),
    }
}

/// `p1 <> p2`
pub fn not_equal(p1: &Primary, p2: &Primary, options: &DatetimeOptions) -> Ternary {
    equal(p1, p2, options).not()
}

/// `p1 < p2`
pub fn less(p1: &Primary, p2: &Primary, options: &DatetimeOptions) -> Ternary {
    ordered(p1, p2, options, |r| r == ComparisonResult::Less)
}

/// `p1 > p2`
pub fn greater(p1: &Primary, p2: &Primary, options: &DatetimeOptions) -> Ternary {
    ordered(p1, p2, options, |r| r == ComparisonResult::Greater)
}

/// `p1 <= p2`
pub fn less_or_equal(p1: &Primary, p2: &Primary, options: &DatetimeOptions) -> Ternary {
    ordered(p1, p2, options, |r| {
        r == ComparisonResult::Less || r == ComparisonResult::Equal
    })
}

/// `p1 >= p2`
pub fn greater_or_equal(p1: &Primary, p2: &Primary, options: &DatetimeOptions) -> Ternary {
    ordered(p1, p2, options, |r| {
        r == ComparisonResult::Greater || r == ComparisonResult::Equal
    })
}

fn ordered<F>(p1: &Primary, p2: &Primary, options: &DatetimeOptions, accept: F) -> Ternary
where
    F: Fn(ComparisonResult) -> bool,
{
    match compare_combinedly(p1, p2, options) {
        ComparisonResult::Incommensurable
        | ComparisonResult::BoolEqual
        | ComparisonResult::BoolNotEqual => Ternary::Unknown,
        r => Ternary::from_bool(accept(r)),
    }
}

/// Applies a comparison operator to two values.
pub fn compare(
    p1: &Primary,
    p2: &Primary,
    operator: ComparisonOperator,
    options: &DatetimeOptions,
) -> Ternary {
    match operator {
        ComparisonOperator::Equal => equal(p1, p2, options),
        ComparisonOperator::NotEqual => not_equal(p1, p2, options),
        ComparisonOperator::Less => less(p1, p2, options),
        ComparisonOperator::LessOrEqual => less_or_equal(p1, p2, options),
        ComparisonOperator::Greater => greater(p1, p2, options),
        ComparisonOperator::GreaterOrEqual => greater_or_equal(p1, p2, options),
    }
}

/// Compares two row values of the same width lexicographically.
///
/// Callers check the widths first; rows of different widths are UNKNOWN.
pub fn compare_row_values(
    row1: &[Primary],
    row2: &[Primary],
    operator: ComparisonOperator,
    options: &DatetimeOptions,
) -> Ternary {
    if row1.len() != row2.len() {
        return Ternary::Unknown;
    }

    let mut unknown = false;
    for (p1, p2) in row1.iter().zip(row2) {
        let r = compare_combinedly(p1, p2, options);
        let bool_result = matches!(
            r,
            ComparisonResult::BoolEqual | ComparisonResult::BoolNotEqual
        );

        match operator {
            ComparisonOperator::Equal | ComparisonOperator::NotEqual => {
                let ne_result = if operator == ComparisonOperator::Equal {
                    Ternary::False
                } else {
                    Ternary::True
                };
                match r {
                    ComparisonResult::Incommensurable => unknown = true,
                    ComparisonResult::Equal | ComparisonResult::BoolEqual => {}
                    _ => return ne_result,
                }
            }
            _ => {
                if r == ComparisonResult::Incommensurable || bool_result {
                    return Ternary::Unknown;
                }
                match r {
                    ComparisonResult::Equal => {}
                    ComparisonResult::Less => {
                        return Ternary::from_bool(matches!(
                            operator,
                            ComparisonOperator::Less | ComparisonOperator::LessOrEqual
                        ))
                    }
                    _ => {
                        return Ternary::from_bool(matches!(
                            operator,
                            ComparisonOperator::Greater | ComparisonOperator::GreaterOrEqual
                        ))
                    }
                }
            }
        }
    }

    if unknown {
        return Ternary::Unknown;
    }
    Ternary::from_bool(matches!(
        operator,
        ComparisonOperator::Equal
            | ComparisonOperator::LessOrEqual
            | ComparisonOperator::GreaterOrEqual
    ))
}

/// Equality in which NULL matches NULL; used to form groups and partitions.
pub fn equivalent(p1: &Primary, p2: &Primary, options: &DatetimeOptions) -> Ternary {
    if p1.is_null() && p2.is_null() {
        return Ternary::True;
    }
    equal(p1, p2, options)
}

/// `p1 IS p2` where `p2` is NULL or a truth value.
pub fn is(p1: &Primary, p2: &Primary) -> Ternary {
    if p2.is_null() {
        return Ternary::from_bool(p1.is_null());
    }
    Ternary::from_bool(p1.ternary() == p2.ternary())
}

#[derive(Debug, PartialEq)]
enum PatternToken {
    AnyString,
    AnyChar,
    Char(char),
}

fn tokenize_pattern(pattern: &str) -> Vec<PatternToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some(&next) if next == '%' || next == '_' || next == '\\' => {
                    chars.next();
                    tokens.push(PatternToken::Char(next));
                }
                _ => tokens.push(PatternToken::Char('\\')),
            },
            '%' => {
                if tokens.last() != Some(&PatternToken::AnyString) {
                    tokens.push(PatternToken::AnyString);
                }
            }
            '_' => tokens.push(PatternToken::AnyChar),
            _ => tokens.push(PatternToken::Char(c)),
        }
    }
    tokens
}

fn matches_pattern(text: &[char], pattern: &[PatternToken]) -> bool {
    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(PatternToken::AnyString) => {
                backtrack = Some((p, t));
                p += 1;
                continue;
            }
            Some(PatternToken::AnyChar) => {
                t += 1;
                p += 1;
                continue;
            }
            Some(PatternToken::Char(c)) if *c == text[t] => {
                t += 1;
                p += 1;
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((bp, bt)) => {
                backtrack = Some((bp, bt + 1));
                p = bp + 1;
                t = bt + 1;
            }
            None => return false,
        }
    }

    pattern[p..]
        .iter()
        .all(|token| *token == PatternToken::AnyString)
}

/// `p1 LIKE pattern`, case-insensitive.
pub fn like(p1: &Primary, pattern: &Primary) -> Ternary {
    if p1.is_null() || pattern.is_null() {
        return Ternary::Unknown;
    }
    let (Some(text), Some(pattern)) = (p1.to_text(), pattern.to_text()) else {
        return Ternary::Unknown;
    };

    let text: Vec<char> = text.to_uppercase().chars().collect();
    let tokens = tokenize_pattern(&pattern.to_uppercase());
    Ternary::from_bool(matches_pattern(&text, &tokens))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> DatetimeOptions {
        DatetimeOptions::default()
    }

    #[test]
    fn test_compare_combinedly_order() {
        let o = opts();
        assert_eq!(
            compare_combinedly(&Primary::Integer(1), &Primary::from("1"), &o),
            ComparisonResult::Equal
        );
        assert_eq!(
            compare_combinedly(&Primary::Float(1.5), &Primary::Integer(2), &o),
            ComparisonResult::Less
        );
        assert_eq!(
            compare_combinedly(&Primary::from("abc"), &Primary::from(" ABC "), &o),
            ComparisonResult::Equal
        );
        assert_eq!(
            compare_combinedly(&Primary::Boolean(true), &Primary::Integer(1), &o),
            ComparisonResult::BoolEqual
        );
        assert_eq!(
            compare_combinedly(&Primary::Null, &Primary::Null, &o),
            ComparisonResult::Incommensurable
        );
        assert_eq!(
            compare_combinedly(&Primary::Boolean(true), &Primary::from("abc"), &o),
            ComparisonResult::Incommensurable
        );
    }

    #[test]
    fn test_datetime_against_epoch() {
        let o = opts();
        let dt = Primary::from("1970-01-02 00:00:00");
        assert_eq!(equal(&dt, &Primary::Integer(86400), &o), Ternary::True);
        assert_eq!(less(&dt, &Primary::from("1970-01-03"), &o), Ternary::True);
    }

    #[test]
    fn test_operators_return_unknown() {
        let o = opts();
        assert_eq!(equal(&Primary::Null, &Primary::Integer(1), &o), Ternary::Unknown);
        assert_eq!(
            less(&Primary::Boolean(true), &Primary::Boolean(false), &o),
            Ternary::Unknown
        );
        assert_eq!(
            not_equal(&Primary::Boolean(true), &Primary::Boolean(false), &o),
            Ternary::True
        );
        assert_eq!(
            greater_or_equal(&Primary::Integer(3), &Primary::Integer(3), &o),
            Ternary::True
        );
    }

    #[test]
    fn test_row_values() {
        let o = opts();
        let r1 = vec![Primary::Integer(1), Primary::Integer(2)];
        let r2 = vec![Primary::Integer(1), Primary::Integer(3)];
        assert_eq!(compare_row_values(&r1, &r2, ComparisonOperator::Less, &o), Ternary::True);
        assert_eq!(compare_row_values(&r1, &r2, ComparisonOperator::Equal, &o), Ternary::False);
        assert_eq!(compare_row_values(&r1, &r1, ComparisonOperator::GreaterOrEqual, &o), Ternary::True);

        let r3 = vec![Primary::Null, Primary::Integer(2)];
        assert_eq!(compare_row_values(&r3, &r1, ComparisonOperator::Equal, &o), Ternary::Unknown);
        let r4 = vec![Primary::Null, Primary::Integer(5)];
        assert_eq!(compare_row_values(&r4, &r1, ComparisonOperator::Equal, &o), Ternary::False);
    }

    #[test]
    fn test_equivalent_and_is() {
        let o = opts();
        assert_eq!(equivalent(&Primary::Null, &Primary::Null, &o), Ternary::True);
        assert_eq!(is(&Primary::Null, &Primary::Null), Ternary::True);
        assert_eq!(is(&Primary::Integer(1), &Primary::Ternary(Ternary::True)), Ternary::True);
        assert_eq!(is(&Primary::Null, &Primary::Ternary(Ternary::Unknown)), Ternary::True);
    }

    #[test]
    fn test_like() {
        let s = |v: &str| Primary::from(v);
        assert_eq!(like(&s("abcdef"), &s("ABC%")), Ternary::True);
        assert_eq!(like(&s("abcdef"), &s("a_c%f")), Ternary::True);
        assert_eq!(like(&s("abcdef"), &s("%cd%")), Ternary::True);
        assert_eq!(like(&s("abcdef"), &s("%cf")), Ternary::False);
        assert_eq!(like(&s("10%"), &s("10\\%")), Ternary::True);
        assert_eq!(like(&s("100"), &s("10\\%")), Ternary::False);
        assert_eq!(like(&s(""), &s("")), Ternary::True);
        assert_eq!(like(&s("a"), &s("")), Ternary::False);
        assert_eq!(like(&Primary::Integer(123), &s("1%")), Ternary::True);
        assert_eq!(like(&Primary::Null, &s("%")), Ternary::Unknown);
    }
}
