//! Three-valued logic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A three-valued truth value.
///
/// The discriminants order the values so that `And` is the minimum and
/// `Or` is the maximum of its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ternary {
    /// FALSE
    False = -1,
    /// UNKNOWN
    Unknown = 0,
    /// TRUE
    True = 1,
}

impl Ternary {
    /// Parses the literal names `TRUE`, `FALSE` and `UNKNOWN`, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "TRUE" => Some(Ternary::True),
            "FALSE" => Some(Ternary::False),
            "UNKNOWN" => Some(Ternary::Unknown),
            _ => None,
        }
    }

    /// Converts a boolean into TRUE or FALSE.
    pub fn from_bool(b: bool) -> Self {
        if b {
            Ternary::True
        } else {
            Ternary::False
        }
    }

    /// Returns the boolean value, or `None` for UNKNOWN.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Ternary::True => Some(true),
            Ternary::False => Some(false),
            Ternary::Unknown => None,
        }
    }

    /// Returns true only for TRUE.
    pub fn is_true(self) -> bool {
        self == Ternary::True
    }

    /// Logical conjunction.
    pub fn and(self, other: Ternary) -> Ternary {
        self.min(other)
    }

    /// Logical disjunction.
    pub fn or(self, other: Ternary) -> Ternary {
        self.max(other)
    }

    /// Logical negation. UNKNOWN stays UNKNOWN.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Ternary {
        match self {
            Ternary::True => Ternary::False,
            Ternary::False => Ternary::True,
            Ternary::Unknown => Ternary::Unknown,
        }
    }

    /// Conjunction over all values; TRUE for an empty input.
    pub fn all<I: IntoIterator<Item = Ternary>>(values: I) -> Ternary {
        let mut result = Ternary::True;
        for t in values {
            match t {
                Ternary::False => return Ternary::False,
                Ternary::Unknown => result = Ternary::Unknown,
                Ternary::True => {}
            }
        }
        result
    }

    /// Disjunction over all values; FALSE for an empty input.
    pub fn any<I: IntoIterator<Item = Ternary>>(values: I) -> Ternary {
        let mut result = Ternary::False;
        for t in values {
            match t {
                Ternary::True => return Ternary::True,
                Ternary::Unknown => result = Ternary::Unknown,
                Ternary::False => {}
            }
        }
        result
    }
}

impl fmt::Display for Ternary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ternary::True => write!(f, "TRUE"),
            Ternary::False => write!(f, "FALSE"),
            Ternary::Unknown => write!(f, "UNKNOWN"),
        }
    }
}
