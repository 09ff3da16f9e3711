//! Error types for csvlite.

use thiserror::Error;

/// The main error type for csvlite operations.
///
/// Every evaluation routine returns this error on failure; the first error
/// raised inside an expression aborts the enclosing statement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A scope frame lock was poisoned (internal error)
    #[error("lock poisoned")]
    LockPoisoned,

    /// The statement text could not be tokenized or parsed
    #[error("syntax error at position {position}: {message}")]
    Syntax {
        /// Description of the problem
        message: String,
        /// Character offset in the statement text
        position: usize,
    },

    /// A referenced field does not exist in any bound record
    #[error("field {0} does not exist")]
    FieldNotExist(String),

    /// A field name matches more than one column
    #[error("field {0} is ambiguous")]
    FieldAmbiguous(String),

    /// A grouped view was accessed through a column that is not a group key
    #[error("field {0} is not a group key")]
    FieldNotGroupKey(String),

    /// Row value widths differ
    #[error("row value should contain exactly {expected} values: {expression}")]
    RowValueLengthMismatch {
        /// The side whose width is wrong
        expression: String,
        /// Width required by the other side
        expected: usize,
    },

    /// A subquery used as a value returned more than one record
    #[error("subquery returns too many records: {0}")]
    SubqueryTooManyRecords(String),

    /// A subquery used as a value returned more than one field
    #[error("subquery returns too many fields: {0}")]
    SubqueryTooManyFields(String),

    /// An aggregate function was evaluated against an ungrouped view
    #[error("function {0} cannot aggregate not grouping records")]
    NotGroupingRecords(String),

    /// An aggregate function argument contains another aggregate function
    #[error("aggregate functions are nested at {0}")]
    NestedAggregateFunctions(String),

    /// No function with this name is registered or declared
    #[error("function {0} does not exist")]
    FunctionNotExist(String),

    /// A function was called with the wrong number of arguments
    #[error("function {function} takes {expected}")]
    FunctionArgumentCount {
        /// Function name
        function: String,
        /// Human readable description of the accepted count
        expected: String,
    },

    /// A function argument has an unusable value
    #[error("the {position} argument of function {function} must be {message}")]
    FunctionInvalidArgument {
        /// Function name
        function: String,
        /// Ordinal description of the argument, e.g. "first"
        position: String,
        /// What the argument must be
        message: String,
    },

    /// A user-defined function was declared twice in the same block
    #[error("function {0} is redeclared")]
    FunctionRedeclared(String),

    /// A wildcard was passed to a function other than COUNT
    #[error("wildcard is not permitted in {0}")]
    UnpermittedWildcard(String),

    /// An aggregate or analytic function was used where no record is bound
    #[error("function {0} cannot be used here")]
    UnpermittedStatementFunction(String),

    /// A variable was read or written before declaration
    #[error("variable {0} is undeclared")]
    UndeclaredVariable(String),

    /// A variable was declared twice in the same block
    #[error("variable {0} is redeclared")]
    VariableRedeclared(String),

    /// A cursor was used before declaration
    #[error("cursor {0} is undeclared")]
    UndeclaredCursor(String),

    /// A cursor was declared twice in the same block
    #[error("cursor {0} is redeclared")]
    CursorRedeclared(String),

    /// An open cursor was opened again
    #[error("cursor {0} is already open")]
    CursorAlreadyOpen(String),

    /// A closed cursor was fetched from or counted
    #[error("cursor {0} is closed")]
    CursorClosed(String),

    /// A pseudo cursor was opened, closed or disposed
    #[error("{0} is a pseudo cursor")]
    PseudoCursorMisuse(String),

    /// A table identifier could not be resolved
    #[error("table {0} does not exist")]
    TableNotExist(String),

    /// A temporary view was used before declaration
    #[error("view {0} is undeclared")]
    UndeclaredTemporaryView(String),

    /// A temporary view was declared twice in the same block
    #[error("view {0} is redeclared")]
    TemporaryViewRedeclared(String),

    /// Operands of a set operation have different field counts
    #[error("result set to be combined should contain exactly {expected} fields: {expression}")]
    CombinedSetFieldLength {
        /// The right-hand operand
        expression: String,
        /// Field count of the left-hand operand
        expected: usize,
    },

    /// A WITH clause column list does not match its query
    #[error("select query should return exactly {expected} fields for inline table {name}")]
    InlineTableFieldLength {
        /// Inline table name
        name: String,
        /// Number of declared columns
        expected: usize,
    },

    /// Record width does not match the header
    #[error("field length does not match: {0}")]
    FieldLengthNotMatch(String),

    /// OFFSET did not evaluate to an integer
    #[error("offset {0} is not an integer value")]
    InvalidOffsetNumber(String),

    /// LIMIT did not evaluate to an integer
    #[error("limit {0} is not an integer value")]
    InvalidLimitNumber(String),

    /// LIMIT PERCENT did not evaluate to a number
    #[error("limit percentage {0} is not a float value")]
    InvalidLimitPercentage(String),

    /// A configuration value or other input is unusable
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

impl Error {
    /// Returns true for the error kind that Select and Having recover from by
    /// grouping the whole view.
    pub fn is_not_grouping(&self) -> bool {
        matches!(self, Error::NotGroupingRecords(_))
    }

    pub(crate) fn syntax<S: Into<String>>(message: S, position: usize) -> Self {
        Error::Syntax {
            message: message.into(),
            position,
        }
    }
}

/// A specialized `Result` type for csvlite operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = Error::FieldAmbiguous("id".to_string());
        assert_eq!(err.to_string(), "field id is ambiguous");

        let err = Error::RowValueLengthMismatch {
            expression: "(1, 2, 3)".to_string(),
            expected: 2,
        };
        assert_eq!(
            err.to_string(),
            "row value should contain exactly 2 values: (1, 2, 3)"
        );
    }

    #[test]
    fn test_not_grouping_is_recoverable() {
        assert!(Error::NotGroupingRecords("COUNT".to_string()).is_not_grouping());
        assert!(!Error::FieldNotGroupKey("a".to_string()).is_not_grouping());
    }
}
