//! # csvlite Core
//!
//! Query execution engine for csvlite: the dynamically typed value model,
//! three-valued logic, the expression evaluator, joins, window functions
//! and the relational view pipeline.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
#[allow(missing_docs)]
pub mod query;
#[allow(missing_docs)]
pub mod ternary;
#[allow(missing_docs)]
pub mod value;

pub use error::{Error, Result};
pub use query::{parse, select, ExecutionContext, Filter, InMemoryCatalog, Scope, TableLoader, View};
pub use ternary::Ternary;
pub use value::{DatetimeOptions, Location, Primary};
