/// Query engine module
///
/// SQL parsing, expression evaluation and the view pipeline.
/// Aggregate reducers
#[allow(missing_docs)]
pub mod aggregate;
/// Window functions
#[allow(missing_docs)]
pub mod analytic;
/// Abstract Syntax Tree types
#[allow(missing_docs)]
pub mod ast;
/// Query executor
#[allow(missing_docs)]
pub mod executor;
/// Expression evaluator
#[allow(missing_docs)]
pub mod filter;
/// Built-in scalar functions and the function registry
#[allow(missing_docs)]
pub mod function;
/// Column metadata
#[allow(missing_docs)]
pub mod header;
/// Join engine
#[allow(missing_docs)]
pub mod join;
/// SQL lexer
#[allow(missing_docs)]
pub mod lexer;
/// Table sources
#[allow(missing_docs)]
pub mod loader;
/// SQL parser
#[allow(missing_docs)]
pub mod parser;
/// Records and cells
#[allow(missing_docs)]
pub mod record;
/// Variables, temporary views, cursors and user-defined functions
#[allow(missing_docs)]
pub mod scope;
/// View pipeline
#[allow(missing_docs)]
pub mod view;

// Re-export main types
pub use ast::*;
pub use executor::{open_cursor, select, ExecutionContext};
pub use filter::Filter;
pub use function::FunctionRegistry;
pub use header::{Header, HeaderField};
pub use lexer::{Lexer, Token};
pub use loader::{InMemoryCatalog, TableLoader};
pub use parser::{parse, parse_statements, Parser};
pub use record::{Cell, Record};
pub use scope::{FetchPosition, Scope, UserDefinedFunction};
pub use view::View;
