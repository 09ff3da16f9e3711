//! # csvlite
//!
//! Run SQL SELECT queries over in-memory tables with dynamically typed
//! values, three-valued logic, parallel joins, implicit
//! grouping and window functions.
//!
//! ## Quick Start
//!
//! ```rust
//! use csvlite::{Engine, EngineConfig, Primary};
//!
//! let engine = Engine::new(EngineConfig::default())?;
//! engine.register_table(
//!     "users",
//!     &["id", "name"],
//!     vec![
//!         vec![Primary::Integer(1), Primary::from("Alice")],
//!         vec![Primary::Integer(2), Primary::from("Bob")],
//!     ],
//! )?;
//!
//! let session = engine.session();
//! let view = session.query("SELECT name FROM users WHERE id = 2")?;
//! assert_eq!(view.rows(), vec![vec![Primary::from("Bob")]]);
//! # Ok::<(), csvlite::Error>(())
//! ```
//!
//! ## Sessions
//!
//! A [`Session`] owns a scope chain: variables, temporary views, cursors and
//! user-defined functions declared through it are visible to every query it
//! runs. Each `Engine::session()` starts with its own scope chain; clones of
//! a `Session` share the frames that existed when it was cloned.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod logging;

use csvlite_core::query::{executor, parse_statements, Statement};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;

pub use config::EngineConfig;
pub use csvlite_core::query::{
    ExecutionContext, FetchPosition, Filter, Header, HeaderField, InMemoryCatalog, Record, Scope,
    TableLoader, UserDefinedFunction, View,
};
pub use csvlite_core::{DatetimeOptions, Error, Location, Primary, Result, Ternary};
pub use logging::{LogConfig, LogFormat, LogOutput};

/// A query engine over a catalog of in-memory tables.
///
/// Cloning is cheap; clones share the catalog and the execution context.
#[derive(Debug, Clone)]
pub struct Engine {
    context: Arc<ExecutionContext>,
    catalog: Arc<InMemoryCatalog>,
    config: EngineConfig,
}

impl Engine {
    /// Creates an engine with an empty catalog.
    ///
    /// Fails when the configured timezone cannot be parsed.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let catalog = Arc::new(InMemoryCatalog::new());
        let context = ExecutionContext::new(catalog.clone())
            .with_datetime(config.datetime_options()?)
            .with_cpu(config.cpu);
        debug!(cpu = context.cpu, timezone = %config.timezone, "engine created");
        Ok(Engine {
            context: Arc::new(context),
            catalog,
            config,
        })
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Installs the global `tracing` subscriber described by the configured
    /// [`LogConfig`], or the default one when none is configured.
    pub fn init_logging(&self) -> Result<Option<WorkerGuard>> {
        self.config.log.clone().unwrap_or_default().init()
    }

    /// Adds or replaces a table. Every row must be as wide as `columns`.
    pub fn register_table<S: AsRef<str>>(&self, name: &str, columns: &[S], rows: Vec<Vec<Primary>>) -> Result<()> {
        self.catalog.insert(name, columns, rows)
    }

    /// Removes a table; returns false if it was not registered.
    pub fn drop_table(&self, name: &str) -> Result<bool> {
        self.catalog.remove(name)
    }

    /// Sets the rows read by `FROM STDIN`.
    pub fn set_stdin<S: AsRef<str>>(&self, columns: &[S], rows: Vec<Vec<Primary>>) -> Result<()> {
        self.catalog.set_external_input(columns, rows)
    }

    /// Names of the registered tables, upper-cased and sorted.
    pub fn table_names(&self) -> Result<Vec<String>> {
        self.catalog.table_names()
    }

    /// Opens a session with a fresh scope chain.
    pub fn session(&self) -> Session {
        Session {
            context: self.context.clone(),
            scope: Scope::new(),
        }
    }
}

/// Variable names may be written with or without their `@`.
fn variable_name(name: &str) -> &str {
    name.strip_prefix('@').unwrap_or(name)
}

/// A sequence of queries sharing one scope chain.
///
/// Cloning shares the frames present at the time of the clone: declarations
/// in them are seen by both copies. Blocks entered afterwards stay private to
/// the copy that entered them.
#[derive(Debug, Clone)]
pub struct Session {
    context: Arc<ExecutionContext>,
    scope: Scope,
}

impl Session {
    fn filter(&self) -> Filter<'static> {
        Filter::new(self.context.clone(), self.scope.clone())
    }

    /// Runs one SELECT statement and returns its result.
    pub fn query(&self, sql: &str) -> Result<View> {
        let mut views = self.execute(sql)?;
        match views.len() {
            1 => Ok(views.remove(0)),
            n => Err(Error::Syntax {
                message: format!("expected exactly one statement, found {}", n),
                position: 0,
            }),
        }
    }

    /// Runs `;`-separated SELECT statements in order, stopping at the first error.
    pub fn execute(&self, sql: &str) -> Result<Vec<View>> {
        let statements = parse_statements(sql)?;
        let filter = self.filter();
        let mut views = Vec::with_capacity(statements.len());
        for statement in &statements {
            let Statement::Select(query) = statement;
            let view = executor::select(query, &filter)?;
            info!(records = view.len(), fields = view.header.len(), "query finished");
            views.push(view);
        }
        Ok(views)
    }

    /// The scope chain of this session.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Starts a nested block; declarations made inside it vanish at [`Session::exit_block`].
    pub fn enter_block(&mut self) {
        self.scope.enter_block();
    }

    /// Ends the innermost block. The session's outermost frame is never removed.
    pub fn exit_block(&mut self) {
        self.scope.exit_block();
    }

    // Variables

    /// Declares a variable in the innermost block.
    pub fn declare_variable(&self, name: &str, value: Primary) -> Result<()> {
        self.scope.declare_variable(variable_name(name), value)
    }

    /// Reads a variable, searching from the innermost block outwards.
    pub fn variable(&self, name: &str) -> Result<Primary> {
        self.scope.get_variable(variable_name(name))
    }

    /// Assigns to an already declared variable.
    pub fn set_variable(&self, name: &str, value: Primary) -> Result<()> {
        self.scope.set_variable(variable_name(name), value)
    }

    /// Removes a variable.
    pub fn dispose_variable(&self, name: &str) -> Result<()> {
        self.scope.dispose_variable(variable_name(name))
    }

    // Temporary views

    /// Stores the result of `sql` as a temporary view readable by name in FROM.
    pub fn create_view(&self, name: &str, sql: &str) -> Result<()> {
        let view = self.query(sql)?;
        self.scope.declare_view(name, view)
    }

    /// Declares a temporary view from rows built elsewhere.
    pub fn declare_view(&self, name: &str, view: View) -> Result<()> {
        self.scope.declare_view(name, view)
    }

    /// Replaces the contents of a declared temporary view.
    pub fn replace_view(&self, name: &str, view: View) -> Result<()> {
        self.scope.replace_view(name, view)
    }

    /// Removes a temporary view.
    pub fn dispose_view(&self, name: &str) -> Result<()> {
        self.scope.dispose_view(name)
    }

    // Cursors

    /// Declares a cursor over a SELECT statement. The query runs on open.
    pub fn declare_cursor(&self, name: &str, sql: &str) -> Result<()> {
        let Statement::Select(query) = csvlite_core::parse(sql)?;
        self.scope.declare_cursor(name, query)
    }

    /// Runs the cursor's query and positions it before the first row.
    pub fn open_cursor(&self, name: &str) -> Result<()> {
        executor::open_cursor(name, &self.filter())
    }

    /// Moves the cursor and returns the row under it, `None` when out of range.
    pub fn fetch_cursor(&self, name: &str, position: FetchPosition) -> Result<Option<Vec<Primary>>> {
        self.scope.fetch_cursor(name, position)
    }

    /// Closes the cursor. Closing a closed cursor is not an error.
    pub fn close_cursor(&self, name: &str) -> Result<()> {
        self.scope.close_cursor(name)
    }

    /// Removes the cursor declaration.
    pub fn dispose_cursor(&self, name: &str) -> Result<()> {
        self.scope.dispose_cursor(name)
    }

    /// Number of rows of an open cursor.
    pub fn cursor_count(&self, name: &str) -> Result<usize> {
        self.scope.cursor_count(name)
    }

    // Functions

    /// Declares a user-defined scalar or aggregate function.
    pub fn declare_function(&self, function: UserDefinedFunction) -> Result<()> {
        self.scope.declare_function(function)
    }
}
