//! Session state visible to queries, as a chain of block frames.
//!
//! Frames are ordered innermost first. The last frame is the global frame of
//! the session and is never removed. Every name is matched case-insensitively.

use super::ast::SelectQuery;
use super::header::Header;
use super::record::Record;
use super::view::View;
use crate::error::{Error, Result};
use crate::ternary::Ternary;
use crate::value::Primary;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Body of a user-defined function.
#[derive(Clone)]
pub enum FunctionBody {
    /// Called with the evaluated arguments.
    Scalar(Arc<dyn Fn(&[Primary]) -> Result<Primary> + Send + Sync>),
    /// Called with the value list of a group and the evaluated extra arguments.
    Aggregate(Arc<dyn Fn(&[Primary], &[Primary]) -> Result<Primary> + Send + Sync>),
}

/// A function declared by the embedding application.
#[derive(Clone)]
pub struct UserDefinedFunction {
    pub name: String,
    pub min_args: usize,
    pub max_args: Option<usize>,
    pub body: FunctionBody,
}

impl UserDefinedFunction {
    /// Scalar function taking exactly `args` arguments.
    pub fn scalar<F>(name: &str, args: usize, f: F) -> Self
    where
        F: Fn(&[Primary]) -> Result<Primary> + Send + Sync + 'static,
    {
        Self {
            name: name.to_uppercase(),
            min_args: args,
            max_args: Some(args),
            body: FunctionBody::Scalar(Arc::new(f)),
        }
    }

    /// Aggregate function taking `extra_args` arguments after the aggregated expression.
    pub fn aggregate<F>(name: &str, extra_args: usize, f: F) -> Self
    where
        F: Fn(&[Primary], &[Primary]) -> Result<Primary> + Send + Sync + 'static,
    {
        Self {
            name: name.to_uppercase(),
            min_args: extra_args,
            max_args: Some(extra_args),
            body: FunctionBody::Aggregate(Arc::new(f)),
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self.body, FunctionBody::Aggregate(_))
    }

    /// Validates the argument count, not counting the aggregated expression.
    pub fn check_args(&self, len: usize) -> Result<()> {
        super::function::check_arg_count(&self.name, len, self.min_args, self.max_args)
    }
}

impl fmt::Debug for UserDefinedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDefinedFunction")
            .field("name", &self.name)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .field("aggregate", &self.is_aggregate())
            .finish()
    }
}

/// Positions accepted by FETCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPosition {
    Next,
    Prior,
    First,
    Last,
    Absolute(i64),
    Relative(i64),
}

#[derive(Debug, Clone)]
struct Cursor {
    name: String,
    query: Option<SelectQuery>,
    view: Option<View>,
    index: i64,
    fetched: bool,
    is_pseudo: bool,
}

impl Cursor {
    fn view(&self) -> Result<&View> {
        self.view
            .as_ref()
            .ok_or_else(|| Error::CursorClosed(self.name.clone()))
    }

    fn fetch(&mut self, position: FetchPosition) -> Result<Option<Vec<Primary>>> {
        let len = self.view()?.records.len() as i64;
        let index = match position {
            FetchPosition::Next => self.index + 1,
            FetchPosition::Prior => self.index - 1,
            FetchPosition::First => 0,
            FetchPosition::Last => len - 1,
            FetchPosition::Absolute(n) => n,
            FetchPosition::Relative(n) => self.index + n,
        };
        self.fetched = true;

        if index < 0 {
            self.index = -1;
            return Ok(None);
        }
        if index >= len {
            self.index = len;
            return Ok(None);
        }
        self.index = index;
        Ok(self
            .view()?
            .records
            .get(index as usize)
            .map(Record::values))
    }
}

/// Declarations of one statement block.
#[derive(Debug, Default)]
struct Frame {
    variables: HashMap<String, Primary>,
    views: HashMap<String, View>,
    cursors: HashMap<String, Cursor>,
    functions: HashMap<String, Arc<UserDefinedFunction>>,
}

/// A chain of frames. Cloning shares the frames.
#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<Arc<RwLock<Frame>>>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

fn key(name: &str) -> String {
    name.to_uppercase()
}

impl Scope {
    /// A scope holding only the global frame.
    pub fn new() -> Self {
        Self {
            frames: vec![Arc::new(RwLock::new(Frame::default()))],
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Pushes a frame for a nested block; its declarations shadow outer ones.
    pub fn enter_block(&mut self) {
        self.frames.insert(0, Arc::new(RwLock::new(Frame::default())));
        debug!(depth = self.frames.len(), "entered block");
    }

    /// Drops the innermost frame. The global frame stays.
    pub fn exit_block(&mut self) {
        if self.frames.len() > 1 {
            self.frames.remove(0);
            debug!(depth = self.frames.len(), "exited block");
        }
    }

    /// Runs `f` on the first frame for which `found` holds.
    fn with_frame<T>(
        &self,
        found: impl Fn(&Frame) -> bool,
        f: impl FnOnce(&mut Frame) -> T,
    ) -> Result<Option<T>> {
        for frame in &self.frames {
            let mut guard = frame.write().map_err(|_| Error::LockPoisoned)?;
            if found(&guard) {
                return Ok(Some(f(&mut guard)));
            }
        }
        Ok(None)
    }

    /// The first result of `f` over the frames, innermost first. Lookups
    /// take read locks so parallel join chunks do not serialize on them.
    fn find<T>(&self, f: impl Fn(&Frame) -> Option<T>) -> Result<Option<T>> {
        for frame in &self.frames {
            let guard = frame.read().map_err(|_| Error::LockPoisoned)?;
            if let Some(found) = f(&guard) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    fn read_cursor<T>(&self, name: &str, f: impl FnOnce(&Cursor) -> Result<T>) -> Result<T> {
        let k = key(name);
        for frame in &self.frames {
            let guard = frame.read().map_err(|_| Error::LockPoisoned)?;
            if let Some(cursor) = guard.cursors.get(&k) {
                return f(cursor);
            }
        }
        Err(Error::UndeclaredCursor(name.to_string()))
    }

    fn with_current<T>(&self, f: impl FnOnce(&mut Frame) -> T) -> Result<T> {
        let mut guard = self.frames[0].write().map_err(|_| Error::LockPoisoned)?;
        Ok(f(&mut guard))
    }

    // Variables

    pub fn declare_variable(&self, name: &str, value: Primary) -> Result<()> {
        let k = key(name);
        self.with_current(|frame| {
            if frame.variables.contains_key(&k) {
                return Err(Error::VariableRedeclared(name.to_string()));
            }
            frame.variables.insert(k, value);
            Ok(())
        })?
    }

    pub fn get_variable(&self, name: &str) -> Result<Primary> {
        let k = key(name);
        self.find(|f| f.variables.get(&k).cloned())?
            .ok_or_else(|| Error::UndeclaredVariable(name.to_string()))
    }

    /// Assigns to the innermost declaration of a variable.
    pub fn set_variable(&self, name: &str, value: Primary) -> Result<()> {
        let k = key(name);
        self.with_frame(
            |f| f.variables.contains_key(&k),
            |f| {
                f.variables.insert(k.clone(), value);
            },
        )?
        .ok_or_else(|| Error::UndeclaredVariable(name.to_string()))
    }

    pub fn dispose_variable(&self, name: &str) -> Result<()> {
        let k = key(name);
        self.with_frame(
            |f| f.variables.contains_key(&k),
            |f| {
                f.variables.remove(&k);
            },
        )?
        .ok_or_else(|| Error::UndeclaredVariable(name.to_string()))
    }

    // Temporary views

    pub fn declare_view(&self, name: &str, view: View) -> Result<()> {
        let k = key(name);
        self.with_current(|frame| {
            if frame.views.contains_key(&k) {
                return Err(Error::TemporaryViewRedeclared(name.to_string()));
            }
            frame.views.insert(k, view);
            Ok(())
        })?
    }

    /// A copy of a temporary view, or `None` if no frame declares it.
    pub fn get_view(&self, name: &str) -> Result<Option<View>> {
        let k = key(name);
        Ok(self
            .find(|f| f.views.get(&k).cloned())?)
    }

    pub fn replace_view(&self, name: &str, view: View) -> Result<()> {
        let k = key(name);
        self.with_frame(
            |f| f.views.contains_key(&k),
            |f| {
                f.views.insert(k.clone(), view);
            },
        )?
        .ok_or_else(|| Error::UndeclaredTemporaryView(name.to_string()))
    }

    pub fn dispose_view(&self, name: &str) -> Result<()> {
        let k = key(name);
        self.with_frame(
            |f| f.views.contains_key(&k),
            |f| {
                f.views.remove(&k);
            },
        )?
        .ok_or_else(|| Error::UndeclaredTemporaryView(name.to_string()))
    }

    // Cursors

    fn insert_cursor(&self, cursor: Cursor) -> Result<()> {
        let k = key(&cursor.name);
        self.with_current(|frame| {
            if frame.cursors.contains_key(&k) {
                return Err(Error::CursorRedeclared(cursor.name.clone()));
            }
            frame.cursors.insert(k, cursor);
            Ok(())
        })?
    }

    pub fn declare_cursor(&self, name: &str, query: SelectQuery) -> Result<()> {
        self.insert_cursor(Cursor {
            name: name.to_string(),
            query: Some(query),
            view: None,
            index: -1,
            fetched: false,
            is_pseudo: false,
        })
    }

    /// Declares an always-open cursor over a list of values, one per row in column `c1`.
    pub fn declare_pseudo_cursor(&self, name: &str, values: Vec<Primary>) -> Result<()> {
        let view = View::new(
            Header::new("", &["c1"]),
            values.into_iter().map(|v| Record::new(vec![v])).collect(),
        );
        self.insert_cursor(Cursor {
            name: name.to_string(),
            query: None,
            view: Some(view),
            index: -1,
            fetched: false,
            is_pseudo: true,
        })
    }

    fn with_cursor<T>(&self, name: &str, f: impl FnOnce(&mut Cursor) -> Result<T>) -> Result<T> {
        let k = key(name);
        self.with_frame(|fr| fr.cursors.contains_key(&k), |fr| {
            fr.cursors
                .get_mut(&k)
                .map(f)
                .unwrap_or_else(|| Err(Error::UndeclaredCursor(name.to_string())))
        })?
        .unwrap_or_else(|| Err(Error::UndeclaredCursor(name.to_string())))
    }

    /// The query to run when opening a cursor.
    pub fn cursor_query(&self, name: &str) -> Result<SelectQuery> {
        self.with_cursor(name, |c| {
            if c.is_pseudo {
                return Err(Error::PseudoCursorMisuse(c.name.clone()));
            }
            if c.view.is_some() {
                return Err(Error::CursorAlreadyOpen(c.name.clone()));
            }
            c.query
                .clone()
                .ok_or_else(|| Error::PseudoCursorMisuse(c.name.clone()))
        })
    }

    /// Stores the result of a cursor's query and rewinds it.
    pub fn set_cursor_view(&self, name: &str, view: View) -> Result<()> {
        self.with_cursor(name, |c| {
            if c.view.is_some() {
                return Err(Error::CursorAlreadyOpen(c.name.clone()));
            }
            c.view = Some(view);
            c.index = -1;
            c.fetched = false;
            Ok(())
        })
    }

    /// Closes a cursor. Closing a closed cursor does nothing.
    pub fn close_cursor(&self, name: &str) -> Result<()> {
        self.with_cursor(name, |c| {
            if c.is_pseudo {
                return Err(Error::PseudoCursorMisuse(c.name.clone()));
            }
            c.view = None;
            c.index = -1;
            c.fetched = false;
            Ok(())
        })
    }

    pub fn dispose_cursor(&self, name: &str) -> Result<()> {
        let k = key(name);
        self.with_frame(|f| f.cursors.contains_key(&k), |f| {
            let pseudo = f
                .cursors
                .get(&k)
                .filter(|c| c.is_pseudo)
                .map(|c| c.name.clone());
            if let Some(name) = pseudo {
                return Err(Error::PseudoCursorMisuse(name));
            }
            f.cursors.remove(&k);
            Ok(())
        })?
        .unwrap_or_else(|| Err(Error::UndeclaredCursor(name.to_string())))
    }

    /// Moves a cursor and returns the row under it, or `None` when out of range.
    pub fn fetch_cursor(&self, name: &str, position: FetchPosition) -> Result<Option<Vec<Primary>>> {
        self.with_cursor(name, |c| c.fetch(position))
    }

    pub fn is_cursor_open(&self, name: &str) -> Result<bool> {
        self.read_cursor(name, |c| Ok(c.view.is_some()))
    }

    /// UNKNOWN until the first fetch.
    pub fn is_cursor_in_range(&self, name: &str) -> Result<Ternary> {
        self.read_cursor(name, |c| {
            let len = c.view()?.records.len() as i64;
            if !c.fetched {
                return Ok(Ternary::Unknown);
            }
            Ok(Ternary::from_bool(0 <= c.index && c.index < len))
        })
    }

    pub fn cursor_count(&self, name: &str) -> Result<usize> {
        self.read_cursor(name, |c| Ok(c.view()?.records.len()))
    }

    // User-defined functions

    pub fn declare_function(&self, function: UserDefinedFunction) -> Result<()> {
        let k = key(&function.name);
        self.with_current(|frame| {
            if frame.functions.contains_key(&k) {
                return Err(Error::FunctionRedeclared(function.name.clone()));
            }
            frame.functions.insert(k, Arc::new(function));
            Ok(())
        })?
    }

    pub fn get_function(&self, name: &str) -> Result<Option<Arc<UserDefinedFunction>>> {
        let k = key(name);
        Ok(self
            .find(|f| f.functions.get(&k).cloned())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ast::Statement;
    use crate::query::parser::parse;

    fn query(sql: &str) -> SelectQuery {
        match parse(sql).unwrap() {
            Statement::Select(q) => q,
        }
    }

    #[test]
    fn test_variables_shadow_and_restore() {
        let mut scope = Scope::new();
        scope.declare_variable("v", Primary::Integer(1)).unwrap();
        assert_eq!(
            scope.declare_variable("V", Primary::Null),
            Err(Error::VariableRedeclared("V".to_string()))
        );

        scope.enter_block();
        scope.declare_variable("v", Primary::Integer(2)).unwrap();
        assert_eq!(scope.get_variable("v").unwrap(), Primary::Integer(2));
        scope.set_variable("v", Primary::Integer(3)).unwrap();
        scope.exit_block();

        assert_eq!(scope.get_variable("v").unwrap(), Primary::Integer(1));
        assert_eq!(
            scope.get_variable("w"),
            Err(Error::UndeclaredVariable("w".to_string()))
        );
        scope.dispose_variable("v").unwrap();
        assert!(scope.get_variable("v").is_err());
    }

    #[test]
    fn test_global_frame_is_kept() {
        let mut scope = Scope::new();
        scope.exit_block();
        assert_eq!(scope.depth(), 1);
        scope.declare_variable("g", Primary::Null).unwrap();
        let shared = scope.clone();
        shared.set_variable("g", Primary::Integer(9)).unwrap();
        assert_eq!(scope.get_variable("g").unwrap(), Primary::Integer(9));
    }

    #[test]
    fn test_lookups_share_frames_with_readers() {
        let scope = Scope::new();
        scope.declare_variable("v", Primary::Integer(7)).unwrap();
        scope.declare_pseudo_cursor("c", vec![Primary::Integer(1)]).unwrap();

        let reader = scope.frames[0].read().unwrap();
        let shared = scope.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = std::thread::spawn(move || {
            let found = (
                shared.get_variable("v"),
                shared.get_view("v").map(|v| v.is_none()),
                shared.is_cursor_open("c"),
                shared.cursor_count("c"),
            );
            tx.send(found).unwrap();
        });
        let found = rx.recv_timeout(std::time::Duration::from_secs(5));
        drop(reader);
        handle.join().unwrap();

        assert_eq!(
            found.unwrap(),
            (Ok(Primary::Integer(7)), Ok(true), Ok(true), Ok(1))
        );
    }

    #[test]
    fn test_temporary_views() {
        let scope = Scope::new();
        let view = View::new(Header::new("t", &["a"]), vec![Record::new(vec![Primary::Integer(1)])]);
        scope.declare_view("t", view.clone()).unwrap();
        assert!(matches!(
            scope.declare_view("T", view.clone()),
            Err(Error::TemporaryViewRedeclared(_))
        ));
        assert_eq!(scope.get_view("t").unwrap().unwrap().records.len(), 1);
        scope.replace_view("t", View::new(Header::new("t", &["a"]), Vec::new())).unwrap();
        assert!(scope.get_view("t").unwrap().unwrap().records.is_empty());
        scope.dispose_view("t").unwrap();
        assert!(scope.get_view("t").unwrap().is_none());
        assert!(matches!(scope.dispose_view("t"), Err(Error::UndeclaredTemporaryView(_))));
    }

    #[test]
    fn test_cursor_lifecycle() {
        let scope = Scope::new();
        scope.declare_cursor("cur", query("SELECT 1")).unwrap();
        assert!(matches!(
            scope.fetch_cursor("cur", FetchPosition::Next),
            Err(Error::CursorClosed(_))
        ));
        assert!(scope.cursor_query("cur").is_ok());

        let records = (1..=3).map(|i| Record::new(vec![Primary::Integer(i)])).collect();
        scope
            .set_cursor_view("cur", View::new(Header::new("", &["c1"]), records))
            .unwrap();
        assert!(matches!(scope.cursor_query("cur"), Err(Error::CursorAlreadyOpen(_))));
        assert_eq!(scope.is_cursor_in_range("cur").unwrap(), Ternary::Unknown);
        assert_eq!(scope.cursor_count("cur").unwrap(), 3);

        assert_eq!(
            scope.fetch_cursor("cur", FetchPosition::Next).unwrap(),
            Some(vec![Primary::Integer(1)])
        );
        assert_eq!(
            scope.fetch_cursor("cur", FetchPosition::Last).unwrap(),
            Some(vec![Primary::Integer(3)])
        );
        assert_eq!(scope.fetch_cursor("cur", FetchPosition::Next).unwrap(), None);
        assert_eq!(scope.is_cursor_in_range("cur").unwrap(), Ternary::False);
        assert_eq!(
            scope.fetch_cursor("cur", FetchPosition::Relative(-2)).unwrap(),
            Some(vec![Primary::Integer(2)])
        );
        assert_eq!(scope.fetch_cursor("cur", FetchPosition::Absolute(-5)).unwrap(), None);
        assert_eq!(
            scope.fetch_cursor("cur", FetchPosition::Next).unwrap(),
            Some(vec![Primary::Integer(1)])
        );

        scope.close_cursor("cur").unwrap();
        scope.close_cursor("cur").unwrap();
        assert!(!scope.is_cursor_open("cur").unwrap());
        scope.dispose_cursor("cur").unwrap();
        assert!(matches!(scope.is_cursor_open("cur"), Err(Error::UndeclaredCursor(_))));
    }

    #[test]
    fn test_pseudo_cursor() {
        let scope = Scope::new();
        scope
            .declare_pseudo_cursor("p", vec![Primary::from("a"), Primary::from("b")])
            .unwrap();
        assert!(scope.is_cursor_open("p").unwrap());
        assert!(matches!(scope.cursor_query("p"), Err(Error::PseudoCursorMisuse(_))));
        assert!(matches!(scope.close_cursor("p"), Err(Error::PseudoCursorMisuse(_))));
        assert!(matches!(scope.dispose_cursor("p"), Err(Error::PseudoCursorMisuse(_))));
        assert_eq!(
            scope.fetch_cursor("p", FetchPosition::First).unwrap(),
            Some(vec![Primary::from("a")])
        );
    }

    #[test]
    fn test_functions() {
        let scope = Scope::new();
        scope
            .declare_function(UserDefinedFunction::scalar("double", 1, |args| {
                Ok(args[0].to_float().map(|f| Primary::from_float(f * 2.0)).into())
            }))
            .unwrap();
        assert!(matches!(
            scope.declare_function(UserDefinedFunction::scalar("DOUBLE", 1, |_| Ok(Primary::Null))),
            Err(Error::FunctionRedeclared(_))
        ));
        let f = scope.get_function("Double").unwrap().unwrap();
        assert!(!f.is_aggregate());
        assert!(f.check_args(2).is_err());
        assert!(scope.get_function("missing").unwrap().is_none());
    }
}
