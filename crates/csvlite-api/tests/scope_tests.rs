//! Session scope tests: variables, temporary views, cursors and
//! user-defined functions.

mod common;

use common::{column, engine, int, text};
use csvlite::{Error, FetchPosition, Primary, Ternary, UserDefinedFunction};

#[test]
fn test_variables_in_queries() {
    let engine = engine();
    let session = engine.session();
    session.declare_variable("@min", int(4500)).unwrap();

    let view = session.query("SELECT name FROM employees WHERE salary > @min").unwrap();
    assert_eq!(column(&view), vec![text("Alice"), text("Carol")]);

    session.set_variable("min", int(5500)).unwrap();
    let view = session.query("SELECT name FROM employees WHERE salary > @MIN").unwrap();
    assert_eq!(column(&view), vec![text("Carol")]);

    assert!(matches!(
        session.declare_variable("@min", int(0)),
        Err(Error::VariableRedeclared(_))
    ));
    session.dispose_variable("@min").unwrap();
    assert!(matches!(
        session.query("SELECT @min"),
        Err(Error::UndeclaredVariable(_))
    ));
    assert!(matches!(
        session.set_variable("@min", int(1)),
        Err(Error::UndeclaredVariable(_))
    ));
}

#[test]
fn test_blocks_shadow_and_restore() {
    let engine = engine();
    let mut session = engine.session();
    session.declare_variable("@x", int(1)).unwrap();

    session.enter_block();
    session.declare_variable("@x", int(2)).unwrap();
    session.declare_variable("@inner", int(3)).unwrap();
    assert_eq!(session.variable("@x").unwrap(), int(2));
    session.exit_block();

    assert_eq!(session.variable("@x").unwrap(), int(1));
    assert!(matches!(session.variable("@inner"), Err(Error::UndeclaredVariable(_))));

    // The global frame survives extra exits.
    session.exit_block();
    assert_eq!(session.variable("@x").unwrap(), int(1));
}

#[test]
fn test_sessions_are_isolated() {
    let engine = engine();
    let first = engine.session();
    let second = engine.session();
    first.declare_variable("@x", int(1)).unwrap();
    first
        .create_view("rich", "SELECT id FROM employees WHERE salary > 4500")
        .unwrap();

    assert!(second.variable("@x").is_err());
    assert!(matches!(
        second.query("SELECT * FROM rich"),
        Err(Error::TableNotExist(_))
    ));
}

#[test]
fn test_cloned_sessions_share_existing_frames() {
    let engine = engine();
    let session = engine.session();
    session.declare_variable("@x", int(1)).unwrap();

    let mut copy = session.clone();
    copy.set_variable("@x", int(2)).unwrap();
    assert_eq!(session.variable("@x").unwrap(), int(2));

    copy.enter_block();
    copy.declare_variable("@y", int(3)).unwrap();
    assert_eq!(copy.variable("@y").unwrap(), int(3));
    assert!(matches!(session.variable("@y"), Err(Error::UndeclaredVariable(_))));
}

#[test]
fn test_temporary_views() {
    let engine = engine();
    let session = engine.session();
    session
        .create_view("rich", "SELECT id, name FROM employees WHERE salary >= 5000")
        .unwrap();

    let view = session.query("SELECT name FROM rich ORDER BY id DESC").unwrap();
    assert_eq!(column(&view), vec![text("Carol"), text("Alice")]);
    let view = session.query("SELECT r.name FROM rich AS r WHERE r.id = 1").unwrap();
    assert_eq!(column(&view), vec![text("Alice")]);

    assert!(matches!(
        session.create_view("rich", "SELECT 1"),
        Err(Error::TemporaryViewRedeclared(_))
    ));

    let replacement = session.query("SELECT id, name FROM employees WHERE id = 4").unwrap();
    session.replace_view("RICH", replacement).unwrap();
    let view = session.query("SELECT name FROM rich").unwrap();
    assert_eq!(column(&view), vec![text("Dave")]);

    session.dispose_view("rich").unwrap();
    assert!(matches!(
        session.dispose_view("rich"),
        Err(Error::UndeclaredTemporaryView(_))
    ));
}

#[test]
fn test_temporary_view_shadows_table() {
    let engine = engine();
    let session = engine.session();
    session
        .create_view("departments", "SELECT dept_id FROM departments WHERE dept_id = 30")
        .unwrap();
    let view = session.query("SELECT COUNT(*) FROM departments").unwrap();
    assert_eq!(column(&view), vec![int(1)]);

    let other = engine.session().query("SELECT COUNT(*) FROM departments").unwrap();
    assert_eq!(column(&other), vec![int(3)]);
}

#[test]
fn test_cursor_lifecycle() {
    let engine = engine();
    let session = engine.session();
    session
        .declare_cursor("cur", "SELECT name FROM employees ORDER BY id")
        .unwrap();

    assert!(matches!(
        session.fetch_cursor("cur", FetchPosition::Next),
        Err(Error::CursorClosed(_))
    ));

    session.open_cursor("cur").unwrap();
    assert_eq!(session.cursor_count("cur").unwrap(), 5);
    assert_eq!(session.scope().is_cursor_in_range("cur").unwrap(), Ternary::Unknown);

    let fetch = |position| session.fetch_cursor("cur", position).unwrap();
    assert_eq!(fetch(FetchPosition::Next), Some(vec![text("Alice")]));
    assert_eq!(fetch(FetchPosition::Next), Some(vec![text("Bob")]));
    assert_eq!(fetch(FetchPosition::Prior), Some(vec![text("Alice")]));
    assert_eq!(fetch(FetchPosition::Absolute(3)), Some(vec![text("Dave")]));
    assert_eq!(fetch(FetchPosition::Relative(-2)), Some(vec![text("Bob")]));
    assert_eq!(fetch(FetchPosition::Last), Some(vec![text("Eve")]));
    assert_eq!(fetch(FetchPosition::Next), None);
    assert_eq!(session.scope().is_cursor_in_range("cur").unwrap(), Ternary::False);
    assert_eq!(fetch(FetchPosition::First), Some(vec![text("Alice")]));

    assert!(matches!(
        session.open_cursor("cur"),
        Err(Error::CursorAlreadyOpen(_))
    ));

    session.close_cursor("cur").unwrap();
    session.close_cursor("cur").unwrap();
    assert!(matches!(session.cursor_count("cur"), Err(Error::CursorClosed(_))));

    // A closed cursor can be reopened and starts over.
    session.open_cursor("cur").unwrap();
    assert_eq!(
        session.fetch_cursor("cur", FetchPosition::Next).unwrap(),
        Some(vec![text("Alice")])
    );

    session.dispose_cursor("cur").unwrap();
    assert!(matches!(
        session.open_cursor("cur"),
        Err(Error::UndeclaredCursor(_))
    ));
}

#[test]
fn test_cursor_query_runs_at_open() {
    let engine = engine();
    let session = engine.session();
    session.declare_variable("@from", int(0)).unwrap();
    session
        .declare_cursor("cur", "SELECT id FROM employees WHERE id > @from")
        .unwrap();

    session.set_variable("@from", int(3)).unwrap();
    session.open_cursor("cur").unwrap();
    assert_eq!(session.cursor_count("cur").unwrap(), 2);
    assert!(matches!(
        session.declare_cursor("cur", "SELECT 1"),
        Err(Error::CursorRedeclared(_))
    ));
}

#[test]
fn test_pseudo_cursor() {
    let engine = engine();
    let session = engine.session();
    session
        .scope()
        .declare_pseudo_cursor("vals", vec![int(1), int(2)])
        .unwrap();
    assert_eq!(
        session.fetch_cursor("vals", FetchPosition::Last).unwrap(),
        Some(vec![int(2)])
    );
    assert!(matches!(
        session.close_cursor("vals"),
        Err(Error::PseudoCursorMisuse(_))
    ));
    assert!(matches!(
        session.open_cursor("vals"),
        Err(Error::PseudoCursorMisuse(_))
    ));
}

#[test]
fn test_user_defined_scalar_function() {
    let engine = engine();
    let mut session = engine.session();
    session
        .declare_function(UserDefinedFunction::scalar("raise", 2, |args| {
            match (args[0].to_float(), args[1].to_float()) {
                (Some(base), Some(pct)) => Ok(Primary::from_float(base + base * pct / 100.0)),
                _ => Ok(Primary::Null),
            }
        }))
        .unwrap();

    let view = session
        .query("SELECT RAISE(salary, 10) FROM employees WHERE id IN (1, 4)")
        .unwrap();
    assert_eq!(column(&view), vec![int(5500), int(3300)]);

    assert!(matches!(
        session.query("SELECT raise(salary) FROM employees"),
        Err(Error::FunctionArgumentCount { .. })
    ));
    assert!(matches!(
        session.declare_function(UserDefinedFunction::scalar("RAISE", 1, |args| Ok(args[0].clone()))),
        Err(Error::FunctionRedeclared(_))
    ));

    session.enter_block();
    session
        .declare_function(UserDefinedFunction::scalar("twice", 1, |args| {
            Ok(args[0].to_float().map_or(Primary::Null, |f| Primary::from_float(f * 2.0)))
        }))
        .unwrap();
    let view = session.query("SELECT TWICE(id) FROM employees WHERE id = 2").unwrap();
    assert_eq!(column(&view), vec![int(4)]);
    session.exit_block();

    assert!(matches!(
        session.query("SELECT TWICE(id) FROM employees"),
        Err(Error::FunctionNotExist(_))
    ));
}
