//! Join tests, including joins large enough to run in several chunks.

mod common;

use common::{column, engine, int, numbers, query, text};
use csvlite::{Error, Primary};

#[test]
fn test_inner_join() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT e.name, d.dept_name FROM employees e JOIN departments d ON e.dept_id = d.dept_id",
    );
    assert_eq!(
        view.rows(),
        vec![
            vec![text("Alice"), text("Engineering")],
            vec![text("Bob"), text("Sales")],
            vec![text("Carol"), text("Engineering")],
            vec![text("Eve"), text("Sales")],
        ]
    );
}

#[test]
fn test_left_join_pads_with_nulls() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT e.name, d.dept_name FROM employees e LEFT JOIN departments d ON e.dept_id = d.dept_id",
    );
    assert_eq!(view.len(), 5);
    assert_eq!(view.rows()[3], vec![text("Dave"), Primary::Null]);
}

#[test]
fn test_right_join_follows_right_order() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT d.dept_name, e.name FROM employees e RIGHT JOIN departments d ON e.dept_id = d.dept_id",
    );
    assert_eq!(
        view.rows(),
        vec![
            vec![text("Engineering"), text("Alice")],
            vec![text("Engineering"), text("Carol")],
            vec![text("Sales"), text("Bob")],
            vec![text("Sales"), text("Eve")],
            vec![text("Legal"), Primary::Null],
        ]
    );
}

#[test]
fn test_full_join_appends_unmatched_right_records() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT e.name, d.dept_name FROM employees e FULL OUTER JOIN departments d ON e.dept_id = d.dept_id",
    );
    assert_eq!(view.len(), 6);
    assert_eq!(view.rows()[3], vec![text("Dave"), Primary::Null]);
    assert_eq!(view.rows()[5], vec![Primary::Null, text("Legal")]);
}

#[test]
fn test_natural_join_coalesces_shared_columns() {
    let engine = engine();
    let view = query(&engine, "SELECT * FROM employees NATURAL JOIN departments");
    assert_eq!(view.labels(), vec!["dept_id", "id", "name", "salary", "dept_name"]);
    assert_eq!(
        view.rows()[0],
        vec![int(10), int(1), text("Alice"), int(5000), text("Engineering")]
    );
    assert_eq!(view.len(), 4);

    // The qualified originals stay reachable.
    let view = query(
        &engine,
        "SELECT departments.dept_id FROM employees NATURAL JOIN departments WHERE id = 2",
    );
    assert_eq!(column(&view), vec![int(20)]);
}

#[test]
fn test_using_join_prefers_preserved_side() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT dept_id, name FROM employees JOIN departments USING (dept_id) ORDER BY id",
    );
    assert_eq!(column(&view), vec![int(10), int(20), int(10), int(20)]);

    let view = query(
        &engine,
        "SELECT dept_id FROM employees RIGHT JOIN departments USING (dept_id)",
    );
    assert_eq!(column(&view), vec![int(10), int(10), int(20), int(20), int(30)]);

    assert!(matches!(
        engine
            .session()
            .query("SELECT * FROM employees JOIN departments USING (nope)"),
        Err(Error::FieldNotExist(_))
    ));
}

#[test]
fn test_cross_joins() {
    let engine = engine();
    let view = query(&engine, "SELECT COUNT(*) FROM employees CROSS JOIN departments");
    assert_eq!(column(&view), vec![int(15)]);

    let view = query(
        &engine,
        "SELECT COUNT(*) FROM employees, departments WHERE employees.dept_id = departments.dept_id",
    );
    assert_eq!(column(&view), vec![int(4)]);
}

#[test]
fn test_join_condition_errors_surface() {
    let engine = engine();
    let result = engine
        .session()
        .query("SELECT * FROM employees e JOIN departments d ON e.nope = d.dept_id");
    assert!(matches!(result, Err(Error::FieldNotExist(_))));
}

#[test]
fn test_chunked_join_keeps_driving_order() {
    let engine = engine();
    numbers(&engine, "big", 200, 7);
    numbers(&engine, "groups", 7, 7);

    let view = query(
        &engine,
        "SELECT big.id, groups.id FROM big JOIN groups ON big.grp = groups.grp",
    );
    assert_eq!(view.len(), 200);
    let expected: Vec<Primary> = (1..=200).map(int).collect();
    assert_eq!(column(&view), expected);
    for row in view.rows() {
        let (big, group) = match (&row[0], &row[1]) {
            (Primary::Integer(b), Primary::Integer(g)) => (*b, *g),
            other => panic!("unexpected row {:?}", other),
        };
        assert_eq!(big % 7, group % 7);
    }
}

#[test]
fn test_chunked_outer_joins() {
    let engine = engine();
    numbers(&engine, "big", 120, 4);
    numbers(&engine, "few", 3, 10);

    // few.grp holds 1, 2, 3; big.grp is 0 for every fourth row.
    let view = query(
        &engine,
        "SELECT big.id, few.id FROM big LEFT JOIN few ON big.grp = few.grp",
    );
    assert_eq!(view.len(), 120);
    assert_eq!(view.rows()[3], vec![int(4), Primary::Null]);

    let view = query(
        &engine,
        "SELECT COUNT(big.id), COUNT(few.id) FROM big FULL JOIN few ON big.id = few.id * 100",
    );
    // One big row matches; few rows 2 and 3 are appended unmatched.
    assert_eq!(view.rows(), vec![vec![int(120), int(3)]]);
}

#[test]
fn test_single_chunk_when_condition_assigns_variables() {
    let engine = engine();
    numbers(&engine, "big", 100, 5);
    let session = engine.session();
    session.declare_variable("seen", int(0)).unwrap();
    let view = session
        .query("SELECT COUNT(*) FROM big a JOIN big b ON a.id = b.id AND (@seen := @seen + 1) > 0")
        .unwrap();
    assert_eq!(column(&view), vec![int(100)]);
    assert_eq!(session.variable("@seen").unwrap(), int(100));
}
