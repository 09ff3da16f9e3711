//! Grouping and aggregate function tests.

mod common;

use common::{column, engine, int, query, text};
use csvlite::{Error, Primary, UserDefinedFunction};

#[test]
fn test_group_by_treats_nulls_as_one_group() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT dept_id, COUNT(*), SUM(salary) FROM employees GROUP BY dept_id",
    );
    assert_eq!(
        view.rows(),
        vec![
            vec![int(10), int(2), int(11000)],
            vec![int(20), int(2), int(8000)],
            vec![Primary::Null, int(1), int(3000)],
        ]
    );
}

#[test]
fn test_group_by_expression() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT salary - 1000, COUNT(*) FROM employees GROUP BY salary - 1000",
    );
    assert_eq!(
        view.rows(),
        vec![
            vec![int(4000), int(1)],
            vec![int(3000), int(2)],
            vec![int(5000), int(1)],
            vec![int(2000), int(1)],
        ]
    );
}

#[test]
fn test_implicit_grouping() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT COUNT(*), SUM(salary), AVG(salary), MIN(salary), MAX(salary), MEDIAN(salary) FROM employees",
    );
    assert_eq!(
        view.rows(),
        vec![vec![int(5), int(22000), int(4400), int(3000), int(6000), int(4000)]]
    );
}

#[test]
fn test_aggregates_over_no_rows() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT COUNT(*), SUM(salary), MAX(name) FROM employees WHERE id > 100",
    );
    assert_eq!(view.rows(), vec![vec![int(0), Primary::Null, Primary::Null]]);
}

#[test]
fn test_count_skips_nulls_and_duplicates() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT COUNT(dept_id), COUNT(DISTINCT dept_id), COUNT(1) FROM employees",
    );
    assert_eq!(view.rows(), vec![vec![int(4), int(2), int(5)]]);
}

#[test]
fn test_median_of_even_group() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT MEDIAN(salary) FROM employees WHERE dept_id = 10",
    );
    assert_eq!(column(&view), vec![int(5500)]);
}

#[test]
fn test_having() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT dept_id FROM employees GROUP BY dept_id HAVING COUNT(*) > 1",
    );
    assert_eq!(column(&view), vec![int(10), int(20)]);

    // Without GROUP BY the whole table is one group.
    let view = query(&engine, "SELECT COUNT(*) FROM employees HAVING COUNT(*) > 3");
    assert_eq!(column(&view), vec![int(5)]);
    let view = query(&engine, "SELECT COUNT(*) FROM employees HAVING COUNT(*) > 10");
    assert!(view.is_empty());
}

#[test]
fn test_order_by_aggregate_alias() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT dept_id, COUNT(*) AS n FROM employees GROUP BY dept_id ORDER BY n, dept_id",
    );
    assert_eq!(column(&view), vec![Primary::Null, int(10), int(20)]);
}

#[test]
fn test_list_aggregates() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT dept_id, LISTAGG(name, ',') WITHIN GROUP (ORDER BY name DESC) FROM employees GROUP BY dept_id",
    );
    assert_eq!(
        view.rows(),
        vec![
            vec![int(10), text("Carol,Alice")],
            vec![int(20), text("Eve,Bob")],
            vec![Primary::Null, text("Dave")],
        ]
    );

    let view = query(
        &engine,
        "SELECT GROUP_CONCAT(name) FROM employees WHERE dept_id = 10",
    );
    assert_eq!(column(&view), vec![text("Alice,Carol")]);
}

#[test]
fn test_grouping_errors() {
    let engine = engine();
    let session = engine.session();
    assert!(matches!(
        session.query("SELECT name FROM employees GROUP BY dept_id"),
        Err(Error::FieldNotGroupKey(_))
    ));
    assert!(matches!(
        session.query("SELECT SUM(COUNT(*)) FROM employees"),
        Err(Error::NestedAggregateFunctions(_))
    ));
    assert!(matches!(
        session.query("SELECT SUM(*) FROM employees"),
        Err(Error::UnpermittedWildcard(_))
    ));
    assert!(session.query("SELECT id FROM employees WHERE COUNT(*) > 1").is_err());
}

#[test]
fn test_user_defined_aggregate() {
    let engine = engine();
    let session = engine.session();
    session
        .declare_function(UserDefinedFunction::aggregate("PRODUCT", 0, |values, _| {
            Ok(Primary::from_float(values.iter().filter_map(Primary::to_float).product()))
        }))
        .unwrap();

    let view = session.query("SELECT PRODUCT(id) FROM employees").unwrap();
    assert_eq!(column(&view), vec![int(120)]);

    let view = session
        .query("SELECT dept_id, PRODUCT(id) FROM employees GROUP BY dept_id")
        .unwrap();
    assert_eq!(column(&view), vec![int(10), int(20), Primary::Null]);
    assert_eq!(view.rows()[0][1], int(3));
    assert_eq!(view.rows()[1][1], int(10));
}
