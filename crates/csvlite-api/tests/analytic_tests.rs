//! Window function tests. Every query orders by `id` so the expected
//! columns line up with the employees fixture.

mod common;

use common::{column, engine, int, query, text};
use csvlite::{Error, Primary};

fn second(view: &csvlite::View) -> Vec<Primary> {
    view.records.iter().map(|r| r.value(1).clone()).collect()
}

#[test]
fn test_row_number_per_partition() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT id, ROW_NUMBER() OVER (PARTITION BY dept_id ORDER BY salary DESC) AS rn \
         FROM employees ORDER BY id",
    );
    assert_eq!(view.labels(), vec!["id", "rn"]);
    // Bob and Eve tie on salary and keep their table order.
    assert_eq!(second(&view), vec![int(2), int(1), int(1), int(1), int(2)]);
}

#[test]
fn test_rank_and_dense_rank() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT RANK() OVER (ORDER BY salary DESC), DENSE_RANK() OVER (ORDER BY salary DESC) \
         FROM employees ORDER BY id",
    );
    assert_eq!(column(&view), vec![int(2), int(3), int(1), int(5), int(3)]);
    assert_eq!(second(&view), vec![int(2), int(3), int(1), int(4), int(3)]);
}

#[test]
fn test_aggregate_over_whole_partition() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT id, SUM(salary) OVER (PARTITION BY dept_id) FROM employees ORDER BY id",
    );
    assert_eq!(
        second(&view),
        vec![int(11000), int(8000), int(11000), int(3000), int(8000)]
    );
}

#[test]
fn test_running_aggregates_include_peers() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT id, SUM(salary) OVER (ORDER BY id) FROM employees ORDER BY id",
    );
    assert_eq!(
        second(&view),
        vec![int(5000), int(9000), int(15000), int(18000), int(22000)]
    );

    let view = query(
        &engine,
        "SELECT id, COUNT(*) OVER (ORDER BY salary) FROM employees ORDER BY id",
    );
    assert_eq!(second(&view), vec![int(4), int(3), int(5), int(1), int(3)]);
}

#[test]
fn test_lag_lead_and_ntile() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT LAG(name) OVER (ORDER BY id), LEAD(name, 1, 'none') OVER (ORDER BY id) \
         FROM employees ORDER BY id",
    );
    assert_eq!(
        column(&view),
        vec![Primary::Null, text("Alice"), text("Bob"), text("Carol"), text("Dave")]
    );
    assert_eq!(
        second(&view),
        vec![text("Bob"), text("Carol"), text("Dave"), text("Eve"), text("none")]
    );

    let view = query(
        &engine,
        "SELECT id, NTILE(2) OVER (ORDER BY id) FROM employees ORDER BY id",
    );
    assert_eq!(second(&view), vec![int(1), int(1), int(1), int(2), int(2)]);
}

#[test]
fn test_first_value_per_partition() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT id, FIRST_VALUE(name) OVER (PARTITION BY dept_id ORDER BY salary DESC) \
         FROM employees ORDER BY id",
    );
    assert_eq!(
        second(&view),
        vec![text("Carol"), text("Bob"), text("Carol"), text("Dave"), text("Bob")]
    );
}

#[test]
fn test_analytic_argument_errors() {
    let engine = engine();
    let session = engine.session();
    assert!(matches!(
        session.query("SELECT ROW_NUMBER(id) OVER () FROM employees"),
        Err(Error::FunctionArgumentCount { .. })
    ));
    assert!(matches!(
        session.query("SELECT NTILE(0) OVER (ORDER BY id) FROM employees"),
        Err(Error::FunctionInvalidArgument { .. })
    ));
    assert!(matches!(
        session.query("SELECT NO_SUCH_WINDOW() OVER () FROM employees"),
        Err(Error::FunctionNotExist(_))
    ));
}

#[test]
fn test_lag_lead_extreme_offsets_fall_back_to_default() {
    let engine = engine();
    let view = query(
        &engine,
        "SELECT LEAD(id, 9223372036854775807) OVER () FROM employees",
    );
    assert_eq!(column(&view), vec![Primary::Null; 5]);

    let view = query(
        &engine,
        "SELECT LAG(id, -9223372036854775807 - 1, 'none') OVER () FROM employees",
    );
    assert_eq!(column(&view), vec![text("none"); 5]);
}
