//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use csvlite::{Engine, EngineConfig, Primary, View};

pub fn int(i: i64) -> Primary {
    Primary::Integer(i)
}

pub fn text(s: &str) -> Primary {
    Primary::from(s)
}

/// An engine holding `employees` and `departments`, with two join chunks.
pub fn engine() -> Engine {
    let engine = Engine::new(EngineConfig::default().with_cpu(2).with_timezone("UTC")).unwrap();
    engine
        .register_table(
            "employees",
            &["id", "name", "dept_id", "salary"],
            vec![
                vec![int(1), text("Alice"), int(10), int(5000)],
                vec![int(2), text("Bob"), int(20), int(4000)],
                vec![int(3), text("Carol"), int(10), int(6000)],
                vec![int(4), text("Dave"), Primary::Null, int(3000)],
                vec![int(5), text("Eve"), int(20), int(4000)],
            ],
        )
        .unwrap();
    engine
        .register_table(
            "departments",
            &["dept_id", "dept_name"],
            vec![
                vec![int(10), text("Engineering")],
                vec![int(20), text("Sales")],
                vec![int(30), text("Legal")],
            ],
        )
        .unwrap();
    engine
}

/// A table of `n` rows: `id` from 1, `grp` cycling over `groups` values.
pub fn numbers(engine: &Engine, name: &str, n: i64, groups: i64) {
    let rows = (1..=n).map(|i| vec![int(i), int(i % groups)]).collect();
    engine.register_table(name, &["id", "grp"], rows).unwrap();
}

pub fn query(engine: &Engine, sql: &str) -> View {
    engine
        .session()
        .query(sql)
        .unwrap_or_else(|e| panic!("{}: {}", sql, e))
}

/// The first column of every row.
pub fn column(view: &View) -> Vec<Primary> {
    view.records.iter().map(|r| r.value(0).clone()).collect()
}
