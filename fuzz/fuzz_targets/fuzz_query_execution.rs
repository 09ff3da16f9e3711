#![no_main]

use arbitrary::Arbitrary;
use csvlite::{Engine, EngineConfig, Primary};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Cell {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

impl From<&Cell> for Primary {
    fn from(cell: &Cell) -> Self {
        match cell {
            Cell::Null => Primary::Null,
            Cell::Integer(i) => Primary::Integer(*i),
            Cell::Float(f) => Primary::Float(*f),
            Cell::Boolean(b) => Primary::Boolean(*b),
            Cell::Text(s) => Primary::from(s.as_str()),
        }
    }
}

#[derive(Arbitrary, Debug)]
struct Input {
    rows: Vec<(Cell, Cell)>,
    sql: String,
}

fuzz_target!(|input: Input| {
    if input.sql.len() > 2_000 || input.rows.len() > 200 {
        return;
    }

    let Ok(engine) = Engine::new(EngineConfig::default().with_cpu(2).with_timezone("UTC")) else {
        return;
    };
    let rows = input
        .rows
        .iter()
        .map(|(a, b)| vec![Primary::from(a), Primary::from(b)])
        .collect();
    if engine.register_table("t", &["a", "b"], rows).is_err() {
        return;
    }

    // Errors are expected; panics are not.
    let _ = engine.session().execute(&input.sql);
});
