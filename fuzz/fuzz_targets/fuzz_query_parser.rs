#![no_main]

use csvlite_core::query::parser::Parser;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Ignore invalid UTF-8
    if let Ok(sql) = std::str::from_utf8(data) {
        if sql.len() > 10_000 {
            return;
        }

        // Must never panic, and a parsed statement must print back to
        // text that parses again.
        if let Ok(mut parser) = Parser::new(sql) {
            if let Ok(statement) = parser.parse() {
                let printed = statement.to_string();
                if let Ok(mut reparser) = Parser::new(&printed) {
                    let _ = reparser.parse();
                }
            }
        }
        let _ = Parser::new(sql).and_then(|mut p| p.parse_statements());
    }
});
