//! File logging. Kept in its own test binary because it installs the
//! global subscriber.

mod common;

use common::{engine, query};
use csvlite::{EngineConfig, LogConfig, LogFormat};

#[test]
fn test_file_logging_writes_query_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("csvlite.log");

    let config = EngineConfig::default().with_log(
        LogConfig::debug()
            .with_file(&path)
            .with_format(LogFormat::Compact),
    );
    let guard = csvlite::Engine::new(config).unwrap().init_logging().unwrap();
    assert!(guard.is_some());

    let engine = engine();
    query(&engine, "SELECT COUNT(*) FROM employees GROUP BY dept_id");
    drop(guard);

    let written: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("csvlite.log"))
        .collect();
    assert_eq!(written.len(), 1);
    let contents = std::fs::read_to_string(written[0].path()).unwrap();
    // RUST_LOG overrides the configured level.
    if std::env::var_os("RUST_LOG").is_none() {
        assert!(contents.contains("query finished"));
    }

    // Only one global subscriber can be installed.
    assert!(LogConfig::info().init().is_err());
}
