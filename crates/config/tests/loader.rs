//! File-based loading.

use std::{
    fs,
    path::{Path, PathBuf},
};

use config::{Error, load_mapping_from_path, load_settings_from_path};

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, body).unwrap();
    p
}

#[test]
fn loads_files_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let s = write(dir.path(), "settings.ron", "(chord_timeout_ms: 300)");
    let m = write(
        dir.path(),
        "mapping.ron",
        r#"(global: [(keys: ["cmd+k"], action: named("a"))])"#,
    );
    assert_eq!(load_settings_from_path(&s).unwrap().chord_timeout_ms, 300);
    assert_eq!(load_mapping_from_path(&m).unwrap().global.len(), 1);
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("absent.ron");
    let err = load_mapping_from_path(&p).unwrap_err();
    assert!(matches!(err, Error::Read { .. }));
    assert_eq!(err.path(), Some(p.as_path()));
}

#[test]
fn parse_errors_name_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let p = write(dir.path(), "bad.ron", "(global: [");
    let err = load_mapping_from_path(&p).unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
    assert!(err.pretty().contains("bad.ron"));
}
