use perfectial_core::config::{AppConfig, ConfigError, DatabaseConfig, DEFAULT_DATABASE_FILE};
use std::path::PathBuf;

#[test]
fn load_or_init_writes_defaults_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("perfectial.json");

    let created = AppConfig::load_or_init(&path).unwrap();
    assert!(path.exists());
    assert_eq!(
        created.database,
        DatabaseConfig::Sqlite {
            path: PathBuf::from(DEFAULT_DATABASE_FILE),
            busy_timeout_ms: None,
        }
    );

    let mut edited = created.clone();
    edited.database = DatabaseConfig::memory();
    edited.save(&path).unwrap();

    let reloaded = AppConfig::load_or_init(&path).unwrap();
    assert_eq!(reloaded, edited);
}

#[test]
fn malformed_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, r#"{"database":{"backend":"postgres"}}"#).unwrap();

    let err = AppConfig::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = AppConfig::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
