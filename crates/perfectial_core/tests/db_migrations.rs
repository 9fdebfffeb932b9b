use perfectial_core::db::migrations::latest_version;
use perfectial_core::db::{Database, DatabaseTarget, DbError};
use perfectial_core::DatabaseConfig;
use rusqlite::Connection;
use std::path::PathBuf;

#[test]
fn in_memory_database_applies_all_migrations() {
    let database = Database::open_in_memory().unwrap();
    let conn = database.connect().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "users");
    assert_table_exists(&conn, "todos");
    assert_table_exists(&conn, "audit_entries");
}

#[test]
fn in_memory_databases_are_independent() {
    let first = Database::open_in_memory().unwrap();
    let second = Database::open_in_memory().unwrap();
    first
        .connect()
        .unwrap()
        .execute(
            "INSERT INTO users (user_name, email) VALUES ('ada', 'ada@example.com');",
            [],
        )
        .unwrap();

    assert_eq!(user_count(&first.connect().unwrap()), 1);
    assert_eq!(user_count(&second.connect().unwrap()), 0);
}

#[test]
fn opening_same_file_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("perfectial.sqlite3");

    let first = Database::open(&path).unwrap();
    assert_eq!(schema_version(&first.connect().unwrap()), latest_version());
    drop(first);

    let second = Database::open(&path).unwrap();
    let conn = second.connect().unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    let journal: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(journal.to_ascii_lowercase(), "wal");
}

#[test]
fn connections_enforce_foreign_keys() {
    let database = Database::open_in_memory().unwrap();
    let conn = database.connect().unwrap();
    let err = conn
        .execute(
            "INSERT INTO todos (user_id, title, created_at) VALUES (42, 'orphan', 0);",
            [],
        )
        .unwrap_err();
    assert!(err.to_string().contains("FOREIGN KEY"));
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match Database::open(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn mapping_mismatch_is_reported_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("drifted.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, user_name TEXT, is_deleted INTEGER);
         PRAGMA user_version = {};",
        latest_version()
    ))
    .unwrap();
    drop(conn);

    match Database::open(&path).unwrap_err() {
        DbError::SchemaMismatch { table, reason } => {
            assert_eq!(table, "users");
            assert!(reason.contains("email"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn from_config_resolves_relative_paths() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig::Sqlite {
        path: PathBuf::from("data.sqlite3"),
        busy_timeout_ms: Some(100),
    };

    let database = Database::from_config(&config, dir.path()).unwrap();
    assert_eq!(
        database.target(),
        &DatabaseTarget::File(dir.path().join("data.sqlite3"))
    );

    let memory = Database::from_config(&DatabaseConfig::memory(), dir.path()).unwrap();
    assert!(matches!(memory.target(), DatabaseTarget::Memory { .. }));
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn user_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM users;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
