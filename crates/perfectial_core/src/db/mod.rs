//! SQLite storage bootstrap, schema migrations and mapping checks.
//!
//! # Responsibility
//! - Open and configure SQLite connections for persistence contexts.
//! - Apply schema migrations in deterministic order.
//! - Verify registered entity mappings against the live schema.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - No context is handed out before migrations and mapping checks succeed.

pub mod migrations;
mod open;

pub use open::{Database, DatabaseTarget, DEFAULT_BUSY_TIMEOUT};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    #[error("entity mapping `{table}` does not match schema: {reason}")]
    SchemaMismatch { table: &'static str, reason: String },
}
