//! SQLite migration registry, executor and mapping verification.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - Every entry of `ENTITY_MAPPINGS` names an existing table carrying its
//!   key column and every mapped column.

use crate::db::{DbError, DbResult};
use crate::repo::entity::EntityMapping;
use log::debug;
use rusqlite::Connection;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("0002_audit.sql"),
    },
];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
        debug!(
            "event=db_migrate module=db status=ok version={}",
            migration.version
        );
    }
    tx.commit()?;

    Ok(())
}

/// Checks each mapping against `PRAGMA table_info` of its table.
pub fn verify_entity_mappings(conn: &Connection, mappings: &[EntityMapping]) -> DbResult<()> {
    for mapping in mappings {
        let columns = table_columns(conn, mapping.table)?;
        if columns.is_empty() {
            return Err(DbError::SchemaMismatch {
                table: mapping.table,
                reason: "table does not exist".to_string(),
            });
        }

        let missing = std::iter::once(mapping.key)
            .chain(mapping.columns.iter().copied())
            .filter(|column| !columns.contains(*column))
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(DbError::SchemaMismatch {
                table: mapping.table,
                reason: format!("missing columns: {}", missing.join(", ")),
            });
        }
    }

    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> DbResult<BTreeSet<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = BTreeSet::new();
    while let Some(row) = rows.next()? {
        columns.insert(row.get::<_, String>("name")?);
    }
    Ok(columns)
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
