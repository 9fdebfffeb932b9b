//! Database handle and connection bootstrap.
//!
//! # Responsibility
//! - Describe where the SQLite database lives (file or shared in-memory).
//! - Run schema migrations and mapping checks once when opening.
//! - Hand out configured connections, one per persistence context.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - A shared in-memory database lives as long as any `Database` clone.

use super::migrations::{apply_migrations, verify_entity_mappings};
use super::DbResult;
use crate::config::DatabaseConfig;
use crate::repo::mappings::ENTITY_MAPPINGS;
use log::{error, info};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Physical location of a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    File(PathBuf),
    /// Named shared-cache in-memory database.
    Memory { name: String },
}

impl DatabaseTarget {
    fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory { .. } => "memory",
        }
    }
}

struct DatabaseInner {
    target: DatabaseTarget,
    busy_timeout: Duration,
    // Holds the in-memory database open between contexts.
    _anchor: Option<Mutex<Connection>>,
}

/// Cloneable handle used by scope factories to open persistence contexts.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("target", &self.inner.target)
            .field("busy_timeout", &self.inner.busy_timeout)
            .finish()
    }
}

impl Database {
    /// Opens a database file, creating it when absent, and applies migrations.
    ///
    /// # Side effects
    /// - Switches the file to WAL journaling.
    /// - Emits `db_open` logging events with duration and status.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::open_target(
            DatabaseTarget::File(path.as_ref().to_path_buf()),
            DEFAULT_BUSY_TIMEOUT,
        )
    }

    /// Opens a fresh, uniquely named in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open_target(
            DatabaseTarget::Memory {
                name: format!("perfectial-{}", Uuid::new_v4().simple()),
            },
            DEFAULT_BUSY_TIMEOUT,
        )
    }

    /// Opens the database described by configuration.
    ///
    /// Relative file paths are resolved against `base_dir`.
    pub fn from_config(config: &DatabaseConfig, base_dir: &Path) -> DbResult<Self> {
        let busy_timeout = config
            .busy_timeout_ms()
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BUSY_TIMEOUT);
        let target = match config.resolve_path(base_dir) {
            Some(path) => DatabaseTarget::File(path),
            None => DatabaseTarget::Memory {
                name: format!("perfectial-{}", Uuid::new_v4().simple()),
            },
        };
        Self::open_target(target, busy_timeout)
    }

    fn open_target(target: DatabaseTarget, busy_timeout: Duration) -> DbResult<Self> {
        let started_at = Instant::now();
        let mode = target.mode();
        info!("event=db_open module=db status=start mode={mode}");

        let result = connect_target(&target, busy_timeout).and_then(|mut conn| {
            bootstrap_connection(&mut conn, &target)?;
            Ok(conn)
        });

        match result {
            Ok(conn) => {
                info!(
                    "event=db_open module=db status=ok mode={mode} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                let anchor = match target {
                    DatabaseTarget::Memory { .. } => Some(Mutex::new(conn)),
                    DatabaseTarget::File(_) => None,
                };
                Ok(Self {
                    inner: Arc::new(DatabaseInner {
                        target,
                        busy_timeout,
                        _anchor: anchor,
                    }),
                })
            }
            Err(err) => {
                error!(
                    "event=db_open module=db status=error mode={mode} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    pub fn target(&self) -> &DatabaseTarget {
        &self.inner.target
    }

    /// Opens a new configured connection to this database.
    pub fn connect(&self) -> DbResult<Connection> {
        connect_target(&self.inner.target, self.inner.busy_timeout)
    }
}

fn connect_target(target: &DatabaseTarget, busy_timeout: Duration) -> DbResult<Connection> {
    let conn = match target {
        DatabaseTarget::File(path) => Connection::open(path)?,
        DatabaseTarget::Memory { name } => Connection::open_with_flags(
            format!("file:{name}?mode=memory&cache=shared"),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?,
    };
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(conn)
}

fn bootstrap_connection(conn: &mut Connection, target: &DatabaseTarget) -> DbResult<()> {
    if matches!(target, DatabaseTarget::File(_)) {
        let _mode: String =
            conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    }
    apply_migrations(conn)?;
    verify_entity_mappings(conn, ENTITY_MAPPINGS)?;
    Ok(())
}
