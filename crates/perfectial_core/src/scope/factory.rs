//! Entry point for creating scopes.
//!
//! # Invariants
//! - Scopes are only created inside a call chain.
//! - A joined scope never opens a context; a new scope always does.
//! - Transactional scopes never join.

use super::context::DataContext;
use super::context_scope::{AmbientSuppressor, DbContextReadOnlyScope, DbContextScope};
use super::locator::{self, SharedContext};
use super::{IsolationLevel, ScopeError, ScopeOption};
use crate::db::Database;
use crate::repo::RepoResult;
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Creates read-write, read-only and transactional scopes over one database.
#[derive(Debug, Clone)]
pub struct DbContextScopeFactory {
    database: Database,
}

impl DbContextScopeFactory {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Creates a read-write scope.
    ///
    /// # Errors
    /// - `ScopeError::NoCallChain` outside `call_chain`/`ensure_call_chain`.
    /// - `ScopeError::ReadWriteInsideReadOnly` when joining a read-only scope.
    pub fn create(&self, option: ScopeOption) -> RepoResult<DbContextScope> {
        ensure_in_call_chain()?;
        if option == ScopeOption::JoinExisting {
            if let Some(ambient) = locator::ambient_scope() {
                if ambient.is_read_only() {
                    warn!(
                        "event=scope_create module=scope status=error reason=read_write_inside_read_only ambient_scope_id={}",
                        ambient.scope_id()
                    );
                    return Err(ScopeError::ReadWriteInsideReadOnly.into());
                }
                let context = join(ambient.context())?;
                return DbContextScope::new(Arc::clone(&context), true)
                    .inspect_err(|_| context.lock().leave());
            }
        }
        DbContextScope::new(self.open_context(None)?, false)
    }

    /// Creates a read-only scope. Joining a read-write scope is allowed; the
    /// joined view simply cannot stage writes.
    pub fn create_read_only(&self, option: ScopeOption) -> RepoResult<DbContextReadOnlyScope> {
        ensure_in_call_chain()?;
        if option == ScopeOption::JoinExisting {
            if let Some(ambient) = locator::ambient_scope() {
                let context = join(ambient.context())?;
                return DbContextReadOnlyScope::new(Arc::clone(&context), true)
                    .inspect_err(|_| context.lock().leave());
            }
        }
        DbContextReadOnlyScope::new(self.open_context(None)?, false)
    }

    /// Creates a scope with its own context and an explicit transaction.
    ///
    /// # Errors
    /// - `ScopeError::IncompatibleAmbientTransaction` when the ambient context
    ///   runs an explicit transaction the requested level cannot coexist with.
    pub fn create_with_transaction(&self, isolation: IsolationLevel) -> RepoResult<DbContextScope> {
        ensure_in_call_chain()?;
        if let Some(ambient) = locator::ambient_scope() {
            let ambient_level = ambient.context().lock().isolation_level();
            if let Some(ambient_level) = ambient_level {
                if !ambient_level.is_compatible_with(isolation) {
                    warn!(
                        "event=scope_create module=scope status=error reason=incompatible_transaction ambient={ambient_level:?} requested={isolation:?}"
                    );
                    return Err(ScopeError::IncompatibleAmbientTransaction {
                        ambient: ambient_level,
                        requested: isolation,
                    }
                    .into());
                }
            }
        }
        DbContextScope::new(self.open_context(Some(isolation))?, false)
    }

    /// Hides every ambient scope until the returned guard is dropped.
    pub fn suppress_ambient(&self) -> RepoResult<AmbientSuppressor> {
        ensure_in_call_chain()?;
        AmbientSuppressor::new()
    }

    /// Isolation level of the ambient scope's explicit transaction, if any.
    pub fn ambient_transaction(&self) -> Option<IsolationLevel> {
        locator::ambient_scope().and_then(|ambient| ambient.context().lock().isolation_level())
    }

    fn open_context(&self, isolation: Option<IsolationLevel>) -> RepoResult<SharedContext> {
        let context = DataContext::open(&self.database, isolation)?;
        info!(
            "event=context_create module=scope status=ok context_id={} isolation={isolation:?}",
            context.id()
        );
        Ok(Arc::new(Mutex::new(context)))
    }
}

fn ensure_in_call_chain() -> Result<(), ScopeError> {
    if locator::in_call_chain() {
        Ok(())
    } else {
        Err(ScopeError::NoCallChain)
    }
}

fn join(context: SharedContext) -> RepoResult<SharedContext> {
    context.lock().enter()?;
    Ok(context)
}
