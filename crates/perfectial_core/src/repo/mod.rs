//! Data access: entity mappings, query model and the generic repository.
//!
//! # Responsibility
//! - Map domain entities to SQLite tables through explicit `Entity` impls.
//! - Provide per-entity repositories that resolve their persistence context
//!   from the ambient scope on every call.
//!
//! # Invariants
//! - Repositories hold no context of their own.
//! - Writes are only staged; nothing reaches SQLite before the owning
//!   scope saves.

pub mod entity;
pub mod mappings;
pub mod query;
pub mod registry;
pub mod repository;

use crate::db::DbError;
use crate::model::EntityId;
use crate::scope::ScopeError;

pub use entity::{Entity, EntityMapping, NavigationLoader};
pub use query::{Filter, OrderBy, Query, SortDirection};
pub use registry::RepositoryRegistry;
pub use repository::Repository;

pub type RepoResult<T> = Result<T, RepoError>;

/// Data-access error shared by repositories, scopes and services.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Scope misuse; a programming error that is never retried.
    #[error(transparent)]
    Scope(#[from] ScopeError),
    #[error("{0}")]
    Db(#[from] DbError),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("{table} row {id} was not affected; it was changed or removed concurrently")]
    ConcurrencyConflict { table: &'static str, id: EntityId },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("`{entity}` has no navigation named `{navigation}`")]
    UnknownNavigation {
        entity: &'static str,
        navigation: String,
    },
    #[error("expected at most one `{0}` row, found several")]
    MultipleResults(&'static str),
    #[error("no repository registered for `{0}`")]
    Unregistered(&'static str),
    #[error("repository for `{0}` is already registered")]
    DuplicateRegistration(&'static str),
    #[error("background data-access task failed: {0}")]
    Background(String),
}

impl RepoError {
    /// Returns whether this error signals misuse rather than a runtime fault.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Scope(_)
                | Self::InvalidQuery(_)
                | Self::UnknownNavigation { .. }
                | Self::Unregistered(_)
                | Self::DuplicateRegistration(_)
        )
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(inner, message)
                if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Constraint(message.unwrap_or_else(|| inner.to_string()))
            }
            other => Self::Db(DbError::Sqlite(other)),
        }
    }
}
