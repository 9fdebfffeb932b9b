//! Application services.
//!
//! # Responsibility
//! - Orchestrate repository calls inside scopes as use-case level APIs.
//! - Map entities to DTOs and normalize results into `ServiceOutcome`.
//! - Keep controllers decoupled from storage details.

pub mod audit_service;
pub mod outcome;
pub mod todo_service;
pub mod user_service;

pub use audit_service::AuditService;
pub use outcome::ServiceOutcome;
pub use todo_service::ToDoService;
pub use user_service::UserService;

use crate::db::Database;
use crate::repo::{RepoResult, RepositoryRegistry};
use crate::scope::DbContextScopeFactory;

/// Every application service wired over one database.
#[derive(Clone)]
pub struct Services {
    pub scopes: DbContextScopeFactory,
    pub users: UserService,
    pub todos: ToDoService,
    pub audit: AuditService,
}

impl Services {
    pub fn new(database: Database) -> RepoResult<Self> {
        let registry = RepositoryRegistry::with_default_entities();
        let scopes = DbContextScopeFactory::new(database);
        let audit = AuditService::new(scopes.clone(), &registry)?;
        Ok(Self {
            users: UserService::new(scopes.clone(), &registry, audit.clone())?,
            todos: ToDoService::new(scopes.clone(), &registry)?,
            audit,
            scopes,
        })
    }
}
