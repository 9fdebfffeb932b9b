//! Core of the Perfectial user and to-do backend.
//!
//! Layers, leaves first: `db` (SQLite bootstrap), `scope` (ambient units of
//! work), `repo` (generic repositories), `service` (use cases), `controller`
//! (request adapters).

pub mod config;
pub mod controller;
pub mod db;
pub mod dto;
pub mod logging;
pub mod model;
pub mod repo;
pub mod scope;
pub mod service;

pub use config::{AppConfig, ConfigError, DatabaseConfig, LoggingConfig};
pub use controller::{ActionResponse, DataResponse, ToDoController, UserController};
pub use db::{Database, DbError};
pub use dto::{AuditEntryDto, ToDoDto, UserDto};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::audit::AuditEntry;
pub use model::todo::ToDo;
pub use model::user::User;
pub use model::EntityId;
pub use repo::{Filter, Query, RepoError, RepoResult, Repository, RepositoryRegistry};
pub use scope::{
    call_chain, ensure_call_chain, DbContextScope, DbContextScopeFactory, IsolationLevel,
    ScopeError, ScopeOption,
};
pub use service::{AuditService, ServiceOutcome, Services, ToDoService, UserService};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
