//! Domain model for the task-tracking / user-management system.
//!
//! # Responsibility
//! - Define aggregate roots and entities with their validation rules.
//! - Keep persistence mapping out of the domain types (see `repo::mappings`).
//!
//! # Invariants
//! - Every persisted entity is identified by an integer surrogate key; `0`
//!   marks an entity that has not been saved yet.
//! - Deletion is represented by a soft-delete flag, not hard delete.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod audit;
pub mod todo;
pub mod user;

/// Integer surrogate key shared by every entity.
pub type EntityId = i64;

/// Key value carried by entities that have not been persisted yet.
pub const TRANSIENT_ID: EntityId = 0;

/// Returns the current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
