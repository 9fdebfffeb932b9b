//! Audit trail entry.
//!
//! Audit entries are written in their own unit of work so that they persist
//! even when the caller's work is discarded.

use super::{now_epoch_ms, EntityId, TRANSIENT_ID};
use serde::{Deserialize, Serialize};

/// One recorded administrative action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: EntityId,
    /// Stable action name, e.g. `credit_score_changed`.
    pub action: String,
    /// Table name of the affected entity.
    pub entity: String,
    pub entity_id: EntityId,
    pub details: Option<String>,
    /// Unix epoch milliseconds.
    pub recorded_at: i64,
    pub is_deleted: bool,
}

impl AuditEntry {
    pub fn new(
        action: impl Into<String>,
        entity: impl Into<String>,
        entity_id: EntityId,
        details: Option<String>,
    ) -> Self {
        Self {
            id: TRANSIENT_ID,
            action: action.into(),
            entity: entity.into(),
            entity_id,
            details,
            recorded_at: now_epoch_ms(),
            is_deleted: false,
        }
    }
}
