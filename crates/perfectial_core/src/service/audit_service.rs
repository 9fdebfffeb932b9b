//! Audit trail service.
//!
//! # Invariants
//! - Outside explicit transactions every entry is saved in its own new scope,
//!   so it persists even when the caller's unit of work is later discarded.
//! - Inside an explicit transaction the entry is staged on the caller's
//!   context and commits or rolls back with the change it describes.

use crate::dto::AuditEntryDto;
use crate::model::audit::AuditEntry;
use crate::model::{EntityId, TRANSIENT_ID};
use crate::repo::{Filter, Query, RepoResult, Repository, RepositoryRegistry, SortDirection};
use crate::scope::{ensure_call_chain, DbContextScopeFactory, ScopeOption};
use log::info;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuditService {
    scopes: DbContextScopeFactory,
    entries: Arc<Repository<AuditEntry>>,
}

impl AuditService {
    pub fn new(scopes: DbContextScopeFactory, registry: &RepositoryRegistry) -> RepoResult<Self> {
        Ok(Self {
            scopes,
            entries: registry.repository::<AuditEntry>()?,
        })
    }

    /// Persists one audit entry and returns its key.
    ///
    /// When the ambient scope runs an explicit transaction the entry joins it
    /// and the returned key is `TRANSIENT_ID` until that scope saves.
    pub async fn record(
        &self,
        action: &str,
        entity: &str,
        entity_id: EntityId,
        details: Option<String>,
    ) -> RepoResult<EntityId> {
        let entry = AuditEntry::new(action, entity, entity_id, details);
        ensure_call_chain(self.save_entry(entry)).await
    }

    /// Entries for one entity, oldest first.
    pub async fn list_for_entity(
        &self,
        entity: &str,
        entity_id: EntityId,
    ) -> RepoResult<Vec<AuditEntryDto>> {
        let query = Query::new()
            .filter(Filter::eq("entity", entity.to_string()))
            .filter(Filter::eq("entity_id", entity_id))
            .order_by("recorded_at", SortDirection::Asc)
            .order_by("id", SortDirection::Asc);
        ensure_call_chain(self.load_entries(query)).await
    }

    async fn save_entry(&self, entry: AuditEntry) -> RepoResult<EntityId> {
        if let Some(isolation) = self.scopes.ambient_transaction() {
            let scope = self.scopes.create(ScopeOption::JoinExisting)?;
            self.entries.add(&entry)?;
            scope.save_changes().await?;
            info!(
                "event=audit_record module=service status=staged action={} entity={} entity_id={} isolation={isolation:?}",
                entry.action, entry.entity, entry.entity_id
            );
            return Ok(TRANSIENT_ID);
        }

        let scope = self.scopes.create(ScopeOption::ForceCreateNew)?;
        let staged = self.entries.add(&entry)?;
        scope.save_changes().await?;
        let id = scope.generated_key(staged).unwrap_or(TRANSIENT_ID);
        info!(
            "event=audit_record module=service status=ok action={} entity={} entity_id={} audit_id={id}",
            entry.action, entry.entity, entry.entity_id
        );
        Ok(id)
    }

    async fn load_entries(&self, query: Query) -> RepoResult<Vec<AuditEntryDto>> {
        let _scope = self.scopes.create_read_only(ScopeOption::JoinExisting)?;
        let entries = self.entries.get_list(query).await?;
        Ok(entries.iter().map(AuditEntryDto::from).collect())
    }
}
