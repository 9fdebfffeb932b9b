//! Generic per-entity repository over the ambient persistence context.
//!
//! # Responsibility
//! - Resolve the persistence context from the ambient scope on every call.
//! - Run reads on the blocking pool; stage writes in the change tracker.
//!
//! # Invariants
//! - A call outside an active scope fails with `ScopeError::NoAmbientScope`
//!   and never opens a context.
//! - Writes are rejected while the ambient scope is read-only.

use super::entity::{Entity, EntityMapping, KEY_COLUMN};
use super::query::{Filter, Query};
use super::{RepoError, RepoResult};
use crate::model::{EntityId, TRANSIENT_ID};
use crate::scope::context::DataContext;
use crate::scope::locator::{self, SharedContext};
use crate::scope::{EntryId, ScopeError};
use log::debug;
use rusqlite::types::Value;
use std::marker::PhantomData;

/// Stateless data-access facade for one entity type.
pub struct Repository<E: Entity> {
    mapping: EntityMapping,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<E: Entity> Default for Repository<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> std::fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("table", &self.mapping.table)
            .finish()
    }
}

impl<E: Entity> Repository<E> {
    pub fn new() -> Self {
        Self {
            mapping: EntityMapping::of::<E>(),
            _entity: PhantomData,
        }
    }

    pub fn mapping(&self) -> &EntityMapping {
        &self.mapping
    }

    /// Loads one active entity by key with its root measures.
    pub async fn get_by_id(&self, id: EntityId) -> RepoResult<Option<E>> {
        let query = Query::new()
            .filter(Filter::eq(KEY_COLUMN, id))
            .include_all(E::root_measures())
            .limit(1);
        Ok(self.get_list(query).await?.into_iter().next())
    }

    /// Loads every entity matching `query`; an empty query returns all active rows.
    pub async fn get_list(&self, query: Query) -> RepoResult<Vec<E>> {
        self.run(move |context| context.select::<E>(&query)).await
    }

    pub async fn first_or_default(&self, query: Query) -> RepoResult<Option<E>> {
        Ok(self.get_list(query.limit(1)).await?.into_iter().next())
    }

    /// Returns the only entity matching `filter`.
    ///
    /// # Errors
    /// - `RepoError::MultipleResults` when more than one row matches.
    pub async fn single_or_default(&self, filter: Filter) -> RepoResult<Option<E>> {
        let mut rows = self.get_list(Query::new().filter(filter).limit(2)).await?;
        if rows.len() > 1 {
            return Err(RepoError::MultipleResults(E::TABLE));
        }
        Ok(rows.pop())
    }

    pub async fn any(&self, filter: Filter) -> RepoResult<bool> {
        Ok(self.count(filter).await? > 0)
    }

    pub async fn count(&self, filter: Filter) -> RepoResult<u64> {
        let mapping = self.mapping;
        let query = Query::new().filter(filter);
        self.run(move |context| context.count(&mapping, &query)).await
    }

    /// Stages an insert. The generated key is available from the owning
    /// scope after it saves.
    pub fn add(&self, entity: &E) -> RepoResult<EntryId> {
        let context = self.writable_context()?;
        let mut context = context.lock();
        Ok(context
            .tracker_mut()?
            .stage_insert(self.mapping, entity.to_values()))
    }

    pub fn add_range(&self, entities: &[E]) -> RepoResult<Vec<EntryId>> {
        let context = self.writable_context()?;
        let mut context = context.lock();
        let tracker = context.tracker_mut()?;
        Ok(entities
            .iter()
            .map(|entity| tracker.stage_insert(self.mapping, entity.to_values()))
            .collect())
    }

    pub fn update(&self, entity: &E) -> RepoResult<EntryId> {
        self.require_persisted(entity, "update")?;
        let context = self.writable_context()?;
        let mut context = context.lock();
        Ok(context
            .tracker_mut()?
            .stage_update(self.mapping, entity.id(), entity.to_values()))
    }

    pub fn update_range(&self, entities: &[E]) -> RepoResult<Vec<EntryId>> {
        for entity in entities {
            self.require_persisted(entity, "update")?;
        }
        let context = self.writable_context()?;
        let mut context = context.lock();
        let tracker = context.tracker_mut()?;
        Ok(entities
            .iter()
            .map(|entity| tracker.stage_update(self.mapping, entity.id(), entity.to_values()))
            .collect())
    }

    /// Stages a physical delete. Services use soft deletion through `update`.
    pub fn delete(&self, entity: &E) -> RepoResult<EntryId> {
        self.require_persisted(entity, "delete")?;
        let context = self.writable_context()?;
        let mut context = context.lock();
        Ok(context.tracker_mut()?.stage_delete(self.mapping, entity.id()))
    }

    pub fn delete_range(&self, entities: &[E]) -> RepoResult<Vec<EntryId>> {
        for entity in entities {
            self.require_persisted(entity, "delete")?;
        }
        let context = self.writable_context()?;
        let mut context = context.lock();
        let tracker = context.tracker_mut()?;
        Ok(entities
            .iter()
            .map(|entity| tracker.stage_delete(self.mapping, entity.id()))
            .collect())
    }

    /// Inserts or updates each entity, matching existing rows by
    /// `identifier_column`.
    ///
    /// Rows found in the database (deleted ones included) are updated and the
    /// entity receives their key. An insert already staged for the same
    /// identifier is replaced, so repeating the call before saving stages
    /// nothing new. With the key column as identifier, an entity whose key
    /// has no row is staged as an insert and its key reset until the save
    /// assigns one.
    pub async fn add_or_update(
        &self,
        identifier_column: &str,
        entities: &mut [E],
    ) -> RepoResult<Vec<EntryId>> {
        if identifier_column == KEY_COLUMN {
            return self.upsert_by_key(entities).await;
        }
        let index = self.mapping.column_index(identifier_column).ok_or_else(|| {
            RepoError::InvalidQuery(format!(
                "unknown column `{identifier_column}` for `{}`",
                self.mapping.table
            ))
        })?;

        let context = self.writable_context()?;
        let mapping = self.mapping;
        let column = identifier_column.to_string();
        let staged = entities
            .iter()
            .map(|entity| entity.to_values())
            .collect::<Vec<_>>();

        let resolved = run_blocking(context, move |context| {
            staged
                .into_iter()
                .map(|values| upsert_one(context, &mapping, &column, index, values))
                .collect::<RepoResult<Vec<_>>>()
        })
        .await?;

        let mut entries = Vec::with_capacity(resolved.len());
        for (entity, (key, entry)) in entities.iter_mut().zip(resolved) {
            if let Some(key) = key {
                entity.set_id(key);
            }
            entries.push(entry);
        }
        debug!(
            "event=repo_upsert module=repo status=ok table={} count={}",
            self.mapping.table,
            entries.len()
        );
        Ok(entries)
    }

    async fn upsert_by_key(&self, entities: &mut [E]) -> RepoResult<Vec<EntryId>> {
        let context = self.writable_context()?;
        let mapping = self.mapping;
        let staged = entities
            .iter()
            .map(|entity| (entity.id(), entity.to_values()))
            .collect::<Vec<_>>();

        let resolved = run_blocking(context, move |context| {
            staged
                .into_iter()
                .map(|(key, values)| upsert_one_by_key(context, &mapping, key, values))
                .collect::<RepoResult<Vec<_>>>()
        })
        .await?;

        let mut entries = Vec::with_capacity(resolved.len());
        for (entity, (key, entry)) in entities.iter_mut().zip(resolved) {
            if let Some(key) = key {
                entity.set_id(key);
            }
            entries.push(entry);
        }
        debug!(
            "event=repo_upsert module=repo status=ok table={} by=key count={}",
            self.mapping.table,
            entries.len()
        );
        Ok(entries)
    }

    fn require_persisted(&self, entity: &E, operation: &str) -> RepoResult<()> {
        if entity.is_transient() {
            return Err(RepoError::InvalidData(format!(
                "cannot {operation} a `{}` row that was never saved",
                self.mapping.table
            )));
        }
        Ok(())
    }

    fn context(&self) -> RepoResult<SharedContext> {
        locator::ambient_scope()
            .map(|scope| scope.context())
            .ok_or_else(|| ScopeError::NoAmbientScope { entity: E::TABLE }.into())
    }

    fn writable_context(&self) -> RepoResult<SharedContext> {
        let scope = locator::ambient_scope()
            .ok_or(ScopeError::NoAmbientScope { entity: E::TABLE })?;
        if scope.is_read_only() {
            return Err(ScopeError::ReadOnlyScope.into());
        }
        Ok(scope.context())
    }

    async fn run<T, F>(&self, work: F) -> RepoResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut DataContext) -> RepoResult<T> + Send + 'static,
    {
        let context = self.context()?;
        run_blocking(context, work).await
    }
}

async fn run_blocking<T, F>(context: SharedContext, work: F) -> RepoResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut DataContext) -> RepoResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&mut context.lock()))
        .await
        .map_err(|err| RepoError::Background(err.to_string()))?
}

fn upsert_one(
    context: &mut DataContext,
    mapping: &EntityMapping,
    column: &str,
    index: usize,
    values: Vec<Value>,
) -> RepoResult<(Option<EntityId>, EntryId)> {
    let identifier = values[index].clone();
    if let Some(entry) = context
        .tracker_mut()?
        .find_pending_insert(mapping, index, &identifier)
    {
        context.tracker_mut()?.replace_insert_values(entry, values);
        return Ok((None, entry));
    }
    match context.find_key_by_column(mapping, column, &identifier)? {
        Some(key) => {
            let entry = context.tracker_mut()?.stage_update(*mapping, key, values);
            Ok((Some(key), entry))
        }
        None => Ok((None, context.tracker_mut()?.stage_insert(*mapping, values))),
    }
}

fn upsert_one_by_key(
    context: &mut DataContext,
    mapping: &EntityMapping,
    key: EntityId,
    values: Vec<Value>,
) -> RepoResult<(Option<EntityId>, EntryId)> {
    if key == TRANSIENT_ID {
        return Ok((None, context.tracker_mut()?.stage_insert(*mapping, values)));
    }
    let found = context.find_key_by_column(mapping, mapping.key, &Value::Integer(key))?;
    if found.is_some() {
        let entry = context.tracker_mut()?.stage_update(*mapping, key, values);
        return Ok((None, entry));
    }
    let entry = context.tracker_mut()?.stage_insert(*mapping, values);
    Ok((Some(TRANSIENT_ID), entry))
}
