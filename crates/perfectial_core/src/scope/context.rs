//! Persistence context: one SQLite connection plus a change tracker.
//!
//! # Responsibility
//! - Stage inserts, updates and deletes until the owning scope saves.
//! - Flush staged changes atomically and report rows affected.
//! - Run explicit transactions for transactional scopes.
//!
//! # Invariants
//! - A context is used by one call chain at a time.
//! - A failed save leaves staged changes in place and writes nothing.
//! - A disposed context rejects every further operation.

use super::{IsolationLevel, ScopeError};
use crate::db::Database;
use crate::model::EntityId;
use crate::repo::entity::{Entity, EntityMapping};
use crate::repo::query::{count_rows, select_entities, Query};
use crate::repo::{RepoError, RepoResult};
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to one staged change, used to read generated keys after saving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
struct PendingChange {
    entry: EntryId,
    mapping: EntityMapping,
    kind: ChangeKind,
    key: EntityId,
    values: Vec<Value>,
}

/// Ordered log of staged changes.
#[derive(Debug, Default)]
pub(crate) struct ChangeTracker {
    last_entry: u64,
    pending: Vec<PendingChange>,
    generated_keys: HashMap<EntryId, EntityId>,
}

impl ChangeTracker {
    fn next_entry(&mut self) -> EntryId {
        self.last_entry += 1;
        EntryId(self.last_entry)
    }

    pub(crate) fn stage_insert(&mut self, mapping: EntityMapping, values: Vec<Value>) -> EntryId {
        debug_assert_eq!(values.len(), mapping.columns.len());
        let entry = self.next_entry();
        self.pending.push(PendingChange {
            entry,
            mapping,
            kind: ChangeKind::Insert,
            key: crate::model::TRANSIENT_ID,
            values,
        });
        entry
    }

    /// Stages an update; a change already staged for the same row is replaced.
    pub(crate) fn stage_update(
        &mut self,
        mapping: EntityMapping,
        key: EntityId,
        values: Vec<Value>,
    ) -> EntryId {
        debug_assert_eq!(values.len(), mapping.columns.len());
        if let Some(existing) = self.staged_for_row(&mapping, key) {
            existing.kind = ChangeKind::Update;
            existing.values = values;
            return existing.entry;
        }
        let entry = self.next_entry();
        self.pending.push(PendingChange {
            entry,
            mapping,
            kind: ChangeKind::Update,
            key,
            values,
        });
        entry
    }

    /// Stages a delete; a change already staged for the same row is replaced.
    pub(crate) fn stage_delete(&mut self, mapping: EntityMapping, key: EntityId) -> EntryId {
        if let Some(existing) = self.staged_for_row(&mapping, key) {
            existing.kind = ChangeKind::Delete;
            existing.values.clear();
            return existing.entry;
        }
        let entry = self.next_entry();
        self.pending.push(PendingChange {
            entry,
            mapping,
            kind: ChangeKind::Delete,
            key,
            values: Vec::new(),
        });
        entry
    }

    fn staged_for_row(&mut self, mapping: &EntityMapping, key: EntityId) -> Option<&mut PendingChange> {
        self.pending.iter_mut().find(|change| {
            change.kind != ChangeKind::Insert
                && change.key == key
                && change.mapping.table == mapping.table
        })
    }

    /// Finds a staged insert whose value at `column_index` equals `value`.
    pub(crate) fn find_pending_insert(
        &self,
        mapping: &EntityMapping,
        column_index: usize,
        value: &Value,
    ) -> Option<EntryId> {
        self.pending
            .iter()
            .find(|change| {
                change.kind == ChangeKind::Insert
                    && change.mapping.table == mapping.table
                    && change.values.get(column_index) == Some(value)
            })
            .map(|change| change.entry)
    }

    pub(crate) fn replace_insert_values(&mut self, entry: EntryId, values: Vec<Value>) {
        if let Some(change) = self
            .pending
            .iter_mut()
            .find(|change| change.entry == entry && change.kind == ChangeKind::Insert)
        {
            change.values = values;
        }
    }

    fn complete(&mut self, generated: Vec<(EntryId, EntityId)>) {
        self.pending.clear();
        self.generated_keys.extend(generated);
    }

    fn clear(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }
}

/// One SQLite connection and its unit-of-work state.
pub struct DataContext {
    id: u64,
    conn: Option<Connection>,
    tracker: ChangeTracker,
    isolation: Option<IsolationLevel>,
    in_transaction: bool,
    joined: usize,
}

impl DataContext {
    pub(crate) fn open(database: &Database, isolation: Option<IsolationLevel>) -> RepoResult<Self> {
        let conn = database.connect()?;
        if isolation == Some(IsolationLevel::ReadUncommitted) {
            conn.execute_batch("PRAGMA read_uncommitted = 1;")?;
        }
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            "event=context_open module=scope status=ok context_id={id} isolation={isolation:?}"
        );
        Ok(Self {
            id,
            conn: Some(conn),
            tracker: ChangeTracker::default(),
            isolation,
            in_transaction: false,
            joined: 0,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn isolation_level(&self) -> Option<IsolationLevel> {
        self.isolation
    }

    pub fn has_changes(&self) -> bool {
        !self.tracker.pending.is_empty()
    }

    pub fn pending_changes(&self) -> usize {
        self.tracker.pending.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.conn.is_none()
    }

    /// Number of joined scopes currently sharing this context.
    pub fn join_count(&self) -> usize {
        self.joined
    }

    /// Key generated for a staged insert, once saved.
    pub fn generated_key(&self, entry: EntryId) -> Option<EntityId> {
        self.tracker.generated_keys.get(&entry).copied()
    }

    pub(crate) fn enter(&mut self) -> Result<(), ScopeError> {
        if self.is_disposed() {
            return Err(ScopeError::ContextDisposed(self.id));
        }
        self.joined += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.joined = self.joined.saturating_sub(1);
    }

    pub(crate) fn tracker_mut(&mut self) -> RepoResult<&mut ChangeTracker> {
        if self.is_disposed() {
            return Err(ScopeError::ContextDisposed(self.id).into());
        }
        Ok(&mut self.tracker)
    }

    fn ensure_transaction(&mut self) -> RepoResult<()> {
        let Some(level) = self.isolation else {
            return Ok(());
        };
        if self.in_transaction {
            return Ok(());
        }
        let conn = self
            .conn
            .as_ref()
            .ok_or(ScopeError::ContextDisposed(self.id))?;
        conn.execute_batch(level.begin_sql())?;
        self.in_transaction = true;
        Ok(())
    }

    fn connection(&mut self) -> RepoResult<&Connection> {
        self.ensure_transaction()?;
        self.conn
            .as_ref()
            .ok_or_else(|| ScopeError::ContextDisposed(self.id).into())
    }

    pub(crate) fn select<E: Entity>(&mut self, query: &Query) -> RepoResult<Vec<E>> {
        let conn = self.connection()?;
        select_entities(conn, query)
    }

    pub(crate) fn count(&mut self, mapping: &EntityMapping, query: &Query) -> RepoResult<u64> {
        let conn = self.connection()?;
        count_rows(conn, mapping, query)
    }

    /// Looks up the key of any row, deleted included, whose `column` equals `value`.
    pub(crate) fn find_key_by_column(
        &mut self,
        mapping: &EntityMapping,
        column: &str,
        value: &Value,
    ) -> RepoResult<Option<EntityId>> {
        mapping.check_column(column)?;
        let conn = self.connection()?;
        let key = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE {column} = ?1 LIMIT 1;",
                    mapping.key, mapping.table
                ),
                [value],
                |row| row.get::<_, EntityId>(0),
            )
            .optional()?;
        Ok(key)
    }

    /// Writes every staged change in one transaction and returns rows affected.
    ///
    /// With an explicit transaction the flush happens inside it and the
    /// transaction is committed; the next operation begins a new one.
    pub(crate) fn save_changes(&mut self) -> RepoResult<usize> {
        if self.is_disposed() {
            return Err(ScopeError::ContextDisposed(self.id).into());
        }

        if self.isolation.is_some() {
            self.ensure_transaction()?;
            let Some(conn) = self.conn.as_ref() else {
                return Err(ScopeError::ContextDisposed(self.id).into());
            };
            return match flush(conn, &self.tracker.pending) {
                Ok((rows, generated)) => {
                    conn.execute_batch("COMMIT;")?;
                    self.in_transaction = false;
                    self.tracker.complete(generated);
                    Ok(rows)
                }
                Err(err) => {
                    if let Err(rollback_err) = conn.execute_batch("ROLLBACK;") {
                        warn!(
                            "event=context_rollback module=scope status=error context_id={} error={}",
                            self.id, rollback_err
                        );
                    }
                    self.in_transaction = false;
                    Err(err)
                }
            };
        }

        if self.tracker.pending.is_empty() {
            return Ok(0);
        }
        let Some(conn) = self.conn.as_ref() else {
            return Err(ScopeError::ContextDisposed(self.id).into());
        };
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
        let (rows, generated) = flush(&tx, &self.tracker.pending)?;
        tx.commit()?;
        self.tracker.complete(generated);
        Ok(rows)
    }

    /// Rolls back any open transaction, drops staged changes and closes.
    pub(crate) fn dispose(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let discarded = self.tracker.clear();
        if discarded > 0 {
            debug!(
                "event=context_dispose module=scope status=discarded context_id={} pending={}",
                self.id, discarded
            );
        }
        if self.in_transaction {
            if let Err(err) = conn.execute_batch("ROLLBACK;") {
                warn!(
                    "event=context_rollback module=scope status=error context_id={} error={}",
                    self.id, err
                );
            }
            self.in_transaction = false;
        }
        debug!(
            "event=context_dispose module=scope status=ok context_id={}",
            self.id
        );
    }
}

fn flush(
    conn: &Connection,
    pending: &[PendingChange],
) -> RepoResult<(usize, Vec<(EntryId, EntityId)>)> {
    let mut rows = 0;
    let mut generated = Vec::new();

    for change in pending {
        let mapping = &change.mapping;
        match change.kind {
            ChangeKind::Insert => {
                let placeholders = vec!["?"; mapping.columns.len()].join(", ");
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({placeholders});",
                    mapping.table,
                    mapping.columns.join(", ")
                );
                rows += conn.execute(&sql, params_from_iter(change.values.iter()))?;
                generated.push((change.entry, conn.last_insert_rowid()));
            }
            ChangeKind::Update => {
                let assignments = mapping
                    .columns
                    .iter()
                    .map(|column| format!("{column} = ?"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let sql = format!(
                    "UPDATE {} SET {assignments} WHERE {} = ?;",
                    mapping.table, mapping.key
                );
                let binds = change
                    .values
                    .iter()
                    .cloned()
                    .chain(std::iter::once(Value::Integer(change.key)));
                rows += expect_affected(conn.execute(&sql, params_from_iter(binds))?, change)?;
            }
            ChangeKind::Delete => {
                let sql = format!(
                    "DELETE FROM {} WHERE {} = ?1;",
                    mapping.table, mapping.key
                );
                rows += expect_affected(conn.execute(&sql, [change.key])?, change)?;
            }
        }
    }

    Ok((rows, generated))
}

fn expect_affected(changed: usize, change: &PendingChange) -> RepoResult<usize> {
    if changed == 0 {
        return Err(RepoError::ConcurrencyConflict {
            table: change.mapping.table,
            id: change.key,
        });
    }
    Ok(changed)
}
