//! Scope guards: read-write, read-only and ambient suppression.
//!
//! # Invariants
//! - Every guard removes its own stack entry exactly once, on drop.
//! - An outermost guard disposes its context on drop; a joined guard only
//!   releases its share.
//! - There is no implicit commit: dropping without `save_changes` discards
//!   staged changes.

use super::context::EntryId;
use super::locator::{self, AmbientEntry, AmbientScope, SharedContext};
use crate::model::EntityId;
use crate::repo::{RepoError, RepoResult};
use log::debug;
use std::sync::Arc;

struct ScopeHandle {
    scope_id: u64,
    context: SharedContext,
    joined: bool,
    read_only: bool,
    disposed: bool,
}

impl ScopeHandle {
    /// Pushes the scope onto the call chain's stack.
    pub(super) fn register(
        context: SharedContext,
        joined: bool,
        read_only: bool,
    ) -> RepoResult<Self> {
        let scope_id = locator::next_scope_id();
        locator::push(AmbientEntry::Scope(AmbientScope::new(
            scope_id,
            Arc::clone(&context),
            read_only,
            joined,
        )))?;
        debug!(
            "event=scope_create module=scope status=ok scope_id={scope_id} joined={joined} read_only={read_only} depth={}",
            locator::depth()
        );
        Ok(Self {
            scope_id,
            context,
            joined,
            read_only,
            disposed: false,
        })
    }

    fn context_id(&self) -> u64 {
        self.context.lock().id()
    }

    fn generated_key(&self, entry: EntryId) -> Option<EntityId> {
        self.context.lock().generated_key(entry)
    }

    fn has_changes(&self) -> bool {
        self.context.lock().has_changes()
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        locator::remove(self.scope_id);

        let mut context = self.context.lock();
        if self.joined {
            context.leave();
        } else {
            context.dispose();
        }
        debug!(
            "event=scope_dispose module=scope status=ok scope_id={} joined={} read_only={}",
            self.scope_id, self.joined, self.read_only
        );
    }
}

impl Drop for ScopeHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Read-write unit of work.
pub struct DbContextScope {
    handle: ScopeHandle,
}

impl DbContextScope {
    pub(super) fn new(context: SharedContext, joined: bool) -> RepoResult<Self> {
        Ok(Self {
            handle: ScopeHandle::register(context, joined, false)?,
        })
    }

    /// Persists staged changes and returns rows affected.
    ///
    /// A joined scope returns `0` without touching the database; the
    /// outermost scope decides when the shared context is written.
    pub async fn save_changes(&self) -> RepoResult<usize> {
        if self.handle.joined {
            debug!(
                "event=scope_save module=scope status=skipped scope_id={} reason=joined",
                self.handle.scope_id
            );
            return Ok(0);
        }

        let context = Arc::clone(&self.handle.context);
        let scope_id = self.handle.scope_id;
        let rows = tokio::task::spawn_blocking(move || context.lock().save_changes())
            .await
            .map_err(|err| RepoError::Background(err.to_string()))??;
        debug!("event=scope_save module=scope status=ok scope_id={scope_id} rows={rows}");
        Ok(rows)
    }

    pub fn is_joined(&self) -> bool {
        self.handle.joined
    }

    pub fn scope_id(&self) -> u64 {
        self.handle.scope_id
    }

    pub fn context_id(&self) -> u64 {
        self.handle.context_id()
    }

    pub fn has_changes(&self) -> bool {
        self.handle.has_changes()
    }

    /// Key assigned to a staged insert by the last successful save.
    pub fn generated_key(&self, entry: EntryId) -> Option<EntityId> {
        self.handle.generated_key(entry)
    }

    /// Ends the scope now; same as dropping it.
    pub fn dispose(self) {}
}

/// Read-only unit of work; offers no save and rejects staged writes.
pub struct DbContextReadOnlyScope {
    handle: ScopeHandle,
}

impl DbContextReadOnlyScope {
    pub(super) fn new(context: SharedContext, joined: bool) -> RepoResult<Self> {
        Ok(Self {
            handle: ScopeHandle::register(context, joined, true)?,
        })
    }

    pub fn is_joined(&self) -> bool {
        self.handle.joined
    }

    pub fn scope_id(&self) -> u64 {
        self.handle.scope_id
    }

    pub fn context_id(&self) -> u64 {
        self.handle.context_id()
    }

    pub fn dispose(self) {}
}

/// Hides ambient scopes until dropped.
pub struct AmbientSuppressor {
    marker: u64,
}

impl AmbientSuppressor {
    pub(super) fn new() -> RepoResult<Self> {
        let marker = locator::next_scope_id();
        locator::push(AmbientEntry::Suppressed { marker })?;
        debug!("event=scope_suppress module=scope status=ok marker={marker}");
        Ok(Self { marker })
    }
}

impl Drop for AmbientSuppressor {
    fn drop(&mut self) {
        locator::remove(self.marker);
    }
}
