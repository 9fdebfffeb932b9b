//! Ambient scope lookup for the current logical call chain.
//!
//! The stack lives in a tokio task-local, so it follows every `.await` of
//! the chain (also when the task resumes on another worker thread) and is
//! invisible to other tasks. `call_chain` gives a future its own stack, which
//! also isolates branches of `join!` that run inside one task.

use super::context::DataContext;
use super::ScopeError;
use log::warn;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub(crate) type SharedContext = Arc<Mutex<DataContext>>;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static AMBIENT_SCOPES: RefCell<Vec<AmbientEntry>>;
}

#[derive(Clone)]
pub(crate) enum AmbientEntry {
    Scope(AmbientScope),
    /// Hides every entry below it.
    Suppressed { marker: u64 },
}

impl AmbientEntry {
    fn id(&self) -> u64 {
        match self {
            Self::Scope(scope) => scope.scope_id,
            Self::Suppressed { marker } => *marker,
        }
    }
}

/// View of the scope currently on top of the call chain's stack.
#[derive(Clone)]
pub struct AmbientScope {
    scope_id: u64,
    context: SharedContext,
    read_only: bool,
    joined: bool,
}

impl AmbientScope {
    pub(crate) fn new(scope_id: u64, context: SharedContext, read_only: bool, joined: bool) -> Self {
        Self {
            scope_id,
            context,
            read_only,
            joined,
        }
    }

    pub fn scope_id(&self) -> u64 {
        self.scope_id
    }

    pub fn context_id(&self) -> u64 {
        self.context.lock().id()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub(crate) fn context(&self) -> SharedContext {
        Arc::clone(&self.context)
    }
}

pub(crate) fn next_scope_id() -> u64 {
    NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Runs `future` as a new call chain with an empty scope stack.
pub async fn call_chain<F: Future>(future: F) -> F::Output {
    AMBIENT_SCOPES.scope(RefCell::new(Vec::new()), future).await
}

/// Runs `future` inside the caller's call chain, starting one if needed.
pub async fn ensure_call_chain<F: Future>(future: F) -> F::Output {
    if in_call_chain() {
        future.await
    } else {
        call_chain(future).await
    }
}

pub fn in_call_chain() -> bool {
    AMBIENT_SCOPES.try_with(|_| ()).is_ok()
}

/// Returns the current ambient scope, or `None` when there is none, it is
/// suppressed, or no call chain is active.
pub fn ambient_scope() -> Option<AmbientScope> {
    AMBIENT_SCOPES
        .try_with(|stack| match stack.borrow().last() {
            Some(AmbientEntry::Scope(scope)) => Some(scope.clone()),
            _ => None,
        })
        .ok()
        .flatten()
}

/// Number of entries on the current stack; `0` outside a call chain.
pub fn depth() -> usize {
    AMBIENT_SCOPES
        .try_with(|stack| stack.borrow().len())
        .unwrap_or(0)
}

pub(crate) fn push(entry: AmbientEntry) -> Result<(), ScopeError> {
    AMBIENT_SCOPES
        .try_with(|stack| stack.borrow_mut().push(entry))
        .map_err(|_| ScopeError::NoCallChain)
}

/// Removes the entry with `id`, warning when it is not on top.
pub(crate) fn remove(id: u64) {
    let result = AMBIENT_SCOPES.try_with(|stack| {
        let mut stack = stack.borrow_mut();
        match stack.iter().rposition(|entry| entry.id() == id) {
            Some(position) if position + 1 == stack.len() => {
                stack.pop();
            }
            Some(position) => {
                warn!(
                    "event=scope_dispose module=scope status=out_of_order scope_id={id} depth={} position={position}",
                    stack.len()
                );
                stack.remove(position);
            }
            None => {
                warn!("event=scope_dispose module=scope status=missing scope_id={id}");
            }
        }
    });
    if result.is_err() {
        warn!("event=scope_dispose module=scope status=outside_call_chain scope_id={id}");
    }
}
