//! Ambient unit-of-work scopes over SQLite persistence contexts.
//!
//! # Responsibility
//! - Own persistence-context lifetime: one context per outermost scope,
//!   shared by every scope joined inside it.
//! - Track the current scope per logical call chain so repositories can
//!   find their context without it being passed around.
//!
//! # Invariants
//! - Only the scope that created a context saves or disposes it.
//! - Disposing an outermost scope without saving discards staged changes.
//! - Call chains never observe each other's scopes.

pub mod context;
mod context_scope;
mod factory;
pub mod locator;

pub use context::{DataContext, EntryId};
pub use context_scope::{AmbientSuppressor, DbContextReadOnlyScope, DbContextScope};
pub use factory::DbContextScopeFactory;
pub use locator::{ambient_scope, call_chain, ensure_call_chain, in_call_chain, AmbientScope};

/// How a new scope relates to an existing ambient scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeOption {
    /// Share the ambient context when one exists.
    #[default]
    JoinExisting,
    /// Always open a new context, even inside another scope.
    ForceCreateNew,
}

/// Transaction isolation requested for an explicit-transaction scope.
///
/// SQLite serializes writers, so levels map onto its locking modes:
/// `ReadUncommitted` additionally enables `read_uncommitted` on the
/// connection and `Serializable` takes the write lock on `BEGIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub(crate) fn begin_sql(self) -> &'static str {
        match self {
            Self::Serializable => "BEGIN IMMEDIATE;",
            _ => "BEGIN DEFERRED;",
        }
    }

    fn reserves_writer(self) -> bool {
        matches!(self, Self::Serializable)
    }

    /// Whether a second context may open a transaction at `other` while one
    /// at `self` is active in the same call chain.
    pub(crate) fn is_compatible_with(self, other: IsolationLevel) -> bool {
        self == other && !self.reserves_writer()
    }
}

/// Scope misuse; always a programming error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    #[error("no ambient call chain; wrap the call in `call_chain` or `ensure_call_chain`")]
    NoCallChain,
    #[error("no ambient scope is active for `{entity}`; create one with DbContextScopeFactory")]
    NoAmbientScope { entity: &'static str },
    #[error("cannot join a read-only ambient scope with a read-write scope")]
    ReadWriteInsideReadOnly,
    #[error("the ambient scope is read-only; writes cannot be staged")]
    ReadOnlyScope,
    #[error("ambient transaction at {ambient:?} is incompatible with requested {requested:?}")]
    IncompatibleAmbientTransaction {
        ambient: IsolationLevel,
        requested: IsolationLevel,
    },
    #[error("persistence context {0} has been disposed")]
    ContextDisposed(u64),
}
