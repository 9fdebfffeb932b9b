//! Normalized result of an application-service call.

use crate::model::EntityId;
use serde::Serialize;

/// Business-level result of a use case.
///
/// Persistence failures are not outcomes; services return them as
/// `Err(RepoError)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ServiceOutcome<T> {
    Success(T),
    NotFound(EntityId),
    ValidationFailed(String),
}

impl<T> ServiceOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ServiceOutcome<U> {
        match self {
            Self::Success(value) => ServiceOutcome::Success(f(value)),
            Self::NotFound(id) => ServiceOutcome::NotFound(id),
            Self::ValidationFailed(reason) => ServiceOutcome::ValidationFailed(reason),
        }
    }
}
