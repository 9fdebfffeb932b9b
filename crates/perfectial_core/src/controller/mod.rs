//! Transport-agnostic request adapters over the application services.
//!
//! # Contract
//! - Controllers never panic and never return errors; every failure is
//!   folded into a response envelope with `ok = false`.
//! - Response envelopes serialize to JSON for any front end.

pub mod todo_controller;
pub mod user_controller;

pub use todo_controller::{CreateToDoRequest, ToDoController, UpdateToDoRequest};
pub use user_controller::{
    RegisterUserRequest, SetCreditScoreRequest, UpdateUserRequest, UserController,
};

use crate::model::EntityId;
use crate::repo::RepoError;
use crate::service::ServiceOutcome;
use log::error;
use serde::Serialize;

/// Result envelope for commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResponse {
    pub ok: bool,
    /// Key of the affected entity, when known.
    pub id: Option<EntityId>,
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>, id: Option<EntityId>) -> Self {
        Self {
            ok: true,
            id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            message: message.into(),
        }
    }
}

/// Result envelope for queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataResponse<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T> DataResponse<T> {
    fn success(data: T, message: impl Into<String>) -> Self {
        Self {
            ok: true,
            data: Some(data),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            message: message.into(),
        }
    }
}

/// Folds a service result into a command envelope.
fn action_response<T>(
    operation: &str,
    result: Result<ServiceOutcome<T>, RepoError>,
    on_success: impl FnOnce(T) -> ActionResponse,
) -> ActionResponse {
    match result {
        Ok(ServiceOutcome::Success(value)) => on_success(value),
        Ok(ServiceOutcome::NotFound(id)) => {
            ActionResponse::failure(format!("{operation} failed: {id} not found"))
        }
        Ok(ServiceOutcome::ValidationFailed(reason)) => {
            ActionResponse::failure(format!("{operation} failed: {reason}"))
        }
        Err(err) => {
            error!("event={operation} module=controller status=error error={err}");
            ActionResponse::failure(format!("{operation} failed: {err}"))
        }
    }
}

/// Folds a service result into a query envelope.
fn data_response<T>(
    operation: &str,
    result: Result<ServiceOutcome<T>, RepoError>,
) -> DataResponse<T> {
    match result {
        Ok(ServiceOutcome::Success(value)) => DataResponse::success(value, "ok"),
        Ok(ServiceOutcome::NotFound(id)) => {
            DataResponse::failure(format!("{operation} failed: {id} not found"))
        }
        Ok(ServiceOutcome::ValidationFailed(reason)) => {
            DataResponse::failure(format!("{operation} failed: {reason}"))
        }
        Err(err) => {
            error!("event={operation} module=controller status=error error={err}");
            DataResponse::failure(format!("{operation} failed: {err}"))
        }
    }
}
