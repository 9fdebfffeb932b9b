//! To-do item entity.
//!
//! # Invariants
//! - A to-do always belongs to exactly one user (`user_id > 0`).
//! - `title` is never blank.

use super::user::User;
use super::{now_epoch_ms, EntityId, TRANSIENT_ID};
use serde::{Deserialize, Serialize};

const TITLE_MAX_CHARS: usize = 200;
const DESCRIPTION_MAX_CHARS: usize = 2000;

/// Validation failures for [`ToDo`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToDoValidationError {
    #[error("to-do must belong to a persisted user, got user id {0}")]
    MissingOwner(EntityId),
    #[error("to-do title cannot be blank")]
    BlankTitle,
    #[error("to-do title exceeds 200 characters")]
    TitleTooLong,
    #[error("to-do description exceeds 2000 characters")]
    DescriptionTooLong,
}

/// Actionable item owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToDo {
    pub id: EntityId,
    pub user_id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub is_done: bool,
    /// Unix epoch milliseconds.
    pub due_at: Option<i64>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub is_deleted: bool,
    /// Owning user; populated only when explicitly included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Box<User>>,
}

impl ToDo {
    /// Creates a transient open to-do stamped with the current time.
    pub fn new(user_id: EntityId, title: impl Into<String>) -> Self {
        Self {
            id: TRANSIENT_ID,
            user_id,
            title: title.into(),
            description: None,
            is_done: false,
            due_at: None,
            created_at: now_epoch_ms(),
            is_deleted: false,
            owner: None,
        }
    }

    pub fn validate(&self) -> Result<(), ToDoValidationError> {
        if self.user_id <= TRANSIENT_ID {
            return Err(ToDoValidationError::MissingOwner(self.user_id));
        }
        if self.title.trim().is_empty() {
            return Err(ToDoValidationError::BlankTitle);
        }
        if self.title.chars().count() > TITLE_MAX_CHARS {
            return Err(ToDoValidationError::TitleTooLong);
        }
        if self
            .description
            .as_ref()
            .is_some_and(|text| text.chars().count() > DESCRIPTION_MAX_CHARS)
        {
            return Err(ToDoValidationError::DescriptionTooLong);
        }
        Ok(())
    }

    pub fn complete(&mut self) {
        self.is_done = true;
    }

    pub fn reopen(&mut self) {
        self.is_done = false;
    }

    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

#[cfg(test)]
mod tests {
    use super::{ToDo, ToDoValidationError};

    #[test]
    fn validate_requires_owner_and_title() {
        let todo = ToDo::new(0, "write report");
        assert_eq!(todo.validate(), Err(ToDoValidationError::MissingOwner(0)));

        let todo = ToDo::new(7, "   ");
        assert_eq!(todo.validate(), Err(ToDoValidationError::BlankTitle));

        let todo = ToDo::new(7, "x".repeat(201));
        assert_eq!(todo.validate(), Err(ToDoValidationError::TitleTooLong));

        let todo = ToDo::new(7, "write report");
        assert!(todo.validate().is_ok());
    }

    #[test]
    fn complete_and_reopen_toggle_done_flag() {
        let mut todo = ToDo::new(1, "ship");
        todo.complete();
        assert!(todo.is_done);
        todo.reopen();
        assert!(!todo.is_done);
    }
}
