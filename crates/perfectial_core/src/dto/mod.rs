//! Flat data-transfer projections of domain entities.
//!
//! DTOs carry no navigation graphs; `UserDto::todos` is filled only by
//! calls that explicitly load the aggregate.

use crate::model::audit::AuditEntry;
use crate::model::todo::ToDo;
use crate::model::user::{User, DEFAULT_CREDIT_SCORE};
use crate::model::{EntityId, TRANSIENT_ID};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDto {
    #[serde(default)]
    pub id: EntityId,
    pub user_name: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_credit_score")]
    pub credit_score: i32,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub todos: Vec<ToDoDto>,
}

fn default_credit_score() -> i32 {
    DEFAULT_CREDIT_SCORE
}

impl UserDto {
    pub fn new(user_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: TRANSIENT_ID,
            user_name: user_name.into(),
            email: email.into(),
            display_name: None,
            credit_score: DEFAULT_CREDIT_SCORE,
            is_admin: false,
            todos: Vec::new(),
        }
    }

    /// Copies editable profile fields onto `user`.
    ///
    /// Credit score and admin flag are administrative and change only through
    /// `UserService::set_credit_score`.
    pub fn apply_to(&self, user: &mut User) {
        user.user_name = self.user_name.trim().to_string();
        user.email = self.email.trim().to_string();
        user.display_name = self
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
    }

    /// Builds a transient user from registration data.
    pub fn to_new_user(&self) -> User {
        let mut user = User::new(String::new(), String::new());
        self.apply_to(&mut user);
        user.credit_score = self.credit_score;
        user.is_admin = self.is_admin;
        user
    }
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            user_name: user.user_name.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            credit_score: user.credit_score,
            is_admin: user.is_admin,
            todos: user
                .todos
                .iter()
                .filter(|todo| todo.is_active())
                .map(ToDoDto::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToDoDto {
    #[serde(default)]
    pub id: EntityId,
    #[serde(default)]
    pub user_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default)]
    pub due_at: Option<i64>,
    #[serde(default)]
    pub created_at: i64,
}

impl ToDoDto {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: TRANSIENT_ID,
            user_id: TRANSIENT_ID,
            title: title.into(),
            description: None,
            is_done: false,
            due_at: None,
            created_at: 0,
        }
    }

    /// Copies editable fields onto `todo`; owner and creation time are kept.
    pub fn apply_to(&self, todo: &mut ToDo) {
        todo.title = self.title.trim().to_string();
        todo.description = self.description.clone();
        todo.is_done = self.is_done;
        todo.due_at = self.due_at;
    }
}

impl From<&ToDo> for ToDoDto {
    fn from(todo: &ToDo) -> Self {
        Self {
            id: todo.id,
            user_id: todo.user_id,
            title: todo.title.clone(),
            description: todo.description.clone(),
            is_done: todo.is_done,
            due_at: todo.due_at,
            created_at: todo.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntryDto {
    pub id: EntityId,
    pub action: String,
    pub entity: String,
    pub entity_id: EntityId,
    pub details: Option<String>,
    pub recorded_at: i64,
}

impl From<&AuditEntry> for AuditEntryDto {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            id: entry.id,
            action: entry.action.clone(),
            entity: entry.entity.clone(),
            entity_id: entry.entity_id,
            details: entry.details.clone(),
            recorded_at: entry.recorded_at,
        }
    }
}
