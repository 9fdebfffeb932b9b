//! User aggregate root.
//!
//! # Responsibility
//! - Define the account record managed by administrators.
//! - Own the user's to-do items as a sub-graph loaded with the aggregate.
//!
//! # Invariants
//! - `user_name` and `email` are unique across all users, deleted included.
//! - `credit_score` stays within `MIN_CREDIT_SCORE..=MAX_CREDIT_SCORE`.
//! - `is_deleted` is the source of truth for tombstone state.

use super::todo::ToDo;
use super::{EntityId, TRANSIENT_ID};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MIN_CREDIT_SCORE: i32 = 0;
pub const MAX_CREDIT_SCORE: i32 = 1000;
pub const DEFAULT_CREDIT_SCORE: i32 = 500;

const USER_NAME_MIN_CHARS: usize = 3;
const USER_NAME_MAX_CHARS: usize = 64;
const DISPLAY_NAME_MAX_CHARS: usize = 128;

static USER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("valid user name regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex")
});

/// Validation failures for [`User`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserValidationError {
    #[error("user name must be 3..=64 characters, got {0}")]
    UserNameLength(usize),
    #[error("user name `{0}` may only contain letters, digits, `_`, `.` and `-`")]
    UserNameCharacters(String),
    #[error("email `{0}` is not a valid address")]
    InvalidEmail(String),
    #[error("display name exceeds 128 characters")]
    DisplayNameTooLong,
    #[error("credit score {0} is outside 0..=1000")]
    CreditScoreOutOfRange(i32),
}

/// Account record and aggregate root for a user's to-do items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    /// Login name, unique.
    pub user_name: String,
    /// Contact address, unique.
    pub email: String,
    pub display_name: Option<String>,
    /// Administrator-managed score.
    pub credit_score: i32,
    pub is_admin: bool,
    pub is_deleted: bool,
    /// Loaded with the aggregate; never persisted through the users table.
    #[serde(default)]
    pub todos: Vec<ToDo>,
}

impl User {
    /// Creates a transient user with default credit score.
    pub fn new(user_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: TRANSIENT_ID,
            user_name: user_name.into(),
            email: email.into(),
            display_name: None,
            credit_score: DEFAULT_CREDIT_SCORE,
            is_admin: false,
            is_deleted: false,
            todos: Vec::new(),
        }
    }

    /// Checks field-level invariants before the user is staged for saving.
    ///
    /// Reports the first violated rule.
    pub fn validate(&self) -> Result<(), UserValidationError> {
        let name_len = self.user_name.chars().count();
        if !(USER_NAME_MIN_CHARS..=USER_NAME_MAX_CHARS).contains(&name_len) {
            return Err(UserValidationError::UserNameLength(name_len));
        }
        if !USER_NAME_RE.is_match(&self.user_name) {
            return Err(UserValidationError::UserNameCharacters(
                self.user_name.clone(),
            ));
        }
        if !EMAIL_RE.is_match(&self.email) {
            return Err(UserValidationError::InvalidEmail(self.email.clone()));
        }
        if self
            .display_name
            .as_ref()
            .is_some_and(|name| name.chars().count() > DISPLAY_NAME_MAX_CHARS)
        {
            return Err(UserValidationError::DisplayNameTooLong);
        }
        if !(MIN_CREDIT_SCORE..=MAX_CREDIT_SCORE).contains(&self.credit_score) {
            return Err(UserValidationError::CreditScoreOutOfRange(
                self.credit_score,
            ));
        }
        Ok(())
    }

    /// Marks the user and every owned to-do as softly deleted.
    pub fn soft_delete(&mut self) {
        self.is_deleted = true;
        for todo in &mut self.todos {
            todo.soft_delete();
        }
    }

    pub fn restore(&mut self) {
        self.is_deleted = false;
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }

    /// Returns owned to-dos that are neither deleted nor done.
    pub fn open_todos(&self) -> impl Iterator<Item = &ToDo> {
        self.todos
            .iter()
            .filter(|todo| todo.is_active() && !todo.is_done)
    }
}

#[cfg(test)]
mod tests {
    use super::{User, UserValidationError, DEFAULT_CREDIT_SCORE};

    #[test]
    fn new_user_is_transient_and_valid() {
        let user = User::new("ada", "ada@example.com");
        assert_eq!(user.id, 0);
        assert_eq!(user.credit_score, DEFAULT_CREDIT_SCORE);
        assert!(user.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let mut user = User::new("ab", "ab@example.com");
        assert_eq!(
            user.validate(),
            Err(UserValidationError::UserNameLength(2))
        );

        user.user_name = "has space".to_string();
        assert!(matches!(
            user.validate(),
            Err(UserValidationError::UserNameCharacters(_))
        ));

        user.user_name = "grace".to_string();
        user.email = "not-an-email".to_string();
        assert!(matches!(
            user.validate(),
            Err(UserValidationError::InvalidEmail(_))
        ));

        user.email = "grace@example.com".to_string();
        user.credit_score = 1001;
        assert_eq!(
            user.validate(),
            Err(UserValidationError::CreditScoreOutOfRange(1001))
        );
    }
}
