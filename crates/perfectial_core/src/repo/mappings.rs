//! Entity-to-table mappings for every persisted domain type.
//!
//! `ENTITY_MAPPINGS` is the complete registry checked against the schema
//! when a database is opened; adding an entity means adding an `Entity` impl
//! here and listing it below.

use super::entity::{
    bool_column, bool_value, optional_integer, optional_text, Entity, EntityMapping,
    NavigationLoader,
};
use super::query::{Filter, Query, SortDirection};
use super::RepoResult;
use crate::model::audit::AuditEntry;
use crate::model::todo::ToDo;
use crate::model::user::User;
use crate::model::EntityId;
use rusqlite::types::Value;
use rusqlite::Row;

pub const ENTITY_MAPPINGS: &[EntityMapping] = &[
    EntityMapping::of::<User>(),
    EntityMapping::of::<ToDo>(),
    EntityMapping::of::<AuditEntry>(),
];

pub const USER_TODOS: &str = "todos";
pub const TODO_OWNER: &str = "owner";

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "user_name",
        "email",
        "display_name",
        "credit_score",
        "is_admin",
        "is_deleted",
    ];

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.user_name.clone()),
            Value::Text(self.email.clone()),
            optional_text(&self.display_name),
            Value::Integer(i64::from(self.credit_score)),
            bool_value(self.is_admin),
            bool_value(self.is_deleted),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_name: row.get("user_name")?,
            email: row.get("email")?,
            display_name: row.get("display_name")?,
            credit_score: row.get("credit_score")?,
            is_admin: bool_column(row, Self::TABLE, "is_admin")?,
            is_deleted: bool_column(row, Self::TABLE, "is_deleted")?,
            todos: Vec::new(),
        })
    }

    fn root_measures() -> &'static [&'static str] {
        &[USER_TODOS]
    }

    fn load_navigation(
        &mut self,
        navigation: &str,
        loader: &NavigationLoader<'_>,
    ) -> RepoResult<()> {
        match navigation {
            USER_TODOS => {
                self.todos = loader.load::<ToDo>(
                    &Query::new()
                        .filter(Filter::eq("user_id", self.id))
                        .order_by("id", SortDirection::Asc),
                )?;
                Ok(())
            }
            other => Err(super::RepoError::UnknownNavigation {
                entity: Self::TABLE,
                navigation: other.to_string(),
            }),
        }
    }
}

impl Entity for ToDo {
    const TABLE: &'static str = "todos";
    const COLUMNS: &'static [&'static str] = &[
        "user_id",
        "title",
        "description",
        "is_done",
        "due_at",
        "created_at",
        "is_deleted",
    ];

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.user_id),
            Value::Text(self.title.clone()),
            optional_text(&self.description),
            bool_value(self.is_done),
            optional_integer(self.due_at),
            Value::Integer(self.created_at),
            bool_value(self.is_deleted),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            is_done: bool_column(row, Self::TABLE, "is_done")?,
            due_at: row.get("due_at")?,
            created_at: row.get("created_at")?,
            is_deleted: bool_column(row, Self::TABLE, "is_deleted")?,
            owner: None,
        })
    }

    fn load_navigation(
        &mut self,
        navigation: &str,
        loader: &NavigationLoader<'_>,
    ) -> RepoResult<()> {
        match navigation {
            TODO_OWNER => {
                // Owners stay visible to their to-dos after soft deletion.
                self.owner = loader
                    .load_one::<User>(
                        &Query::new()
                            .filter(Filter::eq("id", self.user_id))
                            .with_deleted(),
                    )?
                    .map(Box::new);
                Ok(())
            }
            other => Err(super::RepoError::UnknownNavigation {
                entity: Self::TABLE,
                navigation: other.to_string(),
            }),
        }
    }
}

impl Entity for AuditEntry {
    const TABLE: &'static str = "audit_entries";
    const COLUMNS: &'static [&'static str] = &[
        "action",
        "entity",
        "entity_id",
        "details",
        "recorded_at",
        "is_deleted",
    ];

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.action.clone()),
            Value::Text(self.entity.clone()),
            Value::Integer(self.entity_id),
            optional_text(&self.details),
            Value::Integer(self.recorded_at),
            bool_value(self.is_deleted),
        ]
    }

    fn from_row(row: &Row<'_>) -> RepoResult<Self> {
        Ok(Self {
            id: row.get("id")?,
            action: row.get("action")?,
            entity: row.get("entity")?,
            entity_id: row.get("entity_id")?,
            details: row.get("details")?,
            recorded_at: row.get("recorded_at")?,
            is_deleted: bool_column(row, Self::TABLE, "is_deleted")?,
        })
    }
}
