//! Entity mapping contract between domain types and SQLite tables.
//!
//! # Invariants
//! - Every table has an integer `id` primary key and an `is_deleted` column.
//! - `Entity::COLUMNS` lists non-key columns in the order `to_values` yields.

use super::query::{select_entities, Query};
use super::{RepoError, RepoResult};
use crate::model::EntityId;
use rusqlite::types::Value;
use rusqlite::{Connection, Row};

pub const KEY_COLUMN: &str = "id";
pub const SOFT_DELETE_COLUMN: &str = "is_deleted";

/// Table-level description of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityMapping {
    pub table: &'static str,
    pub key: &'static str,
    pub columns: &'static [&'static str],
}

impl EntityMapping {
    pub const fn of<E: Entity>() -> Self {
        Self {
            table: E::TABLE,
            key: KEY_COLUMN,
            columns: E::COLUMNS,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        column == self.key || self.columns.contains(&column)
    }

    /// Position of a non-key column within `Entity::to_values`.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|candidate| *candidate == column)
    }

    pub(crate) fn check_column(&self, column: &str) -> RepoResult<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(RepoError::InvalidQuery(format!(
                "unknown column `{column}` for `{}`",
                self.table
            )))
        }
    }

    pub(crate) fn select_list(&self) -> String {
        std::iter::once(self.key)
            .chain(self.columns.iter().copied())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Persistence mapping for a domain entity.
///
/// Implementations live in `repo::mappings`; the domain types stay free of
/// SQL concerns.
pub trait Entity: Clone + Send + Sync + 'static {
    const TABLE: &'static str;
    /// Non-key columns, in `to_values` order.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> EntityId;
    fn set_id(&mut self, id: EntityId);
    fn to_values(&self) -> Vec<Value>;
    fn from_row(row: &Row<'_>) -> RepoResult<Self>;

    /// Navigations loaded whenever the entity is fetched as aggregate root.
    fn root_measures() -> &'static [&'static str] {
        &[]
    }

    /// Populates one navigation property.
    fn load_navigation(
        &mut self,
        navigation: &str,
        loader: &NavigationLoader<'_>,
    ) -> RepoResult<()> {
        let _ = loader;
        Err(RepoError::UnknownNavigation {
            entity: Self::TABLE,
            navigation: navigation.to_string(),
        })
    }

    fn is_transient(&self) -> bool {
        self.id() == crate::model::TRANSIENT_ID
    }
}

/// Read access handed to `Entity::load_navigation`.
pub struct NavigationLoader<'conn> {
    conn: &'conn Connection,
}

impl<'conn> NavigationLoader<'conn> {
    pub(crate) fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn load<T: Entity>(&self, query: &Query) -> RepoResult<Vec<T>> {
        select_entities(self.conn, query)
    }

    pub fn load_one<T: Entity>(&self, query: &Query) -> RepoResult<Option<T>> {
        let query = query.clone().limit(1);
        Ok(select_entities(self.conn, &query)?.into_iter().next())
    }
}

pub(crate) fn bool_column(row: &Row<'_>, table: &str, column: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid {column} value `{other}` in {table}.{column}"
        ))),
    }
}

pub(crate) fn bool_value(value: bool) -> Value {
    Value::Integer(if value { 1 } else { 0 })
}

pub(crate) fn optional_text(value: &Option<String>) -> Value {
    match value {
        Some(text) => Value::Text(text.clone()),
        None => Value::Null,
    }
}

pub(crate) fn optional_integer(value: Option<i64>) -> Value {
    match value {
        Some(number) => Value::Integer(number),
        None => Value::Null,
    }
}
