//! Typed query model translated to parameterized SQLite statements.
//!
//! # Invariants
//! - Column names are checked against the entity mapping before any SQL is
//!   built; values are always bound, never interpolated.
//! - Soft-deleted rows are excluded unless `include_deleted` is set.
//! - Results without explicit ordering are sorted by key ascending.

use super::entity::{Entity, EntityMapping, NavigationLoader, SOFT_DELETE_COLUMN};
use super::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Row predicate over mapped columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    Like {
        column: String,
        pattern: String,
    },
    IsNull(String),
    IsNotNull(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Equality; comparing against `Value::Null` becomes `IS NULL`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn ne(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ne, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn le(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Le, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn ge(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ge, value)
    }

    /// SQL `LIKE` with `%` and `_` wildcards.
    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Like {
            column: column.into(),
            pattern: pattern.into(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull(column.into())
    }

    pub fn is_not_null(column: impl Into<String>) -> Self {
        Self::IsNotNull(column.into())
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }

    pub(crate) fn to_sql(
        &self,
        mapping: &EntityMapping,
        binds: &mut Vec<Value>,
    ) -> RepoResult<String> {
        match self {
            Self::Compare { column, op, value } => {
                mapping.check_column(column)?;
                if matches!(value, Value::Null) {
                    return match op {
                        CompareOp::Eq => Ok(format!("{column} IS NULL")),
                        CompareOp::Ne => Ok(format!("{column} IS NOT NULL")),
                        _ => Err(RepoError::InvalidQuery(format!(
                            "cannot compare `{column}` against NULL with `{}`",
                            op.as_sql()
                        ))),
                    };
                }
                binds.push(value.clone());
                Ok(format!("{column} {} ?", op.as_sql()))
            }
            Self::Like { column, pattern } => {
                mapping.check_column(column)?;
                binds.push(Value::Text(pattern.clone()));
                Ok(format!("{column} LIKE ?"))
            }
            Self::IsNull(column) => {
                mapping.check_column(column)?;
                Ok(format!("{column} IS NULL"))
            }
            Self::IsNotNull(column) => {
                mapping.check_column(column)?;
                Ok(format!("{column} IS NOT NULL"))
            }
            Self::And(filters) => join_filters(filters, " AND ", "1 = 1", mapping, binds),
            Self::Or(filters) => join_filters(filters, " OR ", "1 = 0", mapping, binds),
            Self::Not(filter) => Ok(format!("NOT ({})", filter.to_sql(mapping, binds)?)),
        }
    }
}

fn join_filters(
    filters: &[Filter],
    separator: &str,
    empty: &str,
    mapping: &EntityMapping,
    binds: &mut Vec<Value>,
) -> RepoResult<String> {
    if filters.is_empty() {
        return Ok(empty.to_string());
    }
    let parts = filters
        .iter()
        .map(|filter| filter.to_sql(mapping, binds).map(|sql| format!("({sql})")))
        .collect::<RepoResult<Vec<_>>>()?;
    Ok(parts.join(separator))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

/// Filter, eager-load and ordering options for list queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Filter>,
    pub order_by: Vec<OrderBy>,
    /// Navigation names passed to `Entity::load_navigation`.
    pub includes: Vec<String>,
    pub include_deleted: bool,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a predicate; repeated calls are combined with `AND`.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(Filter::And(mut existing)) => {
                existing.push(filter);
                Filter::And(existing)
            }
            Some(existing) => Filter::And(vec![existing, filter]),
            None => filter,
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn include(mut self, navigation: impl Into<String>) -> Self {
        let navigation = navigation.into();
        if !self.includes.contains(&navigation) {
            self.includes.push(navigation);
        }
        self
    }

    pub fn include_all(self, navigations: &[&str]) -> Self {
        navigations
            .iter()
            .fold(self, |query, navigation| query.include(*navigation))
    }

    pub fn with_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    fn push_conditions(
        &self,
        mapping: &EntityMapping,
        sql: &mut String,
        binds: &mut Vec<Value>,
    ) -> RepoResult<()> {
        if !self.include_deleted {
            sql.push_str(&format!(" AND {SOFT_DELETE_COLUMN} = 0"));
        }
        if let Some(filter) = &self.filter {
            let condition = filter.to_sql(mapping, binds)?;
            sql.push_str(&format!(" AND ({condition})"));
        }
        Ok(())
    }

    pub(crate) fn to_select_sql(
        &self,
        mapping: &EntityMapping,
        binds: &mut Vec<Value>,
    ) -> RepoResult<String> {
        let mut sql = format!(
            "SELECT {} FROM {} WHERE 1 = 1",
            mapping.select_list(),
            mapping.table
        );
        self.push_conditions(mapping, &mut sql, binds)?;

        if self.order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {} ASC", mapping.key));
        } else {
            let mut terms = Vec::with_capacity(self.order_by.len());
            for order in &self.order_by {
                mapping.check_column(&order.column)?;
                let direction = match order.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                terms.push(format!("{} {direction}", order.column));
            }
            sql.push_str(&format!(" ORDER BY {}", terms.join(", ")));
        }

        if let Some(limit) = self.limit {
            sql.push_str(" LIMIT ?");
            binds.push(Value::Integer(i64::from(limit)));
            if self.offset > 0 {
                sql.push_str(" OFFSET ?");
                binds.push(Value::Integer(i64::from(self.offset)));
            }
        } else if self.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            binds.push(Value::Integer(i64::from(self.offset)));
        }

        Ok(sql)
    }

    fn to_count_sql(&self, mapping: &EntityMapping, binds: &mut Vec<Value>) -> RepoResult<String> {
        let mut sql = format!("SELECT COUNT(*) FROM {} WHERE 1 = 1", mapping.table);
        self.push_conditions(mapping, &mut sql, binds)?;
        Ok(sql)
    }
}

/// Runs a select and applies the query's includes to every result.
pub(crate) fn select_entities<E: Entity>(conn: &Connection, query: &Query) -> RepoResult<Vec<E>> {
    let mapping = EntityMapping::of::<E>();
    let mut binds = Vec::new();
    let sql = query.to_select_sql(&mapping, &mut binds)?;

    let mut entities = Vec::new();
    {
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        while let Some(row) = rows.next()? {
            entities.push(E::from_row(row)?);
        }
    }

    if !query.includes.is_empty() {
        let loader = NavigationLoader::new(conn);
        for entity in &mut entities {
            for navigation in &query.includes {
                entity.load_navigation(navigation, &loader)?;
            }
        }
    }

    Ok(entities)
}

pub(crate) fn count_rows(
    conn: &Connection,
    mapping: &EntityMapping,
    query: &Query,
) -> RepoResult<u64> {
    let mut binds = Vec::new();
    let sql = query.to_count_sql(mapping, &mut binds)?;
    let count = conn.query_row(&sql, params_from_iter(binds), |row| row.get::<_, i64>(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
}
