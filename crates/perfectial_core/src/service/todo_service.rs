//! To-do use-case service.
//!
//! # Invariants
//! - To-dos are only created for active users.
//! - Deletion is soft; deleted to-dos disappear from every read.

use super::outcome::ServiceOutcome;
use crate::dto::ToDoDto;
use crate::model::todo::ToDo;
use crate::model::user::User;
use crate::model::{EntityId, TRANSIENT_ID};
use crate::repo::{Filter, Query, RepoResult, Repository, RepositoryRegistry, SortDirection};
use crate::scope::{ensure_call_chain, DbContextScopeFactory, ScopeOption};
use log::{info, warn};
use std::sync::Arc;

#[derive(Clone)]
pub struct ToDoService {
    scopes: DbContextScopeFactory,
    users: Arc<Repository<User>>,
    todos: Arc<Repository<ToDo>>,
}

/// Edit applied to a loaded to-do before it is validated and staged.
enum ToDoChange {
    Edit(ToDoDto),
    Complete,
    Delete,
}

impl ToDoChange {
    fn event(&self) -> &'static str {
        match self {
            Self::Edit(_) => "todo_update",
            Self::Complete => "todo_complete",
            Self::Delete => "todo_delete",
        }
    }
}

impl ToDoService {
    pub fn new(scopes: DbContextScopeFactory, registry: &RepositoryRegistry) -> RepoResult<Self> {
        Ok(Self {
            scopes,
            users: registry.repository::<User>()?,
            todos: registry.repository::<ToDo>()?,
        })
    }

    /// Creates a to-do for `user_id`.
    pub async fn create_todo(
        &self,
        user_id: EntityId,
        dto: ToDoDto,
    ) -> RepoResult<ServiceOutcome<ToDoDto>> {
        ensure_call_chain(self.create_in_scope(user_id, dto)).await
    }

    pub async fn get_todo(&self, id: EntityId) -> RepoResult<ServiceOutcome<ToDoDto>> {
        ensure_call_chain(self.get_in_scope(id)).await
    }

    /// Lists a user's to-dos, optionally hiding completed ones.
    pub async fn list_todos(
        &self,
        user_id: EntityId,
        include_done: bool,
    ) -> RepoResult<ServiceOutcome<Vec<ToDoDto>>> {
        ensure_call_chain(self.list_in_scope(user_id, include_done)).await
    }

    /// Saves edited fields of an existing to-do and returns rows written.
    pub async fn update_todo(&self, dto: ToDoDto) -> RepoResult<ServiceOutcome<usize>> {
        let id = dto.id;
        ensure_call_chain(self.change_in_scope(id, ToDoChange::Edit(dto))).await
    }

    pub async fn complete_todo(&self, id: EntityId) -> RepoResult<ServiceOutcome<usize>> {
        ensure_call_chain(self.change_in_scope(id, ToDoChange::Complete)).await
    }

    /// Soft-deletes a to-do.
    pub async fn delete_todo(&self, id: EntityId) -> RepoResult<ServiceOutcome<usize>> {
        ensure_call_chain(self.change_in_scope(id, ToDoChange::Delete)).await
    }

    async fn create_in_scope(
        &self,
        user_id: EntityId,
        dto: ToDoDto,
    ) -> RepoResult<ServiceOutcome<ToDoDto>> {
        let mut todo = ToDo::new(user_id, String::new());
        dto.apply_to(&mut todo);
        if let Err(err) = todo.validate() {
            warn!("event=todo_create module=service status=invalid user_id={user_id} reason={err}");
            return Ok(ServiceOutcome::ValidationFailed(err.to_string()));
        }

        let scope = self.scopes.create(ScopeOption::JoinExisting)?;
        if !self.users.any(Filter::eq("id", user_id)).await? {
            warn!("event=todo_create module=service status=not_found user_id={user_id}");
            return Ok(ServiceOutcome::NotFound(user_id));
        }

        let staged = self.todos.add(&todo)?;
        let rows = scope.save_changes().await?;
        todo.id = scope.generated_key(staged).unwrap_or(TRANSIENT_ID);
        info!(
            "event=todo_create module=service status=ok user_id={user_id} todo_id={} rows={rows}",
            todo.id
        );
        Ok(ServiceOutcome::Success(ToDoDto::from(&todo)))
    }

    async fn get_in_scope(&self, id: EntityId) -> RepoResult<ServiceOutcome<ToDoDto>> {
        let _scope = self.scopes.create_read_only(ScopeOption::JoinExisting)?;
        match self.todos.get_by_id(id).await? {
            Some(todo) => Ok(ServiceOutcome::Success(ToDoDto::from(&todo))),
            None => {
                warn!("event=todo_get module=service status=not_found todo_id={id}");
                Ok(ServiceOutcome::NotFound(id))
            }
        }
    }

    async fn list_in_scope(
        &self,
        user_id: EntityId,
        include_done: bool,
    ) -> RepoResult<ServiceOutcome<Vec<ToDoDto>>> {
        let _scope = self.scopes.create_read_only(ScopeOption::JoinExisting)?;
        if !self.users.any(Filter::eq("id", user_id)).await? {
            warn!("event=todo_list module=service status=not_found user_id={user_id}");
            return Ok(ServiceOutcome::NotFound(user_id));
        }

        let mut query = Query::new()
            .filter(Filter::eq("user_id", user_id))
            .order_by("created_at", SortDirection::Asc)
            .order_by("id", SortDirection::Asc);
        if !include_done {
            query = query.filter(Filter::eq("is_done", false));
        }
        let todos = self.todos.get_list(query).await?;
        Ok(ServiceOutcome::Success(
            todos.iter().map(ToDoDto::from).collect(),
        ))
    }

    async fn change_in_scope(
        &self,
        id: EntityId,
        change: ToDoChange,
    ) -> RepoResult<ServiceOutcome<usize>> {
        let event = change.event();
        let scope = self.scopes.create(ScopeOption::JoinExisting)?;
        let Some(mut todo) = self.todos.get_by_id(id).await? else {
            warn!("event={event} module=service status=not_found todo_id={id}");
            return Ok(ServiceOutcome::NotFound(id));
        };

        match &change {
            ToDoChange::Edit(dto) => dto.apply_to(&mut todo),
            ToDoChange::Complete => todo.complete(),
            ToDoChange::Delete => todo.soft_delete(),
        }
        if let Err(err) = todo.validate() {
            warn!("event={event} module=service status=invalid todo_id={id} reason={err}");
            return Ok(ServiceOutcome::ValidationFailed(err.to_string()));
        }

        self.todos.update(&todo)?;
        let rows = scope.save_changes().await?;
        info!("event={event} module=service status=ok todo_id={id} rows={rows}");
        Ok(ServiceOutcome::Success(rows))
    }
}
