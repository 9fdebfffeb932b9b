//! User use-case service.
//!
//! # Responsibility
//! - Register, load, list, edit and soft-delete users.
//! - Apply administrative credit-score changes and audit them.
//!
//! # Invariants
//! - Every operation runs inside a scope; nested calls join the caller's.
//! - Validation failures and missing users are outcomes, never errors.
//! - User name and email stay unique, soft-deleted users included.

use super::audit_service::AuditService;
use super::outcome::ServiceOutcome;
use crate::dto::UserDto;
use crate::model::todo::ToDo;
use crate::model::user::{User, MAX_CREDIT_SCORE, MIN_CREDIT_SCORE};
use crate::model::{EntityId, TRANSIENT_ID};
use crate::repo::{Filter, Query, RepoResult, Repository, RepositoryRegistry, SortDirection};
use crate::scope::{ensure_call_chain, DbContextScopeFactory, ScopeOption};
use log::{info, warn};
use std::sync::Arc;

pub const ACTION_CREDIT_SCORE_CHANGED: &str = "credit_score_changed";
pub const ACTION_USER_DELETED: &str = "user_deleted";

#[derive(Clone)]
pub struct UserService {
    scopes: DbContextScopeFactory,
    users: Arc<Repository<User>>,
    todos: Arc<Repository<ToDo>>,
    audit: AuditService,
}

impl UserService {
    pub fn new(
        scopes: DbContextScopeFactory,
        registry: &RepositoryRegistry,
        audit: AuditService,
    ) -> RepoResult<Self> {
        Ok(Self {
            scopes,
            users: registry.repository::<User>()?,
            todos: registry.repository::<ToDo>()?,
            audit,
        })
    }

    /// Registers a new user.
    ///
    /// The returned DTO carries the new key when this call owns its scope;
    /// inside a caller's scope the key is assigned when that scope saves.
    pub async fn register_user(&self, dto: UserDto) -> RepoResult<ServiceOutcome<UserDto>> {
        ensure_call_chain(self.register_in_scope(dto)).await
    }

    /// Loads an active user with their to-dos.
    pub async fn get_user(&self, id: EntityId) -> RepoResult<ServiceOutcome<UserDto>> {
        ensure_call_chain(self.get_in_scope(id)).await
    }

    /// Active users whose name or email contains `search`, ordered by name.
    pub async fn list_users(&self, search: Option<&str>) -> RepoResult<Vec<UserDto>> {
        let mut query = Query::new().order_by("user_name", SortDirection::Asc);
        if let Some(term) = search.map(str::trim).filter(|term| !term.is_empty()) {
            let pattern = format!("%{term}%");
            query = query.filter(Filter::or([
                Filter::like("user_name", pattern.clone()),
                Filter::like("email", pattern),
            ]));
        }
        ensure_call_chain(self.list_in_scope(query)).await
    }

    /// Saves edited profile fields and returns rows written.
    pub async fn save_user(&self, dto: UserDto) -> RepoResult<ServiceOutcome<usize>> {
        ensure_call_chain(self.save_in_scope(dto)).await
    }

    /// Soft-deletes a user together with their to-dos.
    pub async fn delete_user(&self, id: EntityId) -> RepoResult<ServiceOutcome<usize>> {
        ensure_call_chain(self.delete_in_scope(id)).await
    }

    /// Sets a user's credit score and records the change in the audit trail.
    pub async fn set_credit_score(
        &self,
        id: EntityId,
        credit_score: i32,
    ) -> RepoResult<ServiceOutcome<UserDto>> {
        if !(MIN_CREDIT_SCORE..=MAX_CREDIT_SCORE).contains(&credit_score) {
            warn!(
                "event=user_credit_score module=service status=invalid user_id={id} credit_score={credit_score}"
            );
            return Ok(ServiceOutcome::ValidationFailed(format!(
                "credit score {credit_score} is outside {MIN_CREDIT_SCORE}..={MAX_CREDIT_SCORE}"
            )));
        }
        ensure_call_chain(self.set_credit_score_in_scope(id, credit_score)).await
    }

    async fn register_in_scope(&self, dto: UserDto) -> RepoResult<ServiceOutcome<UserDto>> {
        let mut user = dto.to_new_user();
        if let Err(err) = user.validate() {
            warn!(
                "event=user_register module=service status=invalid user_name={} reason={err}",
                user.user_name
            );
            return Ok(ServiceOutcome::ValidationFailed(err.to_string()));
        }

        let scope = self.scopes.create(ScopeOption::JoinExisting)?;
        if let Some(reason) = self.identity_conflict(&user).await? {
            warn!(
                "event=user_register module=service status=conflict user_name={} reason={reason}",
                user.user_name
            );
            return Ok(ServiceOutcome::ValidationFailed(reason));
        }

        let staged = self.users.add(&user)?;
        let rows = scope.save_changes().await?;
        user.id = scope.generated_key(staged).unwrap_or(TRANSIENT_ID);
        info!(
            "event=user_register module=service status=ok user_id={} rows={rows} joined={}",
            user.id,
            scope.is_joined()
        );
        Ok(ServiceOutcome::Success(UserDto::from(&user)))
    }

    async fn identity_conflict(&self, user: &User) -> RepoResult<Option<String>> {
        let mut filters = vec![
            Filter::eq("user_name", user.user_name.clone()),
            Filter::eq("email", user.email.clone()),
        ];
        if user.id != TRANSIENT_ID {
            filters = vec![Filter::and([
                Filter::or(filters),
                Filter::ne("id", user.id),
            ])];
        }
        let existing = self
            .users
            .first_or_default(Query::new().filter(Filter::or(filters)).with_deleted())
            .await?;
        Ok(existing.map(|existing| {
            if existing.user_name == user.user_name {
                format!("user name `{}` is already taken", user.user_name)
            } else {
                format!("email `{}` is already registered", user.email)
            }
        }))
    }

    async fn get_in_scope(&self, id: EntityId) -> RepoResult<ServiceOutcome<UserDto>> {
        let _scope = self.scopes.create_read_only(ScopeOption::JoinExisting)?;
        match self.users.get_by_id(id).await? {
            Some(user) => Ok(ServiceOutcome::Success(UserDto::from(&user))),
            None => {
                warn!("event=user_get module=service status=not_found user_id={id}");
                Ok(ServiceOutcome::NotFound(id))
            }
        }
    }

    async fn list_in_scope(&self, query: Query) -> RepoResult<Vec<UserDto>> {
        let _scope = self.scopes.create_read_only(ScopeOption::JoinExisting)?;
        let users = self.users.get_list(query).await?;
        Ok(users.iter().map(UserDto::from).collect())
    }

    async fn save_in_scope(&self, dto: UserDto) -> RepoResult<ServiceOutcome<usize>> {
        let scope = self.scopes.create(ScopeOption::JoinExisting)?;
        let Some(mut user) = self.users.get_by_id(dto.id).await? else {
            warn!(
                "event=user_save module=service status=not_found user_id={}",
                dto.id
            );
            return Ok(ServiceOutcome::NotFound(dto.id));
        };

        dto.apply_to(&mut user);
        if let Err(err) = user.validate() {
            warn!(
                "event=user_save module=service status=invalid user_id={} reason={err}",
                user.id
            );
            return Ok(ServiceOutcome::ValidationFailed(err.to_string()));
        }
        if let Some(reason) = self.identity_conflict(&user).await? {
            warn!(
                "event=user_save module=service status=conflict user_id={} reason={reason}",
                user.id
            );
            return Ok(ServiceOutcome::ValidationFailed(reason));
        }

        self.users.update(&user)?;
        let rows = scope.save_changes().await?;
        info!(
            "event=user_save module=service status=ok user_id={} rows={rows}",
            user.id
        );
        Ok(ServiceOutcome::Success(rows))
    }

    async fn delete_in_scope(&self, id: EntityId) -> RepoResult<ServiceOutcome<usize>> {
        let scope = self.scopes.create(ScopeOption::JoinExisting)?;
        let Some(mut user) = self.users.get_by_id(id).await? else {
            warn!("event=user_delete module=service status=not_found user_id={id}");
            return Ok(ServiceOutcome::NotFound(id));
        };

        let open_todos = user.todos.iter().filter(|todo| todo.is_active()).count();
        user.soft_delete();
        self.users.update(&user)?;
        self.todos.update_range(&user.todos)?;
        let rows = scope.save_changes().await?;

        self.audit
            .record(
                ACTION_USER_DELETED,
                "users",
                id,
                Some(format!("todos={open_todos}")),
            )
            .await?;
        info!("event=user_delete module=service status=ok user_id={id} rows={rows}");
        Ok(ServiceOutcome::Success(rows))
    }

    async fn set_credit_score_in_scope(
        &self,
        id: EntityId,
        credit_score: i32,
    ) -> RepoResult<ServiceOutcome<UserDto>> {
        let scope = self.scopes.create(ScopeOption::JoinExisting)?;
        let Some(mut user) = self.users.get_by_id(id).await? else {
            warn!("event=user_credit_score module=service status=not_found user_id={id}");
            return Ok(ServiceOutcome::NotFound(id));
        };

        let previous = user.credit_score;
        user.credit_score = credit_score;
        self.users.update(&user)?;
        scope.save_changes().await?;

        self.audit
            .record(
                ACTION_CREDIT_SCORE_CHANGED,
                "users",
                id,
                Some(format!("{previous} -> {credit_score}")),
            )
            .await?;
        info!(
            "event=user_credit_score module=service status=ok user_id={id} previous={previous} credit_score={credit_score}"
        );
        Ok(ServiceOutcome::Success(UserDto::from(&user)))
    }
}
