//! User and administration endpoints.

use super::{action_response, data_response, ActionResponse, DataResponse};
use crate::dto::{AuditEntryDto, UserDto};
use crate::model::user::DEFAULT_CREDIT_SCORE;
use crate::model::{EntityId, TRANSIENT_ID};
use crate::service::{AuditService, ServiceOutcome, UserService};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterUserRequest {
    pub user_name: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateUserRequest {
    pub id: EntityId,
    pub user_name: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SetCreditScoreRequest {
    pub id: EntityId,
    pub credit_score: i32,
}

#[derive(Clone)]
pub struct UserController {
    users: UserService,
    audit: AuditService,
}

impl UserController {
    pub fn new(users: UserService, audit: AuditService) -> Self {
        Self { users, audit }
    }

    pub async fn register(&self, request: RegisterUserRequest) -> ActionResponse {
        let dto = UserDto {
            id: TRANSIENT_ID,
            user_name: request.user_name,
            email: request.email,
            display_name: request.display_name,
            credit_score: DEFAULT_CREDIT_SCORE,
            is_admin: false,
            todos: Vec::new(),
        };
        action_response(
            "user_register",
            self.users.register_user(dto).await,
            |user| ActionResponse::success("User registered.", Some(user.id)),
        )
    }

    pub async fn get(&self, id: EntityId) -> DataResponse<UserDto> {
        data_response("user_get", self.users.get_user(id).await)
    }

    pub async fn list(&self, search: Option<String>) -> DataResponse<Vec<UserDto>> {
        let result = self
            .users
            .list_users(search.as_deref())
            .await
            .map(ServiceOutcome::Success);
        data_response("user_list", result)
    }

    pub async fn update(&self, request: UpdateUserRequest) -> ActionResponse {
        let mut dto = UserDto::new(request.user_name, request.email);
        dto.id = request.id;
        dto.display_name = request.display_name;
        action_response("user_update", self.users.save_user(dto).await, |rows| {
            ActionResponse::success(format!("User saved ({rows} row(s))."), Some(request.id))
        })
    }

    pub async fn delete(&self, id: EntityId) -> ActionResponse {
        action_response("user_delete", self.users.delete_user(id).await, |_| {
            ActionResponse::success("User deleted.", Some(id))
        })
    }

    pub async fn set_credit_score(&self, request: SetCreditScoreRequest) -> ActionResponse {
        action_response(
            "user_credit_score",
            self.users
                .set_credit_score(request.id, request.credit_score)
                .await,
            |user| {
                ActionResponse::success(
                    format!("Credit score set to {}.", user.credit_score),
                    Some(user.id),
                )
            },
        )
    }

    pub async fn audit_trail(&self, id: EntityId) -> DataResponse<Vec<AuditEntryDto>> {
        let result = self
            .audit
            .list_for_entity("users", id)
            .await
            .map(ServiceOutcome::Success);
        data_response("user_audit", result)
    }
}
