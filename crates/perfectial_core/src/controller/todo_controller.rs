//! To-do endpoints.

use super::{action_response, data_response, ActionResponse, DataResponse};
use crate::dto::ToDoDto;
use crate::model::{EntityId, TRANSIENT_ID};
use crate::service::ToDoService;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateToDoRequest {
    pub user_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UpdateToDoRequest {
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default)]
    pub due_at: Option<i64>,
}

#[derive(Clone)]
pub struct ToDoController {
    todos: ToDoService,
}

impl ToDoController {
    pub fn new(todos: ToDoService) -> Self {
        Self { todos }
    }

    pub async fn create(&self, request: CreateToDoRequest) -> ActionResponse {
        let mut dto = ToDoDto::new(request.title);
        dto.description = request.description;
        dto.due_at = request.due_at;
        action_response(
            "todo_create",
            self.todos.create_todo(request.user_id, dto).await,
            |todo| ActionResponse::success("To-do created.", Some(todo.id)),
        )
    }

    pub async fn get(&self, id: EntityId) -> DataResponse<ToDoDto> {
        data_response("todo_get", self.todos.get_todo(id).await)
    }

    pub async fn list(&self, user_id: EntityId, include_done: bool) -> DataResponse<Vec<ToDoDto>> {
        data_response(
            "todo_list",
            self.todos.list_todos(user_id, include_done).await,
        )
    }

    pub async fn update(&self, request: UpdateToDoRequest) -> ActionResponse {
        let dto = ToDoDto {
            id: request.id,
            user_id: TRANSIENT_ID,
            title: request.title,
            description: request.description,
            is_done: request.is_done,
            due_at: request.due_at,
            created_at: 0,
        };
        action_response("todo_update", self.todos.update_todo(dto).await, |_| {
            ActionResponse::success("To-do saved.", Some(request.id))
        })
    }

    pub async fn complete(&self, id: EntityId) -> ActionResponse {
        action_response("todo_complete", self.todos.complete_todo(id).await, |_| {
            ActionResponse::success("To-do completed.", Some(id))
        })
    }

    pub async fn delete(&self, id: EntityId) -> ActionResponse {
        action_response("todo_delete", self.todos.delete_todo(id).await, |_| {
            ActionResponse::success("To-do deleted.", Some(id))
        })
    }
}
