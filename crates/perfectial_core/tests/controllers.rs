use perfectial_core::controller::{
    CreateToDoRequest, RegisterUserRequest, SetCreditScoreRequest, ToDoController,
    UpdateToDoRequest, UpdateUserRequest, UserController,
};
use perfectial_core::db::Database;
use perfectial_core::service::Services;

fn controllers() -> (tempfile::TempDir, UserController, ToDoController) {
    let dir = tempfile::tempdir().unwrap();
    let database = Database::open(dir.path().join("controllers.sqlite3")).unwrap();
    let services = Services::new(database).unwrap();
    (
        dir,
        UserController::new(services.users.clone(), services.audit.clone()),
        ToDoController::new(services.todos.clone()),
    )
}

fn register_request(name: &str) -> RegisterUserRequest {
    RegisterUserRequest {
        user_name: name.to_string(),
        email: format!("{name}@example.com"),
        display_name: None,
    }
}

#[tokio::test]
async fn user_flow_returns_envelopes() {
    let (_dir, users, _todos) = controllers();

    let registered = users.register(register_request("ada")).await;
    assert!(registered.ok, "{}", registered.message);
    let id = registered.id.unwrap();

    let updated = users
        .update(UpdateUserRequest {
            id,
            user_name: "ada".to_string(),
            email: "ada@example.com".to_string(),
            display_name: Some("Ada".to_string()),
        })
        .await;
    assert!(updated.ok, "{}", updated.message);

    let scored = users
        .set_credit_score(SetCreditScoreRequest {
            id,
            credit_score: 640,
        })
        .await;
    assert!(scored.ok, "{}", scored.message);
    assert!(scored.message.contains("640"));

    let fetched = users.get(id).await;
    assert!(fetched.ok);
    assert_eq!(fetched.data.unwrap().display_name.as_deref(), Some("Ada"));

    let trail = users.audit_trail(id).await;
    assert_eq!(trail.data.unwrap().len(), 1);

    let listed = users.list(Some("ad".to_string())).await;
    assert_eq!(listed.data.unwrap().len(), 1);
}

#[tokio::test]
async fn failures_become_unsuccessful_envelopes() {
    let (_dir, users, todos) = controllers();

    let missing = users.get(42).await;
    assert!(!missing.ok);
    assert!(missing.data.is_none());
    assert!(missing.message.contains("not found"));

    let invalid = users.register(register_request("a")).await;
    assert!(!invalid.ok);
    assert!(invalid.id.is_none());

    let score = users
        .set_credit_score(SetCreditScoreRequest {
            id: 1,
            credit_score: -5,
        })
        .await;
    assert!(!score.ok);

    let orphan = todos
        .create(CreateToDoRequest {
            user_id: 9,
            title: "nobody's".to_string(),
            description: None,
            due_at: None,
        })
        .await;
    assert!(!orphan.ok);
}

#[tokio::test]
async fn todo_flow_returns_envelopes() {
    let (_dir, users, todos) = controllers();
    let user_id = users.register(register_request("ada")).await.id.unwrap();

    let created = todos
        .create(CreateToDoRequest {
            user_id,
            title: "write docs".to_string(),
            description: Some("api".to_string()),
            due_at: None,
        })
        .await;
    assert!(created.ok, "{}", created.message);
    let todo_id = created.id.unwrap();

    let updated = todos
        .update(UpdateToDoRequest {
            id: todo_id,
            title: "write more docs".to_string(),
            description: None,
            is_done: false,
            due_at: Some(1),
        })
        .await;
    assert!(updated.ok, "{}", updated.message);

    assert!(todos.complete(todo_id).await.ok);
    assert!(todos.list(user_id, false).await.data.unwrap().is_empty());
    assert_eq!(todos.list(user_id, true).await.data.unwrap().len(), 1);

    assert!(todos.delete(todo_id).await.ok);
    assert!(!todos.get(todo_id).await.ok);
}

#[tokio::test]
async fn envelopes_serialize_to_json() {
    let (_dir, users, _todos) = controllers();
    let response = users.register(register_request("ada")).await;

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["ok"], true);
    assert!(json["id"].as_i64().unwrap() > 0);
}
