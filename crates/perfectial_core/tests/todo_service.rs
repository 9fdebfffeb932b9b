use perfectial_core::db::Database;
use perfectial_core::dto::{ToDoDto, UserDto};
use perfectial_core::model::EntityId;
use perfectial_core::service::{ServiceOutcome, Services};

async fn setup() -> (tempfile::TempDir, Services, EntityId) {
    let dir = tempfile::tempdir().unwrap();
    let database = Database::open(dir.path().join("todos.sqlite3")).unwrap();
    let services = Services::new(database).unwrap();
    let user = services
        .users
        .register_user(UserDto::new("ada", "ada@example.com"))
        .await
        .unwrap()
        .success()
        .unwrap();
    (dir, services, user.id)
}

async fn create(services: &Services, user_id: EntityId, title: &str) -> ToDoDto {
    services
        .todos
        .create_todo(user_id, ToDoDto::new(title))
        .await
        .unwrap()
        .success()
        .unwrap()
}

#[tokio::test]
async fn create_validates_title_and_owner() {
    let (_dir, services, user_id) = setup().await;

    assert!(matches!(
        services
            .todos
            .create_todo(user_id, ToDoDto::new("   "))
            .await
            .unwrap(),
        ServiceOutcome::ValidationFailed(_)
    ));
    assert_eq!(
        services
            .todos
            .create_todo(777, ToDoDto::new("orphan"))
            .await
            .unwrap(),
        ServiceOutcome::NotFound(777)
    );

    let created = create(&services, user_id, "  water plants ").await;
    assert!(created.id > 0);
    assert_eq!(created.title, "water plants");
    assert_eq!(created.user_id, user_id);
    assert!(created.created_at > 0);
}

#[tokio::test]
async fn list_hides_done_items_unless_requested() {
    let (_dir, services, user_id) = setup().await;
    let first = create(&services, user_id, "first").await;
    create(&services, user_id, "second").await;

    assert_eq!(
        services.todos.complete_todo(first.id).await.unwrap(),
        ServiceOutcome::Success(1)
    );

    let open = services
        .todos
        .list_todos(user_id, false)
        .await
        .unwrap()
        .success()
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].title, "second");

    let all = services
        .todos
        .list_todos(user_id, true)
        .await
        .unwrap()
        .success()
        .unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].is_done);

    assert_eq!(
        services.todos.list_todos(12345, true).await.unwrap(),
        ServiceOutcome::NotFound(12345)
    );
}

#[tokio::test]
async fn update_keeps_owner_and_creation_time() {
    let (_dir, services, user_id) = setup().await;
    let created = create(&services, user_id, "draft").await;

    let mut edit = ToDoDto::new("final");
    edit.id = created.id;
    edit.description = Some("ship it".to_string());
    edit.due_at = Some(1_900_000_000_000);
    assert_eq!(
        services.todos.update_todo(edit).await.unwrap(),
        ServiceOutcome::Success(1)
    );

    let loaded = services
        .todos
        .get_todo(created.id)
        .await
        .unwrap()
        .success()
        .unwrap();
    assert_eq!(loaded.title, "final");
    assert_eq!(loaded.user_id, user_id);
    assert_eq!(loaded.created_at, created.created_at);
    assert_eq!(loaded.due_at, Some(1_900_000_000_000));

    let mut blank = ToDoDto::new("");
    blank.id = created.id;
    assert!(matches!(
        services.todos.update_todo(blank).await.unwrap(),
        ServiceOutcome::ValidationFailed(_)
    ));
}

#[tokio::test]
async fn delete_is_soft_and_reported_once() {
    let (_dir, services, user_id) = setup().await;
    let created = create(&services, user_id, "temporary").await;

    assert_eq!(
        services.todos.delete_todo(created.id).await.unwrap(),
        ServiceOutcome::Success(1)
    );
    assert_eq!(
        services.todos.delete_todo(created.id).await.unwrap(),
        ServiceOutcome::NotFound(created.id)
    );
    assert_eq!(
        services.todos.complete_todo(created.id).await.unwrap(),
        ServiceOutcome::NotFound(created.id)
    );

    let user = services.users.get_user(user_id).await.unwrap().success().unwrap();
    assert!(user.todos.is_empty());
}
