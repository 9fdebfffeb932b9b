use perfectial_core::db::Database;
use perfectial_core::model::user::User;
use perfectial_core::repo::{Filter, RepoError, Repository};
use perfectial_core::scope::{
    ambient_scope, call_chain, locator, DbContextScopeFactory, IsolationLevel, ScopeError,
    ScopeOption,
};
use tempfile::TempDir;

fn setup() -> (TempDir, DbContextScopeFactory) {
    let dir = tempfile::tempdir().unwrap();
    let database = Database::open(dir.path().join("scopes.sqlite3")).unwrap();
    (dir, DbContextScopeFactory::new(database))
}

fn user(name: &str) -> User {
    User::new(name, format!("{name}@example.com"))
}

async fn count_users(factory: &DbContextScopeFactory) -> u64 {
    let users = Repository::<User>::new();
    call_chain(async {
        let _scope = factory.create_read_only(ScopeOption::JoinExisting).unwrap();
        users.count(Filter::and(Vec::new())).await.unwrap()
    })
    .await
}

#[tokio::test]
async fn save_returns_rows_and_exposes_generated_keys() {
    let (_dir, factory) = setup();
    let users = Repository::<User>::new();

    call_chain(async {
        let scope = factory.create(ScopeOption::JoinExisting).unwrap();
        let ada = users.add(&user("ada")).unwrap();
        let bob = users.add(&user("bob")).unwrap();
        assert!(scope.has_changes());

        assert_eq!(scope.save_changes().await.unwrap(), 2);
        assert!(!scope.has_changes());

        let ada_id = scope.generated_key(ada).unwrap();
        let bob_id = scope.generated_key(bob).unwrap();
        assert!(ada_id > 0);
        assert_ne!(ada_id, bob_id);

        let loaded = users.get_by_id(ada_id).await.unwrap().unwrap();
        assert_eq!(loaded.user_name, "ada");
    })
    .await;
}

#[tokio::test]
async fn disposing_without_save_discards_changes() {
    let (_dir, factory) = setup();
    let users = Repository::<User>::new();

    call_chain(async {
        let scope = factory.create(ScopeOption::JoinExisting).unwrap();
        users.add(&user("ada")).unwrap();
        scope.dispose();
        assert!(ambient_scope().is_none());
    })
    .await;

    assert_eq!(count_users(&factory).await, 0);
}

#[tokio::test]
async fn joined_scope_defers_saving_to_the_outermost_scope() {
    let (_dir, factory) = setup();
    let users = Repository::<User>::new();

    call_chain(async {
        let outer = factory.create(ScopeOption::JoinExisting).unwrap();
        {
            let inner = factory.create(ScopeOption::JoinExisting).unwrap();
            assert!(inner.is_joined());
            assert_eq!(inner.context_id(), outer.context_id());

            users.add(&user("ada")).unwrap();
            assert_eq!(inner.save_changes().await.unwrap(), 0);
        }
        assert!(outer.has_changes());
        assert_eq!(outer.save_changes().await.unwrap(), 1);
    })
    .await;

    assert_eq!(count_users(&factory).await, 1);
}

#[tokio::test]
async fn forced_scope_saves_independently_of_its_parent() {
    let (_dir, factory) = setup();
    let users = Repository::<User>::new();

    call_chain(async {
        let outer = factory.create(ScopeOption::JoinExisting).unwrap();
        users.add(&user("discarded")).unwrap();
        {
            let forced = factory.create(ScopeOption::ForceCreateNew).unwrap();
            assert!(!forced.is_joined());
            assert_ne!(forced.context_id(), outer.context_id());
            users.add(&user("kept")).unwrap();
            assert_eq!(forced.save_changes().await.unwrap(), 1);
        }
        drop(outer);
    })
    .await;

    let names = call_chain(async {
        let _scope = factory.create_read_only(ScopeOption::JoinExisting).unwrap();
        users
            .get_list(Default::default())
            .await
            .unwrap()
            .into_iter()
            .map(|user| user.user_name)
            .collect::<Vec<_>>()
    })
    .await;
    assert_eq!(names, vec!["kept".to_string()]);
}

#[tokio::test]
async fn read_only_scope_rejects_staged_writes() {
    let (_dir, factory) = setup();
    let users = Repository::<User>::new();

    call_chain(async {
        let _scope = factory.create_read_only(ScopeOption::JoinExisting).unwrap();
        let err = users.add(&user("ada")).unwrap_err();
        assert!(matches!(err, RepoError::Scope(ScopeError::ReadOnlyScope)));
        assert!(users.get_list(Default::default()).await.unwrap().is_empty());
    })
    .await;
}

#[tokio::test]
async fn read_only_scope_may_join_a_read_write_scope() {
    let (_dir, factory) = setup();
    let users = Repository::<User>::new();

    call_chain(async {
        let outer = factory.create(ScopeOption::JoinExisting).unwrap();
        users.add(&user("ada")).unwrap();
        {
            let read = factory.create_read_only(ScopeOption::JoinExisting).unwrap();
            assert!(read.is_joined());
            assert_eq!(read.context_id(), outer.context_id());
            assert!(users.add(&user("bob")).is_err());
        }
        users.add(&user("bob")).unwrap();
        assert_eq!(outer.save_changes().await.unwrap(), 2);
    })
    .await;
}

#[tokio::test]
async fn repository_without_scope_fails_fast() {
    let users = Repository::<User>::new();

    let outside_chain = users.get_by_id(1).await.unwrap_err();
    assert!(matches!(
        outside_chain,
        RepoError::Scope(ScopeError::NoAmbientScope { entity: "users" })
    ));

    call_chain(async {
        let err = users.add(&user("ada")).unwrap_err();
        assert!(err.is_configuration());
    })
    .await;
}

#[tokio::test]
async fn suppression_hides_the_ambient_scope() {
    let (_dir, factory) = setup();
    let users = Repository::<User>::new();

    call_chain(async {
        let outer = factory.create(ScopeOption::JoinExisting).unwrap();
        {
            let _suppressed = factory.suppress_ambient().unwrap();
            assert!(ambient_scope().is_none());
            assert!(matches!(
                users.count(Filter::and(Vec::new())).await.unwrap_err(),
                RepoError::Scope(ScopeError::NoAmbientScope { .. })
            ));

            let fresh = factory.create(ScopeOption::JoinExisting).unwrap();
            assert!(!fresh.is_joined());
            assert_ne!(fresh.context_id(), outer.context_id());
        }
        assert_eq!(ambient_scope().unwrap().scope_id(), outer.scope_id());
    })
    .await;
}

#[tokio::test]
async fn transactional_scope_commits_on_save_and_rolls_back_on_dispose() {
    let (_dir, factory) = setup();
    let users = Repository::<User>::new();

    call_chain(async {
        let scope = factory
            .create_with_transaction(IsolationLevel::ReadCommitted)
            .unwrap();
        assert!(users.get_list(Default::default()).await.unwrap().is_empty());
        users.add(&user("ada")).unwrap();
        assert_eq!(scope.save_changes().await.unwrap(), 1);

        users.add(&user("bob")).unwrap();
        assert_eq!(users.count(Filter::and(Vec::new())).await.unwrap(), 1);
    })
    .await;

    assert_eq!(count_users(&factory).await, 1);
}

#[tokio::test]
async fn incompatible_ambient_transaction_is_rejected() {
    let (_dir, factory) = setup();

    call_chain(async {
        let _outer = factory
            .create_with_transaction(IsolationLevel::ReadCommitted)
            .unwrap();

        let err = factory
            .create_with_transaction(IsolationLevel::RepeatableRead)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            RepoError::Scope(ScopeError::IncompatibleAmbientTransaction {
                ambient: IsolationLevel::ReadCommitted,
                requested: IsolationLevel::RepeatableRead,
            })
        ));
        assert!(factory
            .create_with_transaction(IsolationLevel::Serializable)
            .is_err());

        let same_level = factory
            .create_with_transaction(IsolationLevel::ReadCommitted)
            .unwrap();
        assert!(!same_level.is_joined());
    })
    .await;
}

#[tokio::test]
async fn failed_save_keeps_pending_changes() {
    let (_dir, factory) = setup();
    let users = Repository::<User>::new();

    call_chain(async {
        let scope = factory.create(ScopeOption::JoinExisting).unwrap();
        users.add(&user("ada")).unwrap();
        users.add(&User::new("ada", "other@example.com")).unwrap();

        let err = scope.save_changes().await.unwrap_err();
        assert!(matches!(err, RepoError::Constraint(_)), "{err}");
        assert!(scope.has_changes());
    })
    .await;

    assert_eq!(count_users(&factory).await, 0);
}

#[tokio::test]
async fn update_of_missing_row_is_a_concurrency_conflict() {
    let (_dir, factory) = setup();
    let users = Repository::<User>::new();

    call_chain(async {
        let scope = factory.create(ScopeOption::JoinExisting).unwrap();
        let mut ghost = user("ghost");
        ghost.id = 999;
        users.update(&ghost).unwrap();

        let err = scope.save_changes().await.unwrap_err();
        assert!(matches!(
            err,
            RepoError::ConcurrencyConflict {
                table: "users",
                id: 999
            }
        ));
    })
    .await;
}

#[tokio::test]
async fn out_of_order_disposal_removes_only_the_disposed_scope() {
    let (_dir, factory) = setup();

    call_chain(async {
        let outer = factory.create(ScopeOption::JoinExisting).unwrap();
        let inner = factory.create(ScopeOption::ForceCreateNew).unwrap();
        let inner_id = inner.scope_id();
        assert_eq!(locator::depth(), 2);

        drop(outer);
        assert_eq!(locator::depth(), 1);
        assert_eq!(ambient_scope().unwrap().scope_id(), inner_id);

        drop(inner);
        assert_eq!(locator::depth(), 0);
    })
    .await;
}
