use perfectial_core::db::Database;
use perfectial_core::model::user::User;
use perfectial_core::repo::{Filter, Repository};
use perfectial_core::scope::{
    ambient_scope, call_chain, ensure_call_chain, locator, DbContextScopeFactory, ScopeOption,
};
use std::time::Duration;

fn factory() -> (tempfile::TempDir, DbContextScopeFactory) {
    let dir = tempfile::tempdir().unwrap();
    let database = Database::open(dir.path().join("isolation.sqlite3")).unwrap();
    (dir, DbContextScopeFactory::new(database))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spawned_call_chains_never_see_each_others_scopes() {
    let (_dir, factory) = factory();

    let mut handles = Vec::new();
    for worker in 0..8 {
        let factory = factory.clone();
        handles.push(tokio::spawn(call_chain(async move {
            assert!(ambient_scope().is_none());
            let scope = factory.create(ScopeOption::JoinExisting).unwrap();
            assert!(!scope.is_joined());
            let context_id = scope.context_id();

            // Resume on whichever worker picks the task up next.
            tokio::time::sleep(Duration::from_millis(5 * (worker % 3))).await;
            tokio::task::yield_now().await;

            let ambient = ambient_scope().unwrap();
            assert_eq!(ambient.scope_id(), scope.scope_id());
            assert_eq!(ambient.context_id(), context_id);
            assert_eq!(locator::depth(), 1);
            context_id
        })));
    }

    let mut context_ids = Vec::new();
    for handle in handles {
        context_ids.push(handle.await.unwrap());
    }
    context_ids.sort_unstable();
    context_ids.dedup();
    assert_eq!(context_ids.len(), 8);
}

#[tokio::test]
async fn joined_branches_have_separate_stacks() {
    let (_dir, factory) = factory();

    call_chain(async {
        let _outer = factory.create(ScopeOption::JoinExisting).unwrap();

        let branch = |delay: u64| {
            let factory = factory.clone();
            call_chain(async move {
                assert!(ambient_scope().is_none());
                let scope = factory.create(ScopeOption::JoinExisting).unwrap();
                tokio::time::sleep(Duration::from_millis(delay)).await;
                assert_eq!(ambient_scope().unwrap().scope_id(), scope.scope_id());
                scope.context_id()
            })
        };

        let (left, right) = tokio::join!(branch(10), branch(1));
        assert_ne!(left, right);
        assert_eq!(locator::depth(), 1);
    })
    .await;
}

#[tokio::test]
async fn ensure_call_chain_joins_the_callers_chain() {
    let (_dir, factory) = factory();

    call_chain(async {
        let outer = factory.create(ScopeOption::JoinExisting).unwrap();
        let inner_context = ensure_call_chain(async {
            let inner = factory.create(ScopeOption::JoinExisting).unwrap();
            assert!(inner.is_joined());
            inner.context_id()
        })
        .await;
        assert_eq!(inner_context, outer.context_id());
    })
    .await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ambient_scope_survives_blocking_pool_round_trips() {
    let (_dir, factory) = factory();
    let users = Repository::<User>::new();

    call_chain(async {
        let scope = factory.create(ScopeOption::JoinExisting).unwrap();
        users
            .add(&User::new("ada", "ada@example.com"))
            .unwrap();
        assert_eq!(scope.save_changes().await.unwrap(), 1);

        for _ in 0..5 {
            assert!(users.any(Filter::eq("user_name", "ada".to_string())).await.unwrap());
            assert_eq!(ambient_scope().unwrap().scope_id(), scope.scope_id());
        }
    })
    .await;
}
