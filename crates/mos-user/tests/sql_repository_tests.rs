//! User module against a real SQLite database.

use std::sync::Arc;

use mos_core::{
    InProcessEventBus, RepositoryError, RequestContext, SqlUnitOfWork, Transactional, UnitOfWork,
    UnitOfWorkExt,
};
use mos_user::{NewUser, SqlUserRepository, User, UserError, UserRepository, UserService, UserUpdate};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;

struct Fixture {
    _dir: TempDir,
    repo: Arc<SqlUserRepository>,
    service: UserService,
    bus: Arc<InProcessEventBus>,
}

async fn pool(dir: &TempDir) -> SqlitePool {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("users.db").display());
    SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .unwrap()
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool(&dir).await;
    let uow: Arc<dyn UnitOfWork> = Arc::new(SqlUnitOfWork::new(pool.clone()));
    let repo = Arc::new(SqlUserRepository::new(pool, uow));
    repo.init_schema().await.unwrap();
    // Second call must be harmless.
    repo.init_schema().await.unwrap();

    let bus = Arc::new(InProcessEventBus::new());
    let service = UserService::new(repo.clone(), bus.clone());
    Fixture {
        _dir: dir,
        repo,
        service,
        bus,
    }
}

fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        display_name: Some(format!("{} (display)", username)),
    }
}

#[tokio::test]
async fn test_create_and_read_back() {
    let fx = fixture().await;
    let mut rx = fx.bus.subscribe();
    let mut ctx = RequestContext::for_request("req-1");

    let created = fx.service.create_user(&mut ctx, new_user("ada")).await.unwrap();
    let loaded = fx.service.get_user(&mut ctx, &created.id).await.unwrap();

    assert_eq!(loaded.username, "ada");
    assert_eq!(loaded.display_name.as_deref(), Some("ada (display)"));
    assert_eq!(
        loaded.created_at.timestamp_millis(),
        created.created_at.timestamp_millis()
    );
    assert_eq!(rx.try_recv().unwrap().name, "user.created");
}

#[tokio::test]
async fn test_repository_maps_unique_violation() {
    let fx = fixture().await;
    let mut ctx = RequestContext::new();

    fx.repo
        .insert(&mut ctx, &User::new("ada", "ada@example.com"))
        .await
        .unwrap();
    let err = fx
        .repo
        .insert(&mut ctx, &User::new("ada", "second@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Duplicate(_)));

    let err: UserError = err.into();
    assert!(matches!(err, UserError::Conflict(_)));
}

#[tokio::test]
async fn test_create_within_rolls_back_with_outer_failure() {
    let fx = fixture().await;
    let mut rx = fx.bus.subscribe();
    let mut ctx = RequestContext::new();
    let uow = fx.repo.unit_of_work();

    uow.start_context(&mut ctx).await.unwrap();
    let user = fx
        .service
        .create_user_within(&mut ctx, new_user("grace"))
        .await
        .unwrap();
    assert_eq!(ctx.pending_events().len(), 1);

    // Caller's own step fails after the user was written.
    let outer: Result<(), UserError> = Err(UserError::Validation("credential rejected".into()));
    let result = uow.defer_error_context(&mut ctx, outer).await;

    assert!(matches!(result, Err(UserError::Validation(_))));
    assert!(ctx.pending_events().is_empty());
    assert!(fx.repo.find_by_id(&mut ctx, &user.id).await.unwrap().is_none());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_update_and_delete() {
    let fx = fixture().await;
    let mut ctx = RequestContext::new();
    let user = fx.service.create_user(&mut ctx, new_user("linus")).await.unwrap();

    let updated = fx
        .service
        .update_user(
            &mut ctx,
            &user.id,
            UserUpdate {
                email: Some("Linus@Kernel.org".to_string()),
                ..UserUpdate::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.email, "linus@kernel.org");
    assert!(updated.updated_at >= user.updated_at);

    let by_email = fx
        .repo
        .find_by_email(&mut ctx, "linus@kernel.org")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, user.id);

    fx.service.delete_user(&mut ctx, &user.id).await.unwrap();
    let err = fx.service.get_user(&mut ctx, &user.id).await.unwrap_err();
    assert!(matches!(err, UserError::NotFound(_)));
}

#[tokio::test]
async fn test_list_pages_in_id_order() {
    let fx = fixture().await;
    let mut ctx = RequestContext::new();
    for name in ["ada", "grace", "linus", "barbara"] {
        fx.service.create_user(&mut ctx, new_user(name)).await.unwrap();
    }

    let all = fx.service.list_users(&mut ctx, 0, 10).await.unwrap();
    assert_eq!(all.len(), 4);
    assert!(all.windows(2).all(|pair| pair[0].id < pair[1].id));

    let page = fx.service.list_users(&mut ctx, 1, 2).await.unwrap();
    assert_eq!(page, all[1..3].to_vec());
}

#[tokio::test]
async fn test_concurrent_creates_all_commit() {
    let fx = fixture().await;
    let service = Arc::new(fx.service);

    let tasks: Vec<_> = (0..20)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let mut ctx = RequestContext::for_request(format!("req-{}", i));
                service.create_user(&mut ctx, new_user(&format!("user{:02}", i))).await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut ctx = RequestContext::new();
    assert_eq!(service.list_users(&mut ctx, 0, 100).await.unwrap().len(), 20);
}

#[tokio::test]
async fn test_list_past_signed_range_is_empty() {
    let fx = fixture().await;
    let mut ctx = RequestContext::new();
    fx.service.create_user(&mut ctx, new_user("ada")).await.unwrap();

    assert!(fx.repo.list(&mut ctx, u64::MAX, 10).await.unwrap().is_empty());
    assert_eq!(fx.repo.list(&mut ctx, 0, u64::MAX).await.unwrap().len(), 1);
    assert_eq!(fx.service.list_users(&mut ctx, u64::MAX, 10).await.unwrap().len(), 0);
}
