//! Modules wired together through the adapters, over one SQLite database
//! and one shared unit of work.

use std::sync::Arc;

use mos_acl::{UserOwnerDirectory, UserServiceProvisioner};
use mos_auth::{
    Argon2Config, AuthError, AuthService, PasswordPolicy, PasswordService, RegisterRequest,
    RevokeOnUserDeleted, SqlCredentialRepository, SqlSessionRepository,
};
use mos_core::{
    EventEnvelope, InProcessEventBus, RequestContext, SqlUnitOfWork, UnitOfWork,
};
use mos_product::{NewProduct, ProductError, ProductService, SqlProductRepository};
use mos_user::{SqlUserRepository, UserError, UserService};
use sqlx::sqlite::SqlitePoolOptions;
use tempfile::TempDir;
use tokio::sync::broadcast;

struct App {
    _dir: TempDir,
    bus: Arc<InProcessEventBus>,
    users: Arc<UserService>,
    products: ProductService,
    auth: Arc<AuthService>,
}

async fn app() -> App {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("mosaic.db").display());
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .unwrap();
    let uow: Arc<dyn UnitOfWork> = Arc::new(SqlUnitOfWork::new(pool.clone()));
    let bus = Arc::new(InProcessEventBus::new());

    let user_repo = Arc::new(SqlUserRepository::new(pool.clone(), uow.clone()));
    let product_repo = Arc::new(SqlProductRepository::new(pool.clone(), uow.clone()));
    let credentials = Arc::new(SqlCredentialRepository::new(pool.clone(), uow.clone()));
    let sessions = Arc::new(SqlSessionRepository::new(pool.clone(), uow));
    user_repo.init_schema().await.unwrap();
    product_repo.init_schema().await.unwrap();
    credentials.init_schema().await.unwrap();
    sessions.init_schema().await.unwrap();

    let users = Arc::new(UserService::new(user_repo, bus.clone()));
    let products = ProductService::new(
        product_repo,
        Arc::new(UserOwnerDirectory::new(users.clone())),
        bus.clone(),
    );
    let passwords =
        PasswordService::new(Argon2Config::testing(), PasswordPolicy::lenient()).unwrap();
    let auth = Arc::new(AuthService::new(
        credentials,
        sessions,
        Arc::new(UserServiceProvisioner::new(users.clone())),
        passwords,
        bus.clone(),
    ));
    bus.subscribe_to(
        mos_auth::subscriber::USER_DELETED,
        Arc::new(RevokeOnUserDeleted::new(auth.clone())),
    );

    App {
        _dir: dir,
        bus,
        users,
        products,
        auth,
    }
}

fn drain(rx: &mut broadcast::Receiver<EventEnvelope>) -> Vec<String> {
    let mut names = Vec::new();
    while let Ok(envelope) = rx.try_recv() {
        names.push(envelope.name);
    }
    names
}

fn registration(username: &str, email: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        display_name: Some("Test User".to_string()),
        password: "correct horse".to_string(),
    }
}

#[tokio::test]
async fn test_register_commits_user_and_credential_together() {
    let app = app().await;
    let mut rx = app.bus.subscribe();
    let mut ctx = RequestContext::for_request("req-register");

    let registered = app
        .auth
        .register(&mut ctx, registration("ada", "ada@example.com"))
        .await
        .unwrap();

    let user = app.users.get_user(&mut ctx, &registered.user_id).await.unwrap();
    assert_eq!(user.username, "ada");
    assert_eq!(drain(&mut rx), vec!["user.created", "auth.registered"]);
}

#[tokio::test]
async fn test_rejected_registration_leaves_nothing_behind() {
    let app = app().await;
    let mut rx = app.bus.subscribe();
    app.auth
        .register(&mut RequestContext::new(), registration("ada", "ada@example.com"))
        .await
        .unwrap();
    drain(&mut rx);

    let err = app
        .auth
        .register(&mut RequestContext::new(), registration("grace", "ada@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Conflict(_)));
    assert!(drain(&mut rx).is_empty());

    let err = app
        .auth
        .login(&mut RequestContext::new(), "grace", "correct horse")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert_eq!(
        app.users
            .list_users(&mut RequestContext::new(), 0, 10)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_logged_in_user_owns_products() {
    let app = app().await;
    app.auth
        .register(&mut RequestContext::new(), registration("ada", "ada@example.com"))
        .await
        .unwrap();
    let grant = app
        .auth
        .login(&mut RequestContext::new(), "ada", "correct horse")
        .await
        .unwrap();

    let mut ctx = RequestContext::for_request("req-product");
    app.auth.authenticate(&mut ctx, &grant.token).await.unwrap();

    let product = app
        .products
        .create_product(
            &mut ctx,
            NewProduct {
                sku: "mug-01".to_string(),
                name: "Mug".to_string(),
                description: None,
                price_cents: 900,
                stock: 2,
            },
        )
        .await
        .unwrap();
    assert_eq!(product.owner_id, grant.session.user_id);
}

#[tokio::test]
async fn test_inactive_user_cannot_create_products() {
    let app = app().await;
    let registered = app
        .auth
        .register(&mut RequestContext::new(), registration("ada", "ada@example.com"))
        .await
        .unwrap();
    app.users
        .update_user(
            &mut RequestContext::new(),
            &registered.user_id,
            mos_user::UserUpdate {
                active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let mut ctx = RequestContext::new().with(mos_core::USER_ID, registered.user_id.clone());
    let err = app
        .products
        .create_product(
            &mut ctx,
            NewProduct {
                sku: "mug-02".to_string(),
                name: "Mug".to_string(),
                description: None,
                price_cents: 900,
                stock: 0,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProductError::Forbidden(_)));
}

#[tokio::test]
async fn test_deleting_user_revokes_sessions() {
    let app = app().await;
    let registered = app
        .auth
        .register(&mut RequestContext::new(), registration("ada", "ada@example.com"))
        .await
        .unwrap();
    let grant = app
        .auth
        .login(&mut RequestContext::new(), "ada", "correct horse")
        .await
        .unwrap();
    let mut rx = app.bus.subscribe();

    app.users
        .delete_user(&mut RequestContext::new(), &registered.user_id)
        .await
        .unwrap();

    assert_eq!(drain(&mut rx), vec!["user.deleted", "auth.credential-revoked"]);
    let err = app
        .auth
        .authenticate(&mut RequestContext::new(), &grant.token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Unauthorized(_)));

    let err = app
        .users
        .get_user(&mut RequestContext::new(), &registered.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, UserError::NotFound(_)));
}
