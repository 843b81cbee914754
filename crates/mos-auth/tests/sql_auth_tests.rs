//! Auth module against a real SQLite database.
//!
//! The provisioner here writes into the same database through the caller's
//! transaction, standing in for the user module.

use std::sync::Arc;

use async_trait::async_trait;
use mos_auth::{
    AclError, Argon2Config, AuthError, AuthService, Credential, CredentialRepository, NewUserRequest,
    PasswordPolicy, PasswordService, RegisterRequest, SessionRepository, SqlCredentialRepository,
    SqlSessionRepository, UserProvisioner,
};
use mos_core::{InProcessEventBus, RequestContext, SqlConnection, SqlUnitOfWork, UnitOfWork};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tempfile::TempDir;

struct TableProvisioner {
    pool: SqlitePool,
}

#[async_trait]
impl UserProvisioner for TableProvisioner {
    async fn create_user(
        &self,
        ctx: &mut RequestContext,
        request: NewUserRequest,
    ) -> Result<String, AclError> {
        let id = format!("u-{}", request.username);
        let mut conn = SqlConnection::acquire(ctx, &self.pool)
            .await
            .map_err(|e| AclError::Unavailable(e.to_string()))?;
        sqlx::query("INSERT INTO accounts (id, email) VALUES (?, ?)")
            .bind(&id)
            .bind(&request.email)
            .execute(conn.executor())
            .await
            .map_err(|e| AclError::Unavailable(e.to_string()))?;
        Ok(id)
    }
}

struct Fixture {
    _dir: TempDir,
    pool: SqlitePool,
    credentials: Arc<SqlCredentialRepository>,
    sessions: Arc<SqlSessionRepository>,
    auth: AuthService,
}

async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("auth.db").display());
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE accounts (id TEXT PRIMARY KEY, email TEXT NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();

    let uow: Arc<dyn UnitOfWork> = Arc::new(SqlUnitOfWork::new(pool.clone()));
    let credentials = Arc::new(SqlCredentialRepository::new(pool.clone(), uow.clone()));
    let sessions = Arc::new(SqlSessionRepository::new(pool.clone(), uow));
    credentials.init_schema().await.unwrap();
    sessions.init_schema().await.unwrap();

    let passwords =
        PasswordService::new(Argon2Config::testing(), PasswordPolicy::lenient()).unwrap();
    let auth = AuthService::new(
        credentials.clone(),
        sessions.clone(),
        Arc::new(TableProvisioner { pool: pool.clone() }),
        passwords,
        Arc::new(InProcessEventBus::new()),
    );

    Fixture {
        _dir: dir,
        pool,
        credentials,
        sessions,
        auth,
    }
}

async fn account_count(pool: &SqlitePool) -> i64 {
    sqlx::query("SELECT COUNT(*) AS n FROM accounts")
        .fetch_one(pool)
        .await
        .unwrap()
        .get("n")
}

fn register_request(username: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        display_name: None,
        password: "correct horse".to_string(),
    }
}

#[tokio::test]
async fn test_register_and_login_persist() {
    let fx = fixture().await;
    let mut ctx = RequestContext::new();

    let registration = fx.auth.register(&mut ctx, register_request("ada")).await.unwrap();
    assert_eq!(account_count(&fx.pool).await, 1);

    let stored = fx
        .credentials
        .find_by_user_id(&mut ctx, &registration.user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.password_hash.starts_with("$argon2id$"));
    assert!(stored.active);
    assert!(stored.deleted_at.is_none());

    let grant = fx
        .auth
        .login(&mut RequestContext::new(), "ada", "correct horse")
        .await
        .unwrap();
    let session = fx
        .sessions
        .find_by_token_hash(&mut ctx, &grant.session.token_hash)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.user_id, registration.user_id);
    assert_eq!(
        session.expires_at.timestamp_millis(),
        grant.session.expires_at.timestamp_millis()
    );
}

#[tokio::test]
async fn test_failed_credential_insert_rolls_back_provisioned_user() {
    let fx = fixture().await;
    let mut ctx = RequestContext::new();

    // Occupies the user id the provisioner will hand out.
    fx.credentials
        .insert(&mut ctx, &Credential::new("u-ada", "someone-else", "hash"))
        .await
        .unwrap();

    let err = fx
        .auth
        .register(&mut RequestContext::new(), register_request("ada"))
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Conflict(_)));
    assert_eq!(account_count(&fx.pool).await, 0);
}

#[tokio::test]
async fn test_revoke_user_persists_flags() {
    let fx = fixture().await;
    let registration = fx
        .auth
        .register(&mut RequestContext::new(), register_request("grace"))
        .await
        .unwrap();
    let grant = fx
        .auth
        .login(&mut RequestContext::new(), "grace", "correct horse")
        .await
        .unwrap();

    let revoked = fx
        .auth
        .revoke_user(&mut RequestContext::new(), &registration.user_id)
        .await
        .unwrap();
    assert_eq!(revoked, 1);

    let mut ctx = RequestContext::new();
    let credential = fx
        .credentials
        .find_by_username(&mut ctx, "grace")
        .await
        .unwrap()
        .unwrap();
    assert!(credential.active);
    assert!(credential.deleted_at.is_some());
    let err = fx
        .auth
        .login(&mut RequestContext::new(), "grace", "correct horse")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    let session = fx
        .sessions
        .find_by_token_hash(&mut ctx, &grant.session.token_hash)
        .await
        .unwrap()
        .unwrap();
    assert!(session.revoked_at.is_some());
}

#[tokio::test]
async fn test_inactive_credential_cannot_log_in() {
    let fx = fixture().await;
    fx.auth
        .register(&mut RequestContext::new(), register_request("ada"))
        .await
        .unwrap();

    let mut ctx = RequestContext::new();
    let mut credential = fx
        .credentials
        .find_by_username(&mut ctx, "ada")
        .await
        .unwrap()
        .unwrap();
    credential.active = false;
    assert!(fx.credentials.update(&mut ctx, &credential).await.unwrap());

    let stored = fx
        .credentials
        .find_by_username(&mut ctx, "ada")
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.active);
    assert!(stored.deleted_at.is_none());

    let err = fx
        .auth
        .login(&mut RequestContext::new(), "ada", "correct horse")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));

    let err = fx
        .auth
        .change_password(&mut RequestContext::new(), &stored.user_id, "correct horse", "battery staple")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}
