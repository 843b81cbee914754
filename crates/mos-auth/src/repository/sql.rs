//! SQLite Credential and Session Repositories

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mos_core::{RepositoryError, RequestContext, SqlConnection, Transactional, UnitOfWork};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{CredentialRepository, SessionRepository};
use crate::entity::{Credential, Session};

fn timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    let millis: i64 = row.try_get(column)?;
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| RepositoryError::Corrupt(format!("invalid {} timestamp", column)))
}

fn optional_timestamp(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    let millis: Option<i64> = row.try_get(column)?;
    millis
        .map(|millis| {
            DateTime::<Utc>::from_timestamp_millis(millis)
                .ok_or_else(|| RepositoryError::Corrupt(format!("invalid {} timestamp", column)))
        })
        .transpose()
}

pub struct SqlCredentialRepository {
    pool: SqlitePool,
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl SqlCredentialRepository {
    pub fn new(pool: SqlitePool, unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self { pool, unit_of_work }
    }

    pub async fn init_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                deleted_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Initialized credentials schema");
        Ok(())
    }

    fn parse_row(row: &SqliteRow) -> Result<Credential, RepositoryError> {
        Ok(Credential {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            active: row.try_get("active")?,
            deleted_at: optional_timestamp(row, "deleted_at")?,
            created_at: timestamp(row, "created_at")?,
            updated_at: timestamp(row, "updated_at")?,
        })
    }

    async fn find_one_by(
        &self,
        ctx: &mut RequestContext,
        column: &'static str,
        value: &str,
    ) -> Result<Option<Credential>, RepositoryError> {
        let sql = format!(
            "SELECT id, user_id, username, password_hash, active, deleted_at, created_at, updated_at \
             FROM credentials WHERE {} = ?",
            column
        );
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(conn.executor())
            .await?;
        row.as_ref().map(Self::parse_row).transpose()
    }
}

impl Transactional for SqlCredentialRepository {
    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.unit_of_work.as_ref()
    }
}

#[async_trait]
impl CredentialRepository for SqlCredentialRepository {
    async fn insert(
        &self,
        ctx: &mut RequestContext,
        credential: &Credential,
    ) -> Result<(), RepositoryError> {
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        sqlx::query(
            r#"
            INSERT INTO credentials
                (id, user_id, username, password_hash, active, deleted_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&credential.id)
        .bind(&credential.user_id)
        .bind(&credential.username)
        .bind(&credential.password_hash)
        .bind(credential.active)
        .bind(credential.deleted_at.map(|at| at.timestamp_millis()))
        .bind(credential.created_at.timestamp_millis())
        .bind(credential.updated_at.timestamp_millis())
        .execute(conn.executor())
        .await?;

        debug!(user_id = %credential.user_id, "Inserted credential");
        Ok(())
    }

    async fn find_by_user_id(
        &self,
        ctx: &mut RequestContext,
        user_id: &str,
    ) -> Result<Option<Credential>, RepositoryError> {
        self.find_one_by(ctx, "user_id", user_id).await
    }

    async fn find_by_username(
        &self,
        ctx: &mut RequestContext,
        username: &str,
    ) -> Result<Option<Credential>, RepositoryError> {
        self.find_one_by(ctx, "username", username).await
    }

    async fn update(
        &self,
        ctx: &mut RequestContext,
        credential: &Credential,
    ) -> Result<bool, RepositoryError> {
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        let result = sqlx::query(
            r#"
            UPDATE credentials
            SET password_hash = ?, active = ?, deleted_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&credential.password_hash)
        .bind(credential.active)
        .bind(credential.deleted_at.map(|at| at.timestamp_millis()))
        .bind(credential.updated_at.timestamp_millis())
        .bind(&credential.id)
        .execute(conn.executor())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct SqlSessionRepository {
    pool: SqlitePool,
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl SqlSessionRepository {
    pub fn new(pool: SqlitePool, unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self { pool, unit_of_work }
    }

    pub async fn init_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                token_hash TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                revoked_at INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id)")
            .execute(&self.pool)
            .await?;

        debug!("Initialized sessions schema");
        Ok(())
    }

    fn parse_row(row: &SqliteRow) -> Result<Session, RepositoryError> {
        let revoked_at = optional_timestamp(row, "revoked_at")?;

        Ok(Session {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            token_hash: row.try_get("token_hash")?,
            created_at: timestamp(row, "created_at")?,
            expires_at: timestamp(row, "expires_at")?,
            revoked_at,
        })
    }
}

impl Transactional for SqlSessionRepository {
    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.unit_of_work.as_ref()
    }
}

#[async_trait]
impl SessionRepository for SqlSessionRepository {
    async fn insert(
        &self,
        ctx: &mut RequestContext,
        session: &Session,
    ) -> Result<(), RepositoryError> {
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, token_hash, created_at, expires_at, revoked_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.token_hash)
        .bind(session.created_at.timestamp_millis())
        .bind(session.expires_at.timestamp_millis())
        .bind(session.revoked_at.map(|at| at.timestamp_millis()))
        .execute(conn.executor())
        .await?;

        debug!(session_id = %session.id, user_id = %session.user_id, "Inserted session");
        Ok(())
    }

    async fn find_by_token_hash(
        &self,
        ctx: &mut RequestContext,
        token_hash: &str,
    ) -> Result<Option<Session>, RepositoryError> {
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        let row = sqlx::query(
            "SELECT id, user_id, token_hash, created_at, expires_at, revoked_at \
             FROM sessions WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(conn.executor())
        .await?;
        row.as_ref().map(Self::parse_row).transpose()
    }

    async fn revoke(
        &self,
        ctx: &mut RequestContext,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        let result =
            sqlx::query("UPDATE sessions SET revoked_at = ? WHERE id = ? AND revoked_at IS NULL")
                .bind(at.timestamp_millis())
                .bind(id)
                .execute(conn.executor())
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn revoke_for_user(
        &self,
        ctx: &mut RequestContext,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(at.timestamp_millis())
        .bind(user_id)
        .execute(conn.executor())
        .await?;

        Ok(result.rows_affected())
    }
}
