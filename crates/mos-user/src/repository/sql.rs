//! SQLite User Repository

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mos_core::{RepositoryError, RequestContext, SqlConnection, Transactional, UnitOfWork};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::UserRepository;
use crate::entity::User;

const SELECT_COLUMNS: &str =
    "SELECT id, username, email, display_name, active, created_at, updated_at FROM users";

pub struct SqlUserRepository {
    pool: SqlitePool,
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl SqlUserRepository {
    pub fn new(pool: SqlitePool, unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self { pool, unit_of_work }
    }

    /// Create the users table if it does not exist
    pub async fn init_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL UNIQUE,
                display_name TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Initialized users schema");
        Ok(())
    }

    fn parse_row(row: &SqliteRow) -> Result<User, RepositoryError> {
        let created_at: i64 = row.try_get("created_at")?;
        let updated_at: i64 = row.try_get("updated_at")?;

        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            active: row.try_get("active")?,
            created_at: parse_millis(created_at, "created_at")?,
            updated_at: parse_millis(updated_at, "updated_at")?,
        })
    }

    async fn find_one_by(
        &self,
        ctx: &mut RequestContext,
        column: &'static str,
        value: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let sql = format!("{} WHERE {} = ?", SELECT_COLUMNS, column);
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(conn.executor())
            .await?;
        row.as_ref().map(Self::parse_row).transpose()
    }
}

fn parse_millis(value: i64, column: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::from_timestamp_millis(value)
        .ok_or_else(|| RepositoryError::Corrupt(format!("invalid {} timestamp: {}", column, value)))
}

impl Transactional for SqlUserRepository {
    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.unit_of_work.as_ref()
    }
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn insert(&self, ctx: &mut RequestContext, user: &User) -> Result<(), RepositoryError> {
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, display_name, active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.active)
        .bind(user.created_at.timestamp_millis())
        .bind(user.updated_at.timestamp_millis())
        .execute(conn.executor())
        .await?;

        debug!(user_id = %user.id, in_transaction = conn.in_transaction(), "Inserted user");
        Ok(())
    }

    async fn find_by_id(
        &self,
        ctx: &mut RequestContext,
        id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.find_one_by(ctx, "id", id).await
    }

    async fn find_by_username(
        &self,
        ctx: &mut RequestContext,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.find_one_by(ctx, "username", username).await
    }

    async fn find_by_email(
        &self,
        ctx: &mut RequestContext,
        email: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.find_one_by(ctx, "email", email).await
    }

    async fn list(
        &self,
        ctx: &mut RequestContext,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<User>, RepositoryError> {
        // SQLite integers are signed; an offset past i64::MAX skips every row.
        let Ok(offset) = i64::try_from(offset) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!("{} ORDER BY id LIMIT ? OFFSET ?", SELECT_COLUMNS);
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(conn.executor())
            .await?;
        rows.iter().map(Self::parse_row).collect()
    }

    async fn update(&self, ctx: &mut RequestContext, user: &User) -> Result<bool, RepositoryError> {
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = ?, email = ?, display_name = ?, active = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.active)
        .bind(user.updated_at.timestamp_millis())
        .bind(&user.id)
        .execute(conn.executor())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, ctx: &mut RequestContext, id: &str) -> Result<bool, RepositoryError> {
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(conn.executor())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
