//! SQLite Product Repository

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mos_core::{RepositoryError, RequestContext, SqlConnection, Transactional, UnitOfWork};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::ProductRepository;
use crate::entity::Product;

const SELECT_COLUMNS: &str = "SELECT id, sku, name, description, price_cents, stock, owner_id, \
                              created_at, updated_at FROM products";

pub struct SqlProductRepository {
    pool: SqlitePool,
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl SqlProductRepository {
    pub fn new(pool: SqlitePool, unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self { pool, unit_of_work }
    }

    pub async fn init_schema(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                sku TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                description TEXT,
                price_cents INTEGER NOT NULL,
                stock INTEGER NOT NULL DEFAULT 0,
                owner_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_products_owner ON products(owner_id)")
            .execute(&self.pool)
            .await?;

        debug!("Initialized products schema");
        Ok(())
    }

    fn parse_row(row: &SqliteRow) -> Result<Product, RepositoryError> {
        let created_at: i64 = row.try_get("created_at")?;
        let updated_at: i64 = row.try_get("updated_at")?;

        Ok(Product {
            id: row.try_get("id")?,
            sku: row.try_get("sku")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price_cents: row.try_get("price_cents")?,
            stock: row.try_get("stock")?,
            owner_id: row.try_get("owner_id")?,
            created_at: DateTime::<Utc>::from_timestamp_millis(created_at)
                .ok_or_else(|| RepositoryError::Corrupt("invalid created_at timestamp".into()))?,
            updated_at: DateTime::<Utc>::from_timestamp_millis(updated_at)
                .ok_or_else(|| RepositoryError::Corrupt("invalid updated_at timestamp".into()))?,
        })
    }

    async fn find_one_by(
        &self,
        ctx: &mut RequestContext,
        column: &'static str,
        value: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("{} WHERE {} = ?", SELECT_COLUMNS, column);
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(conn.executor())
            .await?;
        row.as_ref().map(Self::parse_row).transpose()
    }
}

impl Transactional for SqlProductRepository {
    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.unit_of_work.as_ref()
    }
}

#[async_trait]
impl ProductRepository for SqlProductRepository {
    async fn insert(
        &self,
        ctx: &mut RequestContext,
        product: &Product,
    ) -> Result<(), RepositoryError> {
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        sqlx::query(
            r#"
            INSERT INTO products
                (id, sku, name, description, price_cents, stock, owner_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(&product.owner_id)
        .bind(product.created_at.timestamp_millis())
        .bind(product.updated_at.timestamp_millis())
        .execute(conn.executor())
        .await?;

        debug!(product_id = %product.id, sku = %product.sku, "Inserted product");
        Ok(())
    }

    async fn find_by_id(
        &self,
        ctx: &mut RequestContext,
        id: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        self.find_one_by(ctx, "id", id).await
    }

    async fn find_by_sku(
        &self,
        ctx: &mut RequestContext,
        sku: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        self.find_one_by(ctx, "sku", sku).await
    }

    async fn list(
        &self,
        ctx: &mut RequestContext,
        owner_id: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Product>, RepositoryError> {
        // SQLite integers are signed; an offset past i64::MAX skips every row.
        let Ok(offset) = i64::try_from(offset) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = match owner_id {
            Some(_) => format!(
                "{} WHERE owner_id = ? ORDER BY id LIMIT ? OFFSET ?",
                SELECT_COLUMNS
            ),
            None => format!("{} ORDER BY id LIMIT ? OFFSET ?", SELECT_COLUMNS),
        };

        let mut query = sqlx::query(&sql);
        if let Some(owner_id) = owner_id {
            query = query.bind(owner_id);
        }
        let query = query.bind(limit).bind(offset);

        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        let rows = query.fetch_all(conn.executor()).await?;
        rows.iter().map(Self::parse_row).collect()
    }

    async fn update(
        &self,
        ctx: &mut RequestContext,
        product: &Product,
    ) -> Result<bool, RepositoryError> {
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        let result = sqlx::query(
            r#"
            UPDATE products
            SET sku = ?, name = ?, description = ?, price_cents = ?, stock = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.stock)
        .bind(product.updated_at.timestamp_millis())
        .bind(&product.id)
        .execute(conn.executor())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, ctx: &mut RequestContext, id: &str) -> Result<bool, RepositoryError> {
        let mut conn = SqlConnection::acquire(ctx, &self.pool).await?;
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(conn.executor())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
