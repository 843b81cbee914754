//! Relational unit of work over a SQLite pool.

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::debug;

use super::{Completion, UnitOfWork};
use crate::context::{RequestContext, SQL_TRANSACTION};
use crate::error::TransactionError;

/// Open SQLite transaction stored on the context.
///
/// The mutex only exists to make the handle `Sync`; access goes through
/// `&mut self`, so it is never contended.
pub struct SqlTransaction {
    inner: Mutex<Transaction<'static, Sqlite>>,
}

impl SqlTransaction {
    fn new(tx: Transaction<'static, Sqlite>) -> Self {
        Self {
            inner: Mutex::new(tx),
        }
    }

    pub fn connection(&mut self) -> &mut SqliteConnection {
        &mut **self.inner.get_mut()
    }

    fn into_inner(self) -> Transaction<'static, Sqlite> {
        self.inner.into_inner()
    }
}

/// Connection for one repository call: the open transaction when the
/// context carries one, otherwise a connection checked out of the pool.
pub enum SqlConnection<'c> {
    Transaction(&'c mut SqliteConnection),
    Pooled(PoolConnection<Sqlite>),
}

impl<'c> SqlConnection<'c> {
    pub async fn acquire(
        ctx: &'c mut RequestContext,
        pool: &SqlitePool,
    ) -> Result<SqlConnection<'c>, sqlx::Error> {
        if let Some(tx) = ctx.get_mut(&SQL_TRANSACTION) {
            return Ok(SqlConnection::Transaction(tx.connection()));
        }
        Ok(SqlConnection::Pooled(pool.acquire().await?))
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self, SqlConnection::Transaction(_))
    }

    pub fn executor(&mut self) -> &mut SqliteConnection {
        match self {
            SqlConnection::Transaction(conn) => &mut **conn,
            SqlConnection::Pooled(conn) => &mut **conn,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqlUnitOfWork {
    pool: SqlitePool,
}

impl SqlUnitOfWork {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl UnitOfWork for SqlUnitOfWork {
    fn backend(&self) -> &'static str {
        "sql"
    }

    async fn start_context(&self, ctx: &mut RequestContext) -> Result<(), TransactionError> {
        if ctx.contains(SQL_TRANSACTION.name()) {
            return Err(TransactionError::AlreadyStarted("sql"));
        }

        // Take the write lock up front. A deferred transaction that reads
        // and then writes cannot wait out a concurrent writer; SQLite fails
        // the upgrade with SQLITE_BUSY instead.
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        ctx.insert(SQL_TRANSACTION, SqlTransaction::new(tx));
        debug!(request_id = ?ctx.request_id(), "SQL transaction started");
        Ok(())
    }

    async fn finish_context(
        &self,
        ctx: &mut RequestContext,
        completion: Completion,
    ) -> Result<(), TransactionError> {
        let Some(tx) = ctx.take(&SQL_TRANSACTION) else {
            return Ok(());
        };

        let tx = tx.into_inner();
        match completion {
            Completion::Commit => {
                tx.commit().await?;
                debug!(request_id = ?ctx.request_id(), "SQL transaction committed");
            }
            Completion::Rollback => {
                tx.rollback().await?;
                debug!(request_id = ?ctx.request_id(), "SQL transaction rolled back");
            }
        }
        Ok(())
    }
}
