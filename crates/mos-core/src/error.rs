//! Error taxonomy shared by every module.
//!
//! Modules wrap these in their own error enums; the variants here only
//! describe what went wrong at the storage and transaction layer.

use thiserror::Error;

/// Failure to begin, commit or roll back a datastore transaction.
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("sql transaction error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("document session error: {0}")]
    Document(#[from] mongodb::error::Error),

    #[error("a {0} transaction is already active on this context")]
    AlreadyStarted(&'static str),

    #[error("{backend} backend error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
}

impl TransactionError {
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend,
            message: message.into(),
        }
    }
}

/// Failure inside a repository call.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("sql error: {0}")]
    Sql(sqlx::Error),

    #[error("document store error: {0}")]
    Document(mongodb::error::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl RepositoryError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, RepositoryError::Duplicate(_))
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Duplicate(db.message().to_string())
            }
            _ => RepositoryError::Sql(err),
        }
    }
}

/// MongoDB reports unique index violations as code 11000, either as a
/// write error or (inside transactions) as a command error.
const DUPLICATE_KEY_CODE: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(command) => command.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

impl From<mongodb::error::Error> for RepositoryError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err) {
            RepositoryError::Duplicate(err.to_string())
        } else {
            RepositoryError::Document(err)
        }
    }
}

impl From<bson::ser::Error> for RepositoryError {
    fn from(err: bson::ser::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<bson::de::Error> for RepositoryError {
    fn from(err: bson::de::Error) -> Self {
        RepositoryError::Corrupt(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

/// A service body panicked. The message is whatever the panic carried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("operation panicked: {message}")]
pub struct PanicError {
    pub message: String,
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error(
        "{count} handler(s) failed for {event}: {joined}",
        count = .failures.len(),
        joined = .failures.join("; ")
    )]
    HandlerFailed {
        event: String,
        failures: Vec<String>,
    },
}
