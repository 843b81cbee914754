//! User module errors

use mos_core::{PanicError, RepositoryError, TransactionError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("user not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(RepositoryError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Panic(#[from] PanicError),
}

impl UserError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }
}

impl From<RepositoryError> for UserError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Duplicate(detail) => {
                UserError::Conflict(format!("username or email already in use ({})", detail))
            }
            RepositoryError::NotFound(detail) => UserError::NotFound(detail),
            other => UserError::Repository(other),
        }
    }
}
