//! Product module errors

use mos_core::{PanicError, RepositoryError, TransactionError};
use thiserror::Error;

use crate::acl::AclError;

#[derive(Error, Debug)]
pub enum ProductError {
    #[error("product not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("insufficient stock for {sku}: {available} available, {requested} requested")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    #[error(transparent)]
    Acl(#[from] AclError),

    #[error(transparent)]
    Repository(RepositoryError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Panic(#[from] PanicError),
}

impl ProductError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }
}

impl From<RepositoryError> for ProductError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Duplicate(detail) => {
                ProductError::Conflict(format!("sku already in use ({})", detail))
            }
            RepositoryError::NotFound(detail) => ProductError::NotFound(detail),
            other => ProductError::Repository(other),
        }
    }
}
