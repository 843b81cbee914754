//! Auth module errors

use mos_core::{PanicError, RepositoryError, TransactionError};
use thiserror::Error;

use crate::acl::AclError;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown username, wrong password or revoked credential. Deliberately
    /// does not say which.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("user directory unavailable: {0}")]
    Unavailable(String),

    #[error("password hashing failed: {0}")]
    Password(String),

    #[error(transparent)]
    Repository(RepositoryError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Panic(#[from] PanicError),
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Duplicate(detail) => {
                AuthError::Conflict(format!("credential already exists ({})", detail))
            }
            RepositoryError::NotFound(detail) => AuthError::NotFound(detail),
            other => AuthError::Repository(other),
        }
    }
}

impl From<AclError> for AuthError {
    fn from(err: AclError) -> Self {
        match err {
            AclError::Conflict(detail) => AuthError::Conflict(detail),
            AclError::Invalid(detail) => AuthError::Validation(detail),
            AclError::Unavailable(detail) => AuthError::Unavailable(detail),
        }
    }
}
