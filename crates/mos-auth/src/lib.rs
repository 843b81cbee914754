//! Mosaic Auth Module
//!
//! Password credentials and bearer sessions. User accounts belong to the
//! user module; this crate reaches them only through the
//! [`acl::UserProvisioner`] contract, and learns about deleted users from
//! the `user.deleted` event (see [`subscriber`]).

pub mod acl;
pub mod entity;
pub mod error;
pub mod events;
pub mod password;
pub mod repository;
pub mod service;
pub mod subscriber;

pub use acl::{AclError, NewUserRequest, UserProvisioner};
pub use entity::{Credential, Registration, RegisterRequest, Session, SessionGrant};
pub use error::AuthError;
pub use password::{Argon2Config, PasswordPolicy, PasswordService};
pub use repository::{
    CredentialRepository, MemoryCredentialRepository, MemorySessionRepository,
    MongoCredentialRepository, MongoSessionRepository, SessionRepository,
    SqlCredentialRepository, SqlSessionRepository,
};
pub use service::AuthService;
pub use subscriber::RevokeOnUserDeleted;
