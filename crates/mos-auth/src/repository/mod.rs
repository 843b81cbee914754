//! Credential and Session Repositories

mod memory;
mod mongo;
mod sql;

pub use memory::{MemoryCredentialRepository, MemorySessionRepository};
pub use mongo::{MongoCredentialRepository, MongoSessionRepository};
pub use sql::{SqlCredentialRepository, SqlSessionRepository};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mos_core::{RepositoryError, RequestContext, Transactional};

use crate::entity::{Credential, Session};

#[async_trait]
pub trait CredentialRepository: Transactional {
    async fn insert(
        &self,
        ctx: &mut RequestContext,
        credential: &Credential,
    ) -> Result<(), RepositoryError>;

    async fn find_by_user_id(
        &self,
        ctx: &mut RequestContext,
        user_id: &str,
    ) -> Result<Option<Credential>, RepositoryError>;

    async fn find_by_username(
        &self,
        ctx: &mut RequestContext,
        username: &str,
    ) -> Result<Option<Credential>, RepositoryError>;

    async fn update(
        &self,
        ctx: &mut RequestContext,
        credential: &Credential,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Transactional {
    async fn insert(&self, ctx: &mut RequestContext, session: &Session)
        -> Result<(), RepositoryError>;

    async fn find_by_token_hash(
        &self,
        ctx: &mut RequestContext,
        token_hash: &str,
    ) -> Result<Option<Session>, RepositoryError>;

    /// Mark one session revoked. `false` if it was missing or already revoked.
    async fn revoke(
        &self,
        ctx: &mut RequestContext,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Revoke every live session of a user; returns how many changed.
    async fn revoke_for_user(
        &self,
        ctx: &mut RequestContext,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError>;
}
