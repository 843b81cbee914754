//! User Repository
//!
//! One trait, three backends. Every call takes the request context so the
//! SQL and document backends can join a transaction opened by the unit of
//! work; the memory backend ignores it.

mod memory;
mod mongo;
mod sql;

pub use memory::MemoryUserRepository;
pub use mongo::MongoUserRepository;
pub use sql::SqlUserRepository;

use async_trait::async_trait;
use mos_core::{RepositoryError, RequestContext, Transactional};

use crate::entity::User;

#[async_trait]
pub trait UserRepository: Transactional {
    async fn insert(&self, ctx: &mut RequestContext, user: &User) -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        ctx: &mut RequestContext,
        id: &str,
    ) -> Result<Option<User>, RepositoryError>;

    async fn find_by_username(
        &self,
        ctx: &mut RequestContext,
        username: &str,
    ) -> Result<Option<User>, RepositoryError>;

    async fn find_by_email(
        &self,
        ctx: &mut RequestContext,
        email: &str,
    ) -> Result<Option<User>, RepositoryError>;

    /// Users ordered by id (creation order).
    async fn list(
        &self,
        ctx: &mut RequestContext,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<User>, RepositoryError>;

    /// Replace a stored user. Returns false if no user has that id.
    async fn update(&self, ctx: &mut RequestContext, user: &User) -> Result<bool, RepositoryError>;

    /// Returns false if no user has that id.
    async fn delete(&self, ctx: &mut RequestContext, id: &str) -> Result<bool, RepositoryError>;
}
