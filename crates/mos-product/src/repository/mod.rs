//! Product Repository

mod memory;
mod mongo;
mod sql;

pub use memory::MemoryProductRepository;
pub use mongo::MongoProductRepository;
pub use sql::SqlProductRepository;

use async_trait::async_trait;
use mos_core::{RepositoryError, RequestContext, Transactional};

use crate::entity::Product;

#[async_trait]
pub trait ProductRepository: Transactional {
    async fn insert(&self, ctx: &mut RequestContext, product: &Product)
        -> Result<(), RepositoryError>;

    async fn find_by_id(
        &self,
        ctx: &mut RequestContext,
        id: &str,
    ) -> Result<Option<Product>, RepositoryError>;

    async fn find_by_sku(
        &self,
        ctx: &mut RequestContext,
        sku: &str,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Products ordered by id, optionally restricted to one owner.
    async fn list(
        &self,
        ctx: &mut RequestContext,
        owner_id: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn update(&self, ctx: &mut RequestContext, product: &Product)
        -> Result<bool, RepositoryError>;

    async fn delete(&self, ctx: &mut RequestContext, id: &str) -> Result<bool, RepositoryError>;
}
