//! In-memory Product Repository

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use mos_core::{NoopUnitOfWork, RepositoryError, RequestContext, Transactional, UnitOfWork};
use parking_lot::RwLock;

use super::ProductRepository;
use crate::entity::Product;

/// Writes are applied immediately and survive a rollback.
pub struct MemoryProductRepository {
    products: RwLock<BTreeMap<String, Product>>,
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl MemoryProductRepository {
    pub fn new() -> Self {
        Self::with_unit_of_work(Arc::new(NoopUnitOfWork))
    }

    pub fn with_unit_of_work(unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self {
            products: RwLock::new(BTreeMap::new()),
            unit_of_work,
        }
    }

    pub fn len(&self) -> usize {
        self.products.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.read().is_empty()
    }

    fn check_sku(
        products: &BTreeMap<String, Product>,
        candidate: &Product,
    ) -> Result<(), RepositoryError> {
        let taken = products
            .values()
            .any(|p| p.id != candidate.id && p.sku == candidate.sku);
        if taken {
            return Err(RepositoryError::Duplicate(format!(
                "products.sku: {}",
                candidate.sku
            )));
        }
        Ok(())
    }
}

impl Default for MemoryProductRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Transactional for MemoryProductRepository {
    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.unit_of_work.as_ref()
    }
}

#[async_trait]
impl ProductRepository for MemoryProductRepository {
    async fn insert(
        &self,
        _ctx: &mut RequestContext,
        product: &Product,
    ) -> Result<(), RepositoryError> {
        let mut products = self.products.write();
        if products.contains_key(&product.id) {
            return Err(RepositoryError::Duplicate(format!(
                "products.id: {}",
                product.id
            )));
        }
        Self::check_sku(&products, product)?;
        products.insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        _ctx: &mut RequestContext,
        id: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.read().get(id).cloned())
    }

    async fn find_by_sku(
        &self,
        _ctx: &mut RequestContext,
        sku: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        Ok(self
            .products
            .read()
            .values()
            .find(|p| p.sku == sku)
            .cloned())
    }

    async fn list(
        &self,
        _ctx: &mut RequestContext,
        owner_id: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Product>, RepositoryError> {
        Ok(self
            .products
            .read()
            .values()
            .filter(|p| owner_id.map_or(true, |owner| p.owner_id == owner))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update(
        &self,
        _ctx: &mut RequestContext,
        product: &Product,
    ) -> Result<bool, RepositoryError> {
        let mut products = self.products.write();
        if !products.contains_key(&product.id) {
            return Ok(false);
        }
        Self::check_sku(&products, product)?;
        products.insert(product.id.clone(), product.clone());
        Ok(true)
    }

    async fn delete(&self, _ctx: &mut RequestContext, id: &str) -> Result<bool, RepositoryError> {
        Ok(self.products.write().remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sku_is_unique() {
        let repo = MemoryProductRepository::new();
        let mut ctx = RequestContext::new();
        repo.insert(&mut ctx, &Product::new("SKU-1", "Widget", 100, "u1"))
            .await
            .unwrap();

        let err = repo
            .insert(&mut ctx, &Product::new("SKU-1", "Gadget", 200, "u2"))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_list_filters_by_owner() {
        let repo = MemoryProductRepository::new();
        let mut ctx = RequestContext::new();
        for (sku, owner) in [("A-1", "u1"), ("B-1", "u2"), ("C-1", "u1")] {
            repo.insert(&mut ctx, &Product::new(sku, "Item", 10, owner))
                .await
                .unwrap();
        }

        let owned = repo.list(&mut ctx, Some("u1"), 0, 10).await.unwrap();
        assert_eq!(owned.len(), 2);
        assert!(owned.iter().all(|p| p.owner_id == "u1"));
        assert_eq!(repo.list(&mut ctx, None, 0, 10).await.unwrap().len(), 3);
        assert!(repo.list(&mut ctx, Some("u3"), 0, 10).await.unwrap().is_empty());
    }
}
