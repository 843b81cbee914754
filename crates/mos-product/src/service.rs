//! Product Service
//!
//! Mutations require an authenticated caller (`USER_ID` on the context).
//! Creating a product asks the owner directory whether the caller is an
//! active user; changing or deleting one is limited to its owner.

use std::sync::Arc;

use chrono::Utc;
use mos_core::{catch_panic, EventBus, RequestContext, UnitOfWork, UnitOfWorkExt};
use tracing::{debug, info};

use crate::acl::OwnerDirectory;
use crate::entity::{NewProduct, Product, ProductUpdate};
use crate::error::ProductError;
use crate::events::{ProductCreated, ProductDeleted, ProductUpdated, StockAdjusted};
use crate::repository::ProductRepository;
use crate::validation::{check_price, normalize_description, normalize_name, normalize_sku};

const MAX_PAGE_SIZE: u64 = 100;

pub struct ProductService {
    products: Arc<dyn ProductRepository>,
    owners: Arc<dyn OwnerDirectory>,
    events: Arc<dyn EventBus>,
}

impl ProductService {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        owners: Arc<dyn OwnerDirectory>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            products,
            owners,
            events,
        }
    }

    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.products.unit_of_work()
    }

    async fn complete<T: Send>(
        &self,
        ctx: &mut RequestContext,
        result: Result<T, ProductError>,
    ) -> Result<T, ProductError> {
        let result = self.unit_of_work().defer_error_context(ctx, result).await;
        if result.is_ok() {
            self.events.publish_pending(ctx).await;
        }
        result
    }

    fn caller(ctx: &RequestContext) -> Result<String, ProductError> {
        ctx.user_id()
            .map(String::from)
            .ok_or_else(|| ProductError::Forbidden("authentication required".to_string()))
    }

    /// Load a product and check the caller owns it.
    async fn owned(&self, ctx: &mut RequestContext, id: &str) -> Result<Product, ProductError> {
        let caller = Self::caller(ctx)?;
        let product = self.get_product(ctx, id).await?;
        if product.owner_id != caller {
            return Err(ProductError::Forbidden(format!(
                "product {} belongs to another user",
                product.id
            )));
        }
        Ok(product)
    }

    pub async fn create_product(
        &self,
        ctx: &mut RequestContext,
        request: NewProduct,
    ) -> Result<Product, ProductError> {
        self.unit_of_work().start_context(ctx).await?;
        let result = catch_panic(self.insert(ctx, request)).await;
        self.complete(ctx, result).await
    }

    async fn insert(
        &self,
        ctx: &mut RequestContext,
        request: NewProduct,
    ) -> Result<Product, ProductError> {
        let owner_id = Self::caller(ctx)?;
        let sku = normalize_sku(&request.sku)?;
        let name = normalize_name(&request.name)?;
        let price_cents = check_price(request.price_cents)?;
        if request.stock < 0 {
            return Err(ProductError::Validation(
                "initial stock must not be negative".to_string(),
            ));
        }

        if !self.owners.is_active_user(ctx, &owner_id).await? {
            return Err(ProductError::Forbidden(format!(
                "user {} is not an active user",
                owner_id
            )));
        }
        if self.products.find_by_sku(ctx, &sku).await?.is_some() {
            return Err(ProductError::Conflict(format!(
                "sku '{}' is already in use",
                sku
            )));
        }

        let mut product = Product::new(sku, name, price_cents, owner_id);
        product.description = normalize_description(request.description.as_deref());
        product.stock = request.stock;

        self.products.insert(ctx, &product).await?;
        let event = ProductCreated::new(ctx, &product);
        ctx.record_event(event);

        info!(product_id = %product.id, sku = %product.sku, "Product created");
        Ok(product)
    }

    pub async fn get_product(
        &self,
        ctx: &mut RequestContext,
        id: &str,
    ) -> Result<Product, ProductError> {
        self.products
            .find_by_id(ctx, id)
            .await?
            .ok_or_else(|| ProductError::not_found(id))
    }

    /// Page through products in creation order, optionally for one owner.
    pub async fn list_products(
        &self,
        ctx: &mut RequestContext,
        owner_id: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Product>, ProductError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        Ok(self.products.list(ctx, owner_id, offset, limit).await?)
    }

    pub async fn update_product(
        &self,
        ctx: &mut RequestContext,
        id: &str,
        update: ProductUpdate,
    ) -> Result<Product, ProductError> {
        self.unit_of_work().start_context(ctx).await?;
        let result = catch_panic(self.apply_update(ctx, id, update)).await;
        self.complete(ctx, result).await
    }

    async fn apply_update(
        &self,
        ctx: &mut RequestContext,
        id: &str,
        update: ProductUpdate,
    ) -> Result<Product, ProductError> {
        let mut product = self.owned(ctx, id).await?;
        let mut changed = Vec::new();

        if let Some(name) = update.name.as_deref() {
            let name = normalize_name(name)?;
            if name != product.name {
                product.name = name;
                changed.push("name");
            }
        }
        if let Some(description) = update.description.as_deref() {
            let description = normalize_description(Some(description));
            if description != product.description {
                product.description = description;
                changed.push("description");
            }
        }
        if let Some(price_cents) = update.price_cents {
            let price_cents = check_price(price_cents)?;
            if price_cents != product.price_cents {
                product.price_cents = price_cents;
                changed.push("priceCents");
            }
        }

        if changed.is_empty() {
            debug!(product_id = %product.id, "Update changed nothing");
            return Ok(product);
        }

        product.updated_at = Utc::now();
        if !self.products.update(ctx, &product).await? {
            return Err(ProductError::not_found(id));
        }
        let event = ProductUpdated::new(ctx, &product, changed);
        ctx.record_event(event);

        info!(product_id = %product.id, "Product updated");
        Ok(product)
    }

    /// Add `delta` units (negative to remove). The resulting stock may not
    /// drop below zero.
    pub async fn adjust_stock(
        &self,
        ctx: &mut RequestContext,
        id: &str,
        delta: i64,
    ) -> Result<Product, ProductError> {
        self.unit_of_work().start_context(ctx).await?;
        let result = catch_panic(self.apply_stock(ctx, id, delta)).await;
        self.complete(ctx, result).await
    }

    async fn apply_stock(
        &self,
        ctx: &mut RequestContext,
        id: &str,
        delta: i64,
    ) -> Result<Product, ProductError> {
        if delta == 0 {
            return Err(ProductError::Validation(
                "stock adjustment must be non-zero".to_string(),
            ));
        }
        let mut product = self.owned(ctx, id).await?;

        let stock = match product.stock.checked_add(delta) {
            Some(stock) if stock >= 0 => stock,
            _ => {
                return Err(ProductError::InsufficientStock {
                    sku: product.sku,
                    available: product.stock,
                    requested: delta.saturating_neg(),
                })
            }
        };

        product.stock = stock;
        product.updated_at = Utc::now();
        if !self.products.update(ctx, &product).await? {
            return Err(ProductError::not_found(id));
        }
        let event = StockAdjusted::new(ctx, &product, delta);
        ctx.record_event(event);

        info!(product_id = %product.id, delta, stock, "Stock adjusted");
        Ok(product)
    }

    pub async fn delete_product(
        &self,
        ctx: &mut RequestContext,
        id: &str,
    ) -> Result<Product, ProductError> {
        self.unit_of_work().start_context(ctx).await?;
        let result = catch_panic(self.remove(ctx, id)).await;
        self.complete(ctx, result).await
    }

    async fn remove(&self, ctx: &mut RequestContext, id: &str) -> Result<Product, ProductError> {
        let product = self.owned(ctx, id).await?;
        if !self.products.delete(ctx, id).await? {
            return Err(ProductError::not_found(id));
        }
        let event = ProductDeleted::new(ctx, &product);
        ctx.record_event(event);

        info!(product_id = %product.id, "Product deleted");
        Ok(product)
    }
}
