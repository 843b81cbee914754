//! Product Domain Events

use mos_core::events::EventMetadata;
use mos_core::{impl_domain_event, RequestContext};
use serde::Serialize;

use crate::entity::Product;

pub const PRODUCT_CREATED: &str = "product.created";
pub const PRODUCT_UPDATED: &str = "product.updated";
pub const PRODUCT_STOCK_ADJUSTED: &str = "product.stock-adjusted";
pub const PRODUCT_DELETED: &str = "product.deleted";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreated {
    #[serde(skip)]
    pub metadata: EventMetadata,
    pub product_id: String,
    pub sku: String,
    pub owner_id: String,
    pub price_cents: i64,
}

impl_domain_event!(ProductCreated, PRODUCT_CREATED);

impl ProductCreated {
    pub fn new(ctx: &RequestContext, product: &Product) -> Self {
        Self {
            metadata: EventMetadata::from_context(ctx),
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            owner_id: product.owner_id.clone(),
            price_cents: product.price_cents,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdated {
    #[serde(skip)]
    pub metadata: EventMetadata,
    pub product_id: String,
    pub changed: Vec<&'static str>,
}

impl_domain_event!(ProductUpdated, PRODUCT_UPDATED);

impl ProductUpdated {
    pub fn new(ctx: &RequestContext, product: &Product, changed: Vec<&'static str>) -> Self {
        Self {
            metadata: EventMetadata::from_context(ctx),
            product_id: product.id.clone(),
            changed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockAdjusted {
    #[serde(skip)]
    pub metadata: EventMetadata,
    pub product_id: String,
    pub sku: String,
    pub delta: i64,
    pub stock: i64,
}

impl_domain_event!(StockAdjusted, PRODUCT_STOCK_ADJUSTED);

impl StockAdjusted {
    pub fn new(ctx: &RequestContext, product: &Product, delta: i64) -> Self {
        Self {
            metadata: EventMetadata::from_context(ctx),
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            delta,
            stock: product.stock,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDeleted {
    #[serde(skip)]
    pub metadata: EventMetadata,
    pub product_id: String,
    pub sku: String,
}

impl_domain_event!(ProductDeleted, PRODUCT_DELETED);

impl ProductDeleted {
    pub fn new(ctx: &RequestContext, product: &Product) -> Self {
        Self {
            metadata: EventMetadata::from_context(ctx),
            product_id: product.id.clone(),
            sku: product.sku.clone(),
        }
    }
}
