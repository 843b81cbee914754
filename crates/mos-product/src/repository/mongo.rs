//! MongoDB Product Repository

use std::sync::Arc;

use async_trait::async_trait;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use mos_core::{DocumentSession, RepositoryError, RequestContext, Transactional, UnitOfWork};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ProductRepository;
use crate::entity::Product;

const COLLECTION: &str = "products";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductDocument {
    #[serde(rename = "_id")]
    id: String,
    sku: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    price_cents: i64,
    stock: i64,
    owner_id: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
}

impl From<&Product> for ProductDocument {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            description: product.description.clone(),
            price_cents: product.price_cents,
            stock: product.stock,
            owner_id: product.owner_id.clone(),
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

impl From<ProductDocument> for Product {
    fn from(doc: ProductDocument) -> Self {
        Self {
            id: doc.id,
            sku: doc.sku,
            name: doc.name,
            description: doc.description,
            price_cents: doc.price_cents,
            stock: doc.stock,
            owner_id: doc.owner_id,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

pub struct MongoProductRepository {
    collection: Collection<ProductDocument>,
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl MongoProductRepository {
    pub fn new(db: &Database, unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self {
            collection: db.collection(COLLECTION),
            unit_of_work,
        }
    }

    pub async fn init_indexes(&self) -> Result<(), RepositoryError> {
        let sku = IndexModel::builder()
            .keys(doc! { "sku": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let owner = IndexModel::builder().keys(doc! { "ownerId": 1 }).build();
        self.collection.create_indexes([sku, owner]).await?;

        debug!(collection = COLLECTION, "Ensured product indexes");
        Ok(())
    }

    async fn find_one_by(
        &self,
        ctx: &mut RequestContext,
        filter: Document,
    ) -> Result<Option<Product>, RepositoryError> {
        let found = match DocumentSession::active(ctx) {
            Some(session) => self.collection.find_one(filter).session(session).await?,
            None => self.collection.find_one(filter).await?,
        };
        Ok(found.map(Product::from))
    }
}

impl Transactional for MongoProductRepository {
    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.unit_of_work.as_ref()
    }
}

#[async_trait]
impl ProductRepository for MongoProductRepository {
    async fn insert(
        &self,
        ctx: &mut RequestContext,
        product: &Product,
    ) -> Result<(), RepositoryError> {
        let document = ProductDocument::from(product);
        match DocumentSession::active(ctx) {
            Some(session) => {
                self.collection.insert_one(&document).session(session).await?;
            }
            None => {
                self.collection.insert_one(&document).await?;
            }
        }
        debug!(product_id = %product.id, "Inserted product document");
        Ok(())
    }

    async fn find_by_id(
        &self,
        ctx: &mut RequestContext,
        id: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        self.find_one_by(ctx, doc! { "_id": id }).await
    }

    async fn find_by_sku(
        &self,
        ctx: &mut RequestContext,
        sku: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        self.find_one_by(ctx, doc! { "sku": sku }).await
    }

    async fn list(
        &self,
        ctx: &mut RequestContext,
        owner_id: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Product>, RepositoryError> {
        let filter = match owner_id {
            Some(owner_id) => doc! { "ownerId": owner_id },
            None => doc! {},
        };
        let find = self
            .collection
            .find(filter)
            .sort(doc! { "_id": 1 })
            .skip(offset)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX));

        let documents: Vec<ProductDocument> = match DocumentSession::active(ctx) {
            Some(session) => {
                let mut cursor = find.session(&mut *session).await?;
                cursor.stream(session).try_collect().await?
            }
            None => find.await?.try_collect().await?,
        };
        Ok(documents.into_iter().map(Product::from).collect())
    }

    async fn update(
        &self,
        ctx: &mut RequestContext,
        product: &Product,
    ) -> Result<bool, RepositoryError> {
        let document = ProductDocument::from(product);
        let filter = doc! { "_id": &product.id };
        let result = match DocumentSession::active(ctx) {
            Some(session) => {
                self.collection
                    .replace_one(filter, &document)
                    .session(session)
                    .await?
            }
            None => self.collection.replace_one(filter, &document).await?,
        };
        Ok(result.matched_count > 0)
    }

    async fn delete(&self, ctx: &mut RequestContext, id: &str) -> Result<bool, RepositoryError> {
        let filter = doc! { "_id": id };
        let result = match DocumentSession::active(ctx) {
            Some(session) => self.collection.delete_one(filter).session(session).await?,
            None => self.collection.delete_one(filter).await?,
        };
        Ok(result.deleted_count > 0)
    }
}
