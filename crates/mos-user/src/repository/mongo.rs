//! MongoDB User Repository

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

use super::UserRepository;
use crate::entity::User;

const COLLECTION: &str = "users";

/// Stored shape of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    #[serde(rename = "_id")]
    id: String,
    username: String,
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    active: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
}

impl From<&User> for UserDocument {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            active: user.active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        Self {
            id: doc.id,
            username: doc.username,
            email: doc.email,
            display_name: doc.display_name,
            active: doc.active,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

pub struct MongoUserRepository {
    collection: Collection<UserDocument>,
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl MongoUserRepository {
    pub fn new(db: &Database, unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self {
            collection: db.collection(COLLECTION),
            unit_of_work,
        }
    }

    /// Unique indexes backing the username and email invariants
    pub async fn init_indexes(&self) -> Result<(), RepositoryError> {
        for field in ["username", "email"] {
            let mut keys = Document::new();
            keys.insert(field, 1);
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build();
            self.collection.create_index(index).await?;
        }
        debug!(collection = COLLECTION, "Ensured user indexes");
        Ok(())
    }

    async fn find_one_by(
        &self,
        ctx: &mut RequestContext,
        filter: Document,
    ) -> Result<Option<User>, RepositoryError> {
        let found = match DocumentSession::active(ctx) {
            Some(session) => self.collection.find_one(filter).session(session).await?,
            None => self.collection.find_one(filter).await?,
        };
        Ok(found.map(User::from))
    }
}

impl Transactional for MongoUserRepository {
    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.unit_of_work.as_ref()
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn insert(&self, ctx: &mut RequestContext, user: &User) -> Result<(), RepositoryError> {
        let document = UserDocument::from(user);
        match DocumentSession::active(ctx) {
            Some(session) => {
                self.collection.insert_one(&document).session(session).await?;
            }
            None => {
                self.collection.insert_one(&document).await?;
            }
        }
        debug!(user_id = %user.id, "Inserted user document");
        Ok(())
    }

    async fn find_by_id(
        &self,
        ctx: &mut RequestContext,
        id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.find_one_by(ctx, doc! { "_id": id }).await
    }

    async fn find_by_username(
        &self,
        ctx: &mut RequestContext,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.find_one_by(ctx, doc! { "username": username }).await
    }

    async fn find_by_email(
        &self,
        ctx: &mut RequestContext,
        email: &str,
    ) -> Result<Option<User>, RepositoryError> {
        self.find_one_by(ctx, doc! { "email": email }).await
    }

    async fn list(
        &self,
        ctx: &mut RequestContext,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<User>, RepositoryError> {
        let find = self
            .collection
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .skip(offset)
            .limit(i64::try_from(limit).unwrap_or(i64::MAX));

        let documents: Vec<UserDocument> = match DocumentSession::active(ctx) {
            Some(session) => {
                let mut cursor = find.session(&mut *session).await?;
                cursor.stream(session).try_collect().await?
            }
            None => find.await?.try_collect().await?,
        };
        Ok(documents.into_iter().map(User::from).collect())
    }

    async fn update(&self, ctx: &mut RequestContext, user: &User) -> Result<bool, RepositoryError> {
        let document = UserDocument::from(user);
        let filter = doc! { "_id": &user.id };
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
