//! MongoDB Credential and Session Repositories

use std::sync::Arc;

use async_trait::async_trait;
use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use mos_core::{DocumentSession, RepositoryError, RequestContext, Transactional, UnitOfWork};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CredentialRepository, SessionRepository};
use crate::entity::{Credential, Session};

const CREDENTIALS: &str = "credentials";
const SESSIONS: &str = "sessions";

fn unique_index(field: &str) -> IndexModel {
    let mut keys = Document::new();
    keys.insert(field, 1);
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialDocument {
    #[serde(rename = "_id")]
    id: String,
    user_id: String,
    username: String,
    password_hash: String,
    #[serde(default = "default_active")]
    active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deleted_at: Option<bson::DateTime>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl From<&Credential> for CredentialDocument {
    fn from(credential: &Credential) -> Self {
        Self {
            id: credential.id.clone(),
            user_id: credential.user_id.clone(),
            username: credential.username.clone(),
            password_hash: credential.password_hash.clone(),
            active: credential.active,
            deleted_at: credential.deleted_at.map(bson::DateTime::from_chrono),
            created_at: credential.created_at,
            updated_at: credential.updated_at,
        }
    }
}

impl From<CredentialDocument> for Credential {
    fn from(doc: CredentialDocument) -> Self {
        Self {
            id: doc.id,
            user_id: doc.user_id,
            username: doc.username,
            password_hash: doc.password_hash,
            active: doc.active,
            deleted_at: doc.deleted_at.map(|at| at.to_chrono()),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

pub struct MongoCredentialRepository {
    collection: Collection<CredentialDocument>,
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl MongoCredentialRepository {
    pub fn new(db: &Database, unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self {
            collection: db.collection(CREDENTIALS),
            unit_of_work,
        }
    }

    pub async fn init_indexes(&self) -> Result<(), RepositoryError> {
        self.collection
            .create_indexes([unique_index("userId"), unique_index("username")])
            .await?;
        debug!(collection = CREDENTIALS, "Ensured credential indexes");
        Ok(())
    }

    async fn find_one_by(
        &self,
        ctx: &mut RequestContext,
        filter: Document,
    ) -> Result<Option<Credential>, RepositoryError> {
        let found = match DocumentSession::active(ctx) {
            Some(session) => self.collection.find_one(filter).session(session).await?,
            None => self.collection.find_one(filter).await?,
        };
        Ok(found.map(Credential::from))
    }
}

impl Transactional for MongoCredentialRepository {
    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.unit_of_work.as_ref()
    }
}

#[async_trait]
impl CredentialRepository for MongoCredentialRepository {
    async fn insert(
        &self,
        ctx: &mut RequestContext,
        credential: &Credential,
    ) -> Result<(), RepositoryError> {
        let document = CredentialDocument::from(credential);
        match DocumentSession::active(ctx) {
            Some(session) => {
                self.collection.insert_one(&document).session(session).await?;
            }
            None => {
                self.collection.insert_one(&document).await?;
            }
        }
        Ok(())
    }

    async fn find_by_user_id(
        &self,
        ctx: &mut RequestContext,
        user_id: &str,
    ) -> Result<Option<Credential>, RepositoryError> {
        self.find_one_by(ctx, doc! { "userId": user_id }).await
    }

    async fn find_by_username(
        &self,
        ctx: &mut RequestContext,
        username: &str,
    ) -> Result<Option<Credential>, RepositoryError> {
        self.find_one_by(ctx, doc! { "username": username }).await
    }

    async fn update(
        &self,
        ctx: &mut RequestContext,
        credential: &Credential,
    ) -> Result<bool, RepositoryError> {
        let document = CredentialDocument::from(credential);
        let filter = doc! { "_id": &credential.id };
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
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionDocument {
    #[serde(rename = "_id")]
    id: String,
    user_id: String,
    token_hash: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revoked_at: Option<bson::DateTime>,
}

impl From<&Session> for SessionDocument {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            user_id: session.user_id.clone(),
            token_hash: session.token_hash.clone(),
            created_at: session.created_at,
            expires_at: session.expires_at,
            revoked_at: session.revoked_at.map(bson::DateTime::from_chrono),
        }
    }
}

impl From<SessionDocument> for Session {
    fn from(doc: SessionDocument) -> Self {
        Self {
            id: doc.id,
            user_id: doc.user_id,
            token_hash: doc.token_hash,
            created_at: doc.created_at,
            expires_at: doc.expires_at,
            revoked_at: doc.revoked_at.map(|at| at.to_chrono()),
        }
    }
}

pub struct MongoSessionRepository {
    collection: Collection<SessionDocument>,
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl MongoSessionRepository {
    pub fn new(db: &Database, unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self {
            collection: db.collection(SESSIONS),
            unit_of_work,
        }
    }

    pub async fn init_indexes(&self) -> Result<(), RepositoryError> {
        let by_user = IndexModel::builder().keys(doc! { "userId": 1 }).build();
        self.collection
            .create_indexes([unique_index("tokenHash"), by_user])
            .await?;
        debug!(collection = SESSIONS, "Ensured session indexes");
        Ok(())
    }

    async fn revoke_where(
        &self,
        ctx: &mut RequestContext,
        mut filter: Document,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        filter.insert("revokedAt", bson::Bson::Null);
        let update = doc! { "$set": { "revokedAt": bson::DateTime::from_chrono(at) } };
        let result = match DocumentSession::active(ctx) {
            Some(session) => {
                self.collection
                    .update_many(filter, update)
                    .session(session)
                    .await?
            }
            None => self.collection.update_many(filter, update).await?,
        };
        Ok(result.modified_count)
    }
}

impl Transactional for MongoSessionRepository {
    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.unit_of_work.as_ref()
    }
}

#[async_trait]
impl SessionRepository for MongoSessionRepository {
    async fn insert(
        &self,
        ctx: &mut RequestContext,
        session: &Session,
    ) -> Result<(), RepositoryError> {
        let document = SessionDocument::from(session);
        match DocumentSession::active(ctx) {
            Some(client_session) => {
                self.collection
                    .insert_one(&document)
                    .session(client_session)
                    .await?;
            }
            None => {
                self.collection.insert_one(&document).await?;
            }
        }
        Ok(())
    }

    async fn find_by_token_hash(
        &self,
        ctx: &mut RequestContext,
        token_hash: &str,
    ) -> Result<Option<Session>, RepositoryError> {
        let filter = doc! { "tokenHash": token_hash };
        let found = match DocumentSession::active(ctx) {
            Some(session) => self.collection.find_one(filter).session(session).await?,
            None => self.collection.find_one(filter).await?,
        };
        Ok(found.map(Session::from))
    }

    async fn revoke(
        &self,
        ctx: &mut RequestContext,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        Ok(self.revoke_where(ctx, doc! { "_id": id }, at).await? > 0)
    }

    async fn revoke_for_user(
        &self,
        ctx: &mut RequestContext,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        self.revoke_where(ctx, doc! { "userId": user_id }, at).await
    }
}
