//! In-memory Credential and Session Repositories
//!
//! Non-transactional, for development and tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mos_core::{NoopUnitOfWork, RepositoryError, RequestContext, Transactional, UnitOfWork};
use parking_lot::RwLock;

use super::{CredentialRepository, SessionRepository};
use crate::entity::{Credential, Session};

pub struct MemoryCredentialRepository {
    credentials: RwLock<BTreeMap<String, Credential>>,
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl MemoryCredentialRepository {
    pub fn new() -> Self {
        Self::with_unit_of_work(Arc::new(NoopUnitOfWork))
    }

    pub fn with_unit_of_work(unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self {
            credentials: RwLock::new(BTreeMap::new()),
            unit_of_work,
        }
    }

    fn find_where(&self, predicate: impl Fn(&Credential) -> bool) -> Option<Credential> {
        self.credentials
            .read()
            .values()
            .find(|c| predicate(c))
            .cloned()
    }
}

impl Default for MemoryCredentialRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Transactional for MemoryCredentialRepository {
    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.unit_of_work.as_ref()
    }
}

#[async_trait]
impl CredentialRepository for MemoryCredentialRepository {
    async fn insert(
        &self,
        _ctx: &mut RequestContext,
        credential: &Credential,
    ) -> Result<(), RepositoryError> {
        let mut credentials = self.credentials.write();
        for existing in credentials.values() {
            if existing.id == credential.id || existing.user_id == credential.user_id {
                return Err(RepositoryError::Duplicate(format!(
                    "credentials.user_id: {}",
                    credential.user_id
                )));
            }
            if existing.username == credential.username {
                return Err(RepositoryError::Duplicate(format!(
                    "credentials.username: {}",
                    credential.username
                )));
            }
        }
        credentials.insert(credential.id.clone(), credential.clone());
        Ok(())
    }

    async fn find_by_user_id(
        &self,
        _ctx: &mut RequestContext,
        user_id: &str,
    ) -> Result<Option<Credential>, RepositoryError> {
        Ok(self.find_where(|c| c.user_id == user_id))
    }

    async fn find_by_username(
        &self,
        _ctx: &mut RequestContext,
        username: &str,
    ) -> Result<Option<Credential>, RepositoryError> {
        Ok(self.find_where(|c| c.username == username))
    }

    async fn update(
        &self,
        _ctx: &mut RequestContext,
        credential: &Credential,
    ) -> Result<bool, RepositoryError> {
        let mut credentials = self.credentials.write();
        match credentials.get_mut(&credential.id) {
            Some(existing) => {
                existing.password_hash = credential.password_hash.clone();
                existing.active = credential.active;
                existing.deleted_at = credential.deleted_at;
                existing.updated_at = credential.updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub struct MemorySessionRepository {
    sessions: RwLock<BTreeMap<String, Session>>,
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::with_unit_of_work(Arc::new(NoopUnitOfWork))
    }

    pub fn with_unit_of_work(unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            unit_of_work,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for MemorySessionRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Transactional for MemorySessionRepository {
    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.unit_of_work.as_ref()
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn insert(
        &self,
        _ctx: &mut RequestContext,
        session: &Session,
    ) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write();
        if sessions
            .values()
            .any(|s| s.id == session.id || s.token_hash == session.token_hash)
        {
            return Err(RepositoryError::Duplicate(format!(
                "sessions.token_hash: {}",
                session.id
            )));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn find_by_token_hash(
        &self,
        _ctx: &mut RequestContext,
        token_hash: &str,
    ) -> Result<Option<Session>, RepositoryError> {
        Ok(self
            .sessions
            .read()
            .values()
            .find(|s| s.token_hash == token_hash)
            .cloned())
    }

    async fn revoke(
        &self,
        _ctx: &mut RequestContext,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut sessions = self.sessions.write();
        match sessions.get_mut(id) {
            Some(session) if session.revoked_at.is_none() => {
                session.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_for_user(
        &self,
        _ctx: &mut RequestContext,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut revoked = 0;
        for session in self.sessions.write().values_mut() {
            if session.user_id == user_id && session.revoked_at.is_none() {
                session.revoked_at = Some(at);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
