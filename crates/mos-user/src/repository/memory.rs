//! In-memory User Repository
//!
//! Non-transactional: a rollback does not undo writes made here. Intended
//! for development and tests, where the unit of work is usually a no-op.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use mos_core::{NoopUnitOfWork, RepositoryError, RequestContext, Transactional, UnitOfWork};
use parking_lot::RwLock;

use super::UserRepository;
use crate::entity::User;

pub struct MemoryUserRepository {
    users: RwLock<BTreeMap<String, User>>,
    unit_of_work: Arc<dyn UnitOfWork>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::with_unit_of_work(Arc::new(NoopUnitOfWork))
    }

    pub fn with_unit_of_work(unit_of_work: Arc<dyn UnitOfWork>) -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            unit_of_work,
        }
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }

    fn find_where(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.users.read().values().find(|u| predicate(u)).cloned()
    }

    fn check_unique(
        users: &BTreeMap<String, User>,
        candidate: &User,
    ) -> Result<(), RepositoryError> {
        for existing in users.values().filter(|u| u.id != candidate.id) {
            if existing.username == candidate.username {
                return Err(RepositoryError::Duplicate(format!(
                    "users.username: {}",
                    candidate.username
                )));
            }
            if existing.email == candidate.email {
                return Err(RepositoryError::Duplicate(format!(
                    "users.email: {}",
                    candidate.email
                )));
            }
        }
        Ok(())
    }
}

impl Default for MemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Transactional for MemoryUserRepository {
    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.unit_of_work.as_ref()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn insert(&self, _ctx: &mut RequestContext, user: &User) -> Result<(), RepositoryError> {
        let mut users = self.users.write();
        if users.contains_key(&user.id) {
            return Err(RepositoryError::Duplicate(format!("users.id: {}", user.id)));
        }
        Self::check_unique(&users, user)?;
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        _ctx: &mut RequestContext,
        id: &str,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().get(id).cloned())
    }

    async fn find_by_username(
        &self,
        _ctx: &mut RequestContext,
        username: &str,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self.find_where(|u| u.username == username))
    }

    async fn find_by_email(
        &self,
        _ctx: &mut RequestContext,
        email: &str,
    ) -> Result<Option<User>, RepositoryError> {
        Ok(self.find_where(|u| u.email == email))
    }

    async fn list(
        &self,
        _ctx: &mut RequestContext,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<User>, RepositoryError> {
        Ok(self
            .users
            .read()
            .values()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update(&self, _ctx: &mut RequestContext, user: &User) -> Result<bool, RepositoryError> {
        let mut users = self.users.write();
        if !users.contains_key(&user.id) {
            return Ok(false);
        }
        Self::check_unique(&users, user)?;
        users.insert(user.id.clone(), user.clone());
        Ok(true)
    }

    async fn delete(&self, _ctx: &mut RequestContext, id: &str) -> Result<bool, RepositoryError> {
        Ok(self.users.write().remove(id).is_some())
    }
}
