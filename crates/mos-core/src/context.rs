//! Request Context
//!
//! A `RequestContext` is created once per inbound request and threaded by
//! `&mut` reference through services and repositories. It carries:
//!
//! - transaction handles attached by a [`UnitOfWork`](crate::UnitOfWork)
//!   (one per backend, stored under distinct keys so they compose)
//! - cross-cutting values such as the request id and the authenticated user
//! - domain events recorded by a service, waiting to be published after commit
//!
//! Values are stored under typed keys. Reading a key with a type other than
//! the one it was stored with yields `None`, never a panic.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::events::DomainEvent;
use crate::unit_of_work::{DocumentSession, SqlTransaction};

/// Typed key into a [`RequestContext`].
pub struct ContextKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextKey").field(&self.name).finish()
    }
}

/// Open relational transaction attached by `SqlUnitOfWork`.
pub const SQL_TRANSACTION: ContextKey<SqlTransaction> = ContextKey::new("mosaic.sql-transaction");

/// Open document session attached by `DocumentUnitOfWork`.
pub const DOCUMENT_SESSION: ContextKey<DocumentSession> =
    ContextKey::new("mosaic.document-session");

pub const REQUEST_ID: ContextKey<String> = ContextKey::new("mosaic.request-id");

/// Authenticated user, set once a session token has been verified.
pub const USER_ID: ContextKey<String> = ContextKey::new("mosaic.user-id");

type Value = Box<dyn Any + Send + Sync>;

#[derive(Default)]
pub struct RequestContext {
    values: HashMap<&'static str, Value>,
    pending_events: Vec<Arc<dyn DomainEvent>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context tagged with a request id.
    pub fn for_request(request_id: impl Into<String>) -> Self {
        Self::new().with(REQUEST_ID, request_id.into())
    }

    /// Attach a value, consuming and returning the context.
    pub fn with<T: Send + Sync + 'static>(mut self, key: ContextKey<T>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    /// Attach a value in place, replacing any previous value under the key.
    pub fn insert<T: Send + Sync + 'static>(&mut self, key: ContextKey<T>, value: T) {
        self.values.insert(key.name, Box::new(value));
    }

    pub fn get<T: 'static>(&self, key: &ContextKey<T>) -> Option<&T> {
        self.retrieve(key.name)
    }

    pub fn get_mut<T: 'static>(&mut self, key: &ContextKey<T>) -> Option<&mut T> {
        self.values
            .get_mut(key.name)
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Detach a value. A value of a different type stays where it is.
    pub fn take<T: 'static>(&mut self, key: &ContextKey<T>) -> Option<T> {
        let value = self.values.remove(key.name)?;
        match value.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(value) => {
                self.values.insert(key.name, value);
                None
            }
        }
    }

    /// Untyped lookup by key name; the caller names the type it expects.
    pub fn retrieve<T: 'static>(&self, name: &str) -> Option<&T> {
        self.values
            .get(name)
            .and_then(|value| value.downcast_ref::<T>())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.get(&REQUEST_ID).map(String::as_str)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get(&USER_ID).map(String::as_str)
    }

    /// Queue an event for publication once the surrounding unit of work commits.
    pub fn record_event<E: DomainEvent>(&mut self, event: E) {
        self.pending_events.push(Arc::new(event));
    }

    pub fn pending_events(&self) -> &[Arc<dyn DomainEvent>] {
        &self.pending_events
    }

    pub fn take_pending_events(&mut self) -> Vec<Arc<dyn DomainEvent>> {
        std::mem::take(&mut self.pending_events)
    }

    /// Drop queued events without publishing them. Returns how many were dropped.
    pub fn discard_pending_events(&mut self) -> usize {
        let dropped = self.pending_events.len();
        self.pending_events.clear();
        dropped
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&&'static str> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("RequestContext")
            .field("keys", &keys)
            .field("pending_events", &self.pending_events.len())
            .finish()
    }
}
