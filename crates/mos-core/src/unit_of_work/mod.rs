//! Unit of Work
//!
//! A unit of work is a stateless coordinator bound to one datastore. It is
//! built once at service construction and driven per request:
//!
//! ```ignore
//! let uow = self.repository.unit_of_work();
//! uow.start_context(&mut ctx).await?;                 // begin, attach handle
//! let result = catch_panic(self.body(&mut ctx)).await; // repository calls
//! let result = uow.defer_error_context(&mut ctx, result).await; // commit or roll back
//! self.events.publish_pending(&mut ctx).await;         // only after commit
//! ```
//!
//! Repositories look the handle up on the context and join the open
//! transaction; without one they run against the pool directly.

mod composite;
mod document;
mod sql;

pub use composite::CompositeUnitOfWork;
pub use document::{DocumentSession, DocumentUnitOfWork};
pub use sql::{SqlConnection, SqlTransaction, SqlUnitOfWork};

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::context::RequestContext;
use crate::error::TransactionError;

/// How to finish a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Commit,
    Rollback,
}

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Short backend label for logs.
    fn backend(&self) -> &'static str;

    /// Begin a transaction and attach its handle to the context.
    async fn start_context(&self, ctx: &mut RequestContext) -> Result<(), TransactionError>;

    /// Commit or roll back the transaction attached to the context and
    /// detach its handle. No handle attached means nothing to do.
    async fn finish_context(
        &self,
        ctx: &mut RequestContext,
        completion: Completion,
    ) -> Result<(), TransactionError>;
}

#[async_trait]
pub trait UnitOfWorkExt: UnitOfWork {
    /// Finish the unit of work according to the operation's outcome.
    ///
    /// `Ok` commits; a commit failure replaces the value with the converted
    /// transaction error. `Err` rolls back and returns the original error
    /// unchanged; a rollback failure is only logged. Queued events are
    /// dropped whenever the outcome is not a clean commit.
    async fn defer_error_context<T, E>(
        &self,
        ctx: &mut RequestContext,
        result: Result<T, E>,
    ) -> Result<T, E>
    where
        T: Send,
        E: From<TransactionError> + fmt::Display + Send,
    {
        match result {
            Ok(value) => match self.finish_context(ctx, Completion::Commit).await {
                Ok(()) => Ok(value),
                Err(err) => {
                    let dropped = ctx.discard_pending_events();
                    warn!(
                        backend = self.backend(),
                        request_id = ?ctx.request_id(),
                        dropped_events = dropped,
                        error = %err,
                        "Commit failed"
                    );
                    Err(E::from(err))
                }
            },
            Err(cause) => {
                if let Err(err) = self.finish_context(ctx, Completion::Rollback).await {
                    error!(
                        backend = self.backend(),
                        request_id = ?ctx.request_id(),
                        error = %err,
                        cause = %cause,
                        "Rollback failed"
                    );
                }
                let dropped = ctx.discard_pending_events();
                debug!(
                    backend = self.backend(),
                    dropped_events = dropped,
                    cause = %cause,
                    "Rolled back"
                );
                Err(cause)
            }
        }
    }
}

impl<T: UnitOfWork + ?Sized> UnitOfWorkExt for T {}

/// Attaches nothing and always succeeds. Backs the in-memory repositories.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUnitOfWork;

#[async_trait]
impl UnitOfWork for NoopUnitOfWork {
    fn backend(&self) -> &'static str {
        "noop"
    }

    async fn start_context(&self, _ctx: &mut RequestContext) -> Result<(), TransactionError> {
        Ok(())
    }

    async fn finish_context(
        &self,
        _ctx: &mut RequestContext,
        _completion: Completion,
    ) -> Result<(), TransactionError> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted unit of work for exercising coordination logic without a
    //! datastore.

    use super::*;
    use crate::context::ContextKey;
    use parking_lot::Mutex;
    use std::sync::Arc;

    pub struct FakeHandle(pub &'static str);

    pub struct FakeUnitOfWork {
        pub label: &'static str,
        pub key: ContextKey<FakeHandle>,
        pub fail_start: bool,
        pub fail_finish: bool,
        pub log: Arc<Mutex<Vec<String>>>,
    }

    impl FakeUnitOfWork {
        pub fn new(
            label: &'static str,
            key: ContextKey<FakeHandle>,
            log: &Arc<Mutex<Vec<String>>>,
        ) -> Self {
            Self {
                label,
                key,
                fail_start: false,
                fail_finish: false,
                log: log.clone(),
            }
        }
    }

    #[async_trait]
    impl UnitOfWork for FakeUnitOfWork {
        fn backend(&self) -> &'static str {
            self.label
        }

        async fn start_context(&self, ctx: &mut RequestContext) -> Result<(), TransactionError> {
            if self.fail_start {
                self.log.lock().push(format!("{}:start-failed", self.label));
                return Err(TransactionError::backend(self.label, "start refused"));
            }
            self.log.lock().push(format!("{}:start", self.label));
            ctx.insert(self.key, FakeHandle(self.label));
            Ok(())
        }

        async fn finish_context(
            &self,
            ctx: &mut RequestContext,
            completion: Completion,
        ) -> Result<(), TransactionError> {
            if ctx.take(&self.key).is_none() {
                return Ok(());
            }
            let verb = match completion {
                Completion::Commit => "commit",
                Completion::Rollback => "rollback",
            };
            if self.fail_finish {
                self.log.lock().push(format!("{}:{}-failed", self.label, verb));
                return Err(TransactionError::backend(self.label, format!("{} refused", verb)));
            }
            self.log.lock().push(format!("{}:{}", self.label, verb));
            Ok(())
        }
    }
}
