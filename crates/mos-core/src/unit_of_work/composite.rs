//! Composite unit of work.
//!
//! Drives up to two backends as one: the relational backend starts first
//! and finishes last, the document backend nests inside it. This is not
//! an atomic commit across datastores; a relational commit failure after
//! a successful document commit leaves the document writes in place.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use super::{Completion, UnitOfWork};
use crate::context::RequestContext;
use crate::error::TransactionError;

#[derive(Clone, Default)]
pub struct CompositeUnitOfWork {
    relational: Option<Arc<dyn UnitOfWork>>,
    document: Option<Arc<dyn UnitOfWork>>,
}

impl CompositeUnitOfWork {
    pub fn new(
        relational: Option<Arc<dyn UnitOfWork>>,
        document: Option<Arc<dyn UnitOfWork>>,
    ) -> Self {
        Self {
            relational,
            document,
        }
    }

    pub fn with_relational(mut self, uow: Arc<dyn UnitOfWork>) -> Self {
        self.relational = Some(uow);
        self
    }

    pub fn with_document(mut self, uow: Arc<dyn UnitOfWork>) -> Self {
        self.document = Some(uow);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.relational.is_none() && self.document.is_none()
    }

    /// Configured backends in start order.
    fn backends(&self) -> impl DoubleEndedIterator<Item = &Arc<dyn UnitOfWork>> {
        [self.relational.as_ref(), self.document.as_ref()]
            .into_iter()
            .flatten()
    }
}

#[async_trait]
impl UnitOfWork for CompositeUnitOfWork {
    fn backend(&self) -> &'static str {
        "composite"
    }

    /// Start every backend against the same context. If one fails, the
    /// ones already started are rolled back before the error is returned.
    async fn start_context(&self, ctx: &mut RequestContext) -> Result<(), TransactionError> {
        let mut started: Vec<&Arc<dyn UnitOfWork>> = Vec::new();

        for uow in self.backends() {
            if let Err(err) = uow.start_context(ctx).await {
                for prior in started.iter().rev() {
                    if let Err(rollback_err) =
                        prior.finish_context(ctx, Completion::Rollback).await
                    {
                        error!(
                            backend = prior.backend(),
                            error = %rollback_err,
                            "Rollback after failed start also failed"
                        );
                    }
                }
                return Err(err);
            }
            started.push(uow);
        }
        Ok(())
    }

    /// Finish in reverse start order. The first failure is returned; once
    /// anything has failed, the remaining backends roll back instead of
    /// committing, and any further failures are only logged.
    async fn finish_context(
        &self,
        ctx: &mut RequestContext,
        completion: Completion,
    ) -> Result<(), TransactionError> {
        let mut first_error: Option<TransactionError> = None;

        for uow in self.backends().rev() {
            let effective = if first_error.is_some() {
                Completion::Rollback
            } else {
                completion
            };

            if let Err(err) = uow.finish_context(ctx, effective).await {
                if first_error.is_none() {
                    warn!(backend = uow.backend(), ?effective, error = %err, "Finalizer failed");
                    first_error = Some(err);
                } else {
                    error!(
                        backend = uow.backend(),
                        ?effective,
                        error = %err,
                        "Additional finalizer failure"
                    );
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{FakeHandle, FakeUnitOfWork};
    use super::*;
    use crate::context::ContextKey;
    use parking_lot::Mutex;

    const REL: ContextKey<FakeHandle> = ContextKey::new("test.rel");
    const DOC: ContextKey<FakeHandle> = ContextKey::new("test.doc");

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[tokio::test]
    async fn test_empty_composite_is_noop() {
        let composite = CompositeUnitOfWork::default();
        assert!(composite.is_empty());

        let mut ctx = RequestContext::new();
        composite.start_context(&mut ctx).await.unwrap();
        assert_eq!(format!("{:?}", ctx), format!("{:?}", RequestContext::new()));
        composite
            .finish_context(&mut ctx, Completion::Commit)
            .await
            .unwrap();
        composite
            .finish_context(&mut ctx, Completion::Rollback)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_both_handles_retrievable() {
        let log = log();
        let composite = CompositeUnitOfWork::default()
            .with_relational(Arc::new(FakeUnitOfWork::new("rel", REL, &log)))
            .with_document(Arc::new(FakeUnitOfWork::new("doc", DOC, &log)));

        let mut ctx = RequestContext::new();
        composite.start_context(&mut ctx).await.unwrap();

        assert_eq!(ctx.get(&REL).map(|h| h.0), Some("rel"));
        assert_eq!(ctx.get(&DOC).map(|h| h.0), Some("doc"));

        composite
            .finish_context(&mut ctx, Completion::Commit)
            .await
            .unwrap();
        assert_eq!(
            *log.lock(),
            vec!["rel:start", "doc:start", "doc:commit", "rel:commit"]
        );
        assert!(ctx.get(&REL).is_none());
        assert!(ctx.get(&DOC).is_none());
    }

    #[tokio::test]
    async fn test_failed_start_rolls_back_earlier_backends() {
        let log = log();
        let mut doc = FakeUnitOfWork::new("doc", DOC, &log);
        doc.fail_start = true;
        let composite = CompositeUnitOfWork::new(
            Some(Arc::new(FakeUnitOfWork::new("rel", REL, &log))),
            Some(Arc::new(doc)),
        );

        let mut ctx = RequestContext::new();
        assert!(composite.start_context(&mut ctx).await.is_err());
        assert_eq!(
            *log.lock(),
            vec!["rel:start", "doc:start-failed", "rel:rollback"]
        );
        assert!(ctx.get(&REL).is_none());
    }

    #[tokio::test]
    async fn test_first_finalizer_error_wins_and_rest_roll_back() {
        let log = log();
        let mut doc = FakeUnitOfWork::new("doc", DOC, &log);
        doc.fail_finish = true;
        let composite = CompositeUnitOfWork::new(
            Some(Arc::new(FakeUnitOfWork::new("rel", REL, &log))),
            Some(Arc::new(doc)),
        );

        let mut ctx = RequestContext::new();
        composite.start_context(&mut ctx).await.unwrap();
        let err = composite
            .finish_context(&mut ctx, Completion::Commit)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("commit refused"));
        assert_eq!(
            *log.lock(),
            vec!["rel:start", "doc:start", "doc:commit-failed", "rel:rollback"]
        );
    }

    #[tokio::test]
    async fn test_later_failure_does_not_mask_first() {
        let log = log();
        let mut rel = FakeUnitOfWork::new("rel", REL, &log);
        rel.fail_finish = true;
        let mut doc = FakeUnitOfWork::new("doc", DOC, &log);
        doc.fail_finish = true;
        let composite = CompositeUnitOfWork::new(Some(Arc::new(rel)), Some(Arc::new(doc)));

        let mut ctx = RequestContext::new();
        composite.start_context(&mut ctx).await.unwrap();
        let err = composite
            .finish_context(&mut ctx, Completion::Rollback)
            .await
            .unwrap_err();

        match err {
            TransactionError::Backend { backend, .. } => assert_eq!(backend, "doc"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_relational_only() {
        let log = log();
        let composite = CompositeUnitOfWork::default()
            .with_relational(Arc::new(FakeUnitOfWork::new("rel", REL, &log)));

        let mut ctx = RequestContext::new();
        composite.start_context(&mut ctx).await.unwrap();
        composite
            .finish_context(&mut ctx, Completion::Rollback)
            .await
            .unwrap();
        assert_eq!(*log.lock(), vec!["rel:start", "rel:rollback"]);
    }
}
