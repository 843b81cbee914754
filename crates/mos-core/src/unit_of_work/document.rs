//! Document unit of work over a MongoDB client.
//!
//! Multi-document transactions need a replica set. When a session or a
//! transaction cannot be started the context is left untouched and the
//! repositories fall back to plain, non-transactional writes.

use async_trait::async_trait;
use mongodb::{Client, ClientSession};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{Completion, UnitOfWork};
use crate::context::{RequestContext, DOCUMENT_SESSION};
use crate::error::TransactionError;

/// Open MongoDB session (with a started transaction) stored on the context.
pub struct DocumentSession {
    inner: Mutex<ClientSession>,
}

impl DocumentSession {
    fn new(session: ClientSession) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    pub fn session_mut(&mut self) -> &mut ClientSession {
        self.inner.get_mut()
    }

    /// The session repositories should pass to their operations, if any.
    pub fn active(ctx: &mut RequestContext) -> Option<&mut ClientSession> {
        ctx.get_mut(&DOCUMENT_SESSION).map(DocumentSession::session_mut)
    }

    fn into_inner(self) -> ClientSession {
        self.inner.into_inner()
    }
}

#[derive(Clone)]
pub struct DocumentUnitOfWork {
    client: Client,
}

impl DocumentUnitOfWork {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UnitOfWork for DocumentUnitOfWork {
    fn backend(&self) -> &'static str {
        "document"
    }

    async fn start_context(&self, ctx: &mut RequestContext) -> Result<(), TransactionError> {
        if ctx.contains(DOCUMENT_SESSION.name()) {
            return Err(TransactionError::AlreadyStarted("document"));
        }

        let mut session = match self.client.start_session().await {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "Document session unavailable, continuing without a transaction");
                return Ok(());
            }
        };

        if let Err(err) = session.start_transaction().await {
            warn!(error = %err, "Document transaction unavailable, continuing without a transaction");
            return Ok(());
        }

        ctx.insert(DOCUMENT_SESSION, DocumentSession::new(session));
        debug!(request_id = ?ctx.request_id(), "Document transaction started");
        Ok(())
    }

    async fn finish_context(
        &self,
        ctx: &mut RequestContext,
        completion: Completion,
    ) -> Result<(), TransactionError> {
        let Some(session) = ctx.take(&DOCUMENT_SESSION) else {
            return Ok(());
        };

        let mut session = session.into_inner();
        match completion {
            Completion::Commit => {
                session.commit_transaction().await?;
                debug!(request_id = ?ctx.request_id(), "Document transaction committed");
            }
            Completion::Rollback => {
                session.abort_transaction().await?;
                debug!(request_id = ?ctx.request_id(), "Document transaction aborted");
            }
        }
        Ok(())
    }
}
