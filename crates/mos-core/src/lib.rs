//! Mosaic Core
//!
//! The plumbing every module service is built on:
//!
//! - [`context`]: the request context that carries transaction handles,
//!   cross-cutting values and queued domain events through a call chain
//! - [`unit_of_work`]: transaction lifecycle per datastore (SQLite, MongoDB),
//!   their composite, and the commit/rollback helper services call last
//! - [`events`]: domain events and the in-process event bus
//! - [`guard`]: panic containment for service bodies
//! - [`repository`]: the seam between repositories and their unit of work

pub mod context;
pub mod error;
pub mod events;
pub mod guard;
pub mod repository;
pub mod unit_of_work;

pub use context::{ContextKey, RequestContext, DOCUMENT_SESSION, REQUEST_ID, SQL_TRANSACTION, USER_ID};
pub use error::{EventBusError, PanicError, RepositoryError, TransactionError};
pub use events::{
    DomainEvent, EventBus, EventEnvelope, EventHandler, EventMetadata, InProcessEventBus,
    NoopEventBus,
};
pub use guard::catch_panic;
pub use repository::Transactional;
pub use unit_of_work::{
    Completion, CompositeUnitOfWork, DocumentSession, DocumentUnitOfWork, NoopUnitOfWork,
    SqlConnection, SqlTransaction, SqlUnitOfWork, UnitOfWork, UnitOfWorkExt,
};
