//! Repository seam.
//!
//! Every repository trait extends [`Transactional`], so a service reaches
//! the unit of work through the repository it already holds and never
//! needs to know which datastore sits behind it.

use crate::unit_of_work::UnitOfWork;

pub trait Transactional: Send + Sync {
    fn unit_of_work(&self) -> &dyn UnitOfWork;
}
