//! Mosaic User Module
//!
//! Owns user accounts. Other modules never import this crate directly;
//! they reach it through ACL adapters that implement their own contracts
//! on top of [`UserService`].

pub mod entity;
pub mod error;
pub mod events;
pub mod repository;
pub mod service;
mod validation;

pub use entity::{NewUser, User, UserUpdate};
pub use error::UserError;
pub use repository::{MemoryUserRepository, MongoUserRepository, SqlUserRepository, UserRepository};
pub use service::UserService;
