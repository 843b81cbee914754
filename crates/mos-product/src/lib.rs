//! Mosaic Product Module
//!
//! Catalogue entries with stock levels. Products are owned by the user who
//! created them; ownership is checked through the [`acl::OwnerDirectory`]
//! contract, which this crate defines and the composition root implements.

pub mod acl;
pub mod entity;
pub mod error;
pub mod events;
pub mod repository;
pub mod service;
mod validation;

pub use acl::{AclError, OwnerDirectory};
pub use entity::{NewProduct, Product, ProductUpdate};
pub use error::ProductError;
pub use repository::{
    MemoryProductRepository, MongoProductRepository, ProductRepository, SqlProductRepository,
};
pub use service::ProductService;
