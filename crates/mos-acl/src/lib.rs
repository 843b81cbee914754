//! Mosaic ACL Adapters
//!
//! Module crates state what they need from other modules as traits in their
//! own `acl` module and never depend on each other. The adapters here are
//! the only place where one module's contract meets another module's
//! service; they translate requests, results and errors between the two.

mod owner_directory;
mod user_provisioner;

pub use owner_directory::UserOwnerDirectory;
pub use user_provisioner::UserServiceProvisioner;
