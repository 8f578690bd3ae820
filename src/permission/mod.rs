//! Hierarchical permissions
//!
//! Users and roles hold dot-separated permission nodes; a node ending in
//! `.*` covers its whole subtree and `*` covers everything. The
//! [`PermissionStore`] owns and persists the grants, the
//! [`PermissionResolver`] answers authorization checks against them.
//!
//! Everything here is synchronous and safe to call from any thread.

pub mod backend;
pub mod error;
pub mod node;
pub mod resolver;
pub mod store;

pub use backend::{FileBackend, FileFormat, MemoryBackend, PermissionBackend, PermissionSnapshot};
pub use error::PermissionError;
pub use node::{matches, PermissionNode};
pub use resolver::{ActorContext, PermissionResolver};
pub use store::{Namespace, PermissionStats, PermissionStore};
