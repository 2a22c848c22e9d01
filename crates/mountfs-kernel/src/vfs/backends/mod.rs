//! Storage backends.
//!
//! Backends implement [`AdapterOps`](crate::vfs::AdapterOps) for different
//! storage types.

mod local;
mod memory;
pub mod testing;

pub use local::{LinkHandling, LocalBackend, PermissionMap};
pub use memory::MemoryBackend;
