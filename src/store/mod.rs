//! Lifecycle persistence — which items have been briefed, actioned, or
//! skipped, so later briefings exclude already-handled mail.

pub mod libsql_backend;
pub mod memory;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryStore;
pub use traits::{LifecycleRecord, LifecycleStatus, LifecycleStore};
