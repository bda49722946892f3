//! Task status storage.
//!
//! This crate provides:
//! - The [`StatusStore`] contract used by the worker and the API
//! - A Redis backend keyed by `task:<id>` with native expiry
//! - An in-process fallback used when Redis is absent or unreachable

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{connect_status_store, SharedStatusStore, StatusStore, DEFAULT_TASK_TTL};
