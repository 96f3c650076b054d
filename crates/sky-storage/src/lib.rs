//! Module: sky-storage
//! Responsibility: the ordered key-value storage contract (C3) that the
//! query-execution core is built against, plus one concrete in-memory
//! implementation used by tests, the CLI, and as a reference deployment.
//! Does not own: on-disk serialization format or persistence durability —
//! those belong to the embedded KV store this crate stands in for
//! (spec.md §1, "Explicitly out of scope").

mod adapter;
mod error;
mod memory;

pub use adapter::{StorageAdapter, StorageCursor, StorageWriter};
pub use error::StorageError;
pub use memory::{MemorySnapshot, MemoryStore};
