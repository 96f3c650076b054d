//! Module: sky-exec
//! Responsibility: the shard fan-out executor (C10): turns a schema
//! registry, a storage snapshot, and a decoded query into a merged
//! aggregation result, in parallel across shards.
//! Does not own: query parsing/interpretation (sky-core), storage
//! persistence (sky-storage), or any outer transport surface (HTTP/JSON
//! wire handling is explicitly out of scope, spec.md §1).

mod config;
mod error;
mod executor;
pub mod obs;

pub use config::ExecutorConfig;
pub use error::ExecError;
pub use executor::{Executor, EVENTS_SPACE};
