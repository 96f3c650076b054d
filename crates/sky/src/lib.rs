//! # sky
//!
//! `sky` is the public facade crate for the Sky behavioral analytics
//! query-execution engine. It is the recommended dependency for anything
//! embedding the engine; `sky-cli` is the only other thing in this
//! workspace that runs it end to end.
//!
//! This crate exposes:
//! - `schema` — table/property declaration (C1).
//! - `storage` — the storage-adapter trait and in-memory implementation
//!   (C3).
//! - `core` — the query AST, step interpreter, and aggregation tree (C2,
//!   C4-C9).
//! - `executor`/`Executor`/`ExecutorConfig`/`Error` — the shard fan-out
//!   executor and its public `execute`/`stats` surface (C10).
//!
//! Low-level internals that downstream callers should not need directly
//! (the object cursor, symbol table, factorizer) stay reachable through
//! `core` rather than being re-exported at the top level, the same way the
//! teacher's facade keeps engine internals behind a module rather than at
//! its own root.

pub use sky_primitives as primitives;
pub use sky_schema as schema;
pub use sky_storage as storage;
pub use sky_core as core;

pub mod executor {
    pub use sky_exec::*;
}

pub use sky_exec::{ExecError as Error, Executor, ExecutorConfig, EVENTS_SPACE};
