//! Module: sky-schema
//! Responsibility: tables and properties (C1). Property ids are unique and
//! immutable per table; names are unique per table; data type and transient
//! flag are immutable once assigned (spec.md §3 "Invariants").
//! Does not own: event storage, query evaluation.

mod error;
mod property;
mod registry;
mod table;

pub use error::SchemaError;
pub use property::{DataType, Property};
pub use registry::SchemaRegistry;
pub use table::Table;
