//! Module: sky-core
//! Responsibility: the query-execution core (C2, C4-C9). Given a schema
//! table, a decoded query, and a storage cursor over one shard of a
//! table's object key space, runs the step interpreter and produces an
//! aggregation tree.
//! Does not own: storage persistence (sky-storage), shard fan-out and
//! result merge across shards (sky-exec, C10).

mod agg;
mod decls;
mod error;
mod event;
mod expr;
mod factorize;
mod interpreter;
mod object_cursor;
mod parser;
mod query;
mod step;
mod symtab;

pub use agg::{AggTree, AggValue, DimKey, Histogram};
pub use decls::{collect_decls, Association, VarDecl, TIMESTAMP_NAME};
pub use error::CoreError;
pub use event::{decode_event, encode_event, CodecError, Event, Value};
pub use expr::Expr;
pub use factorize::factorize;
pub use interpreter::Interpreter;
pub use object_cursor::{EventState, ObjectCursor};
pub use query::Query;
pub use step::{Condition, Field, FieldExpr, Selection, Step};
pub use symtab::SymbolTable;
