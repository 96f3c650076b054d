use sky_core::CoreError;
use sky_schema::SchemaError;
use sky_storage::StorageError;
use thiserror::Error as ThisError;

///
/// ExecError
///
/// Adds the two purely executor-level failure modes (spec.md §7) to the
/// taxonomy `sky-core` and `sky-schema`/`sky-storage` already define:
/// cooperative cancellation and deadline enforcement are both concerns of
/// the shard fan-out loop (C10), not of any single step interpreter.
///

#[derive(Debug, ThisError)]
pub enum ExecError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("query cancelled")]
    Cancelled,

    #[error("query exceeded its deadline")]
    DeadlineExceeded,
}
