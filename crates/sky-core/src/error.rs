use sky_schema::SchemaError;
use thiserror::Error as ThisError;

///
/// CoreError
///
/// The error taxonomy spec.md §7 defines, scoped to what this crate can
/// raise. `sky-exec` adds `Cancelled`/`DeadlineExceeded`, which are purely
/// an executor-level concern (C10).
///

#[derive(Debug, ThisError)]
pub enum CoreError {
    #[error("bad query: {0}")]
    BadQuery(String),

    #[error(
        "declaration error on '{name}': mismatched {field}: {left} != {right}"
    )]
    DeclConflict {
        name: String,
        field: &'static str,
        left: String,
        right: String,
    },

    #[error("unbound name '{0}' in expression")]
    UnboundName(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("internal error: {0}")]
    Internal(String),
}
