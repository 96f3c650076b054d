use thiserror::Error as ThisError;

///
/// SchemaError
///
/// Failures raised while defining or resolving properties on a [`Table`](crate::Table).
///

#[derive(Debug, ThisError)]
pub enum SchemaError {
    #[error("table '{0}' not found")]
    TableNotFound(String),

    #[error("table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("property '{name}' not found in table '{table}'")]
    PropertyNotFound { table: String, name: String },

    #[error(
        "property '{name}' in table '{table}' already exists with a different data type: {existing} != {requested}"
    )]
    DataTypeMismatch {
        table: String,
        name: String,
        existing: String,
        requested: String,
    },

    #[error(
        "property '{name}' in table '{table}' already exists with a different transient flag: {existing} != {requested}"
    )]
    TransientMismatch {
        table: String,
        name: String,
        existing: bool,
        requested: bool,
    },
}
