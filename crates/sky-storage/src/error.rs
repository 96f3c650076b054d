use thiserror::Error as ThisError;

///
/// StorageError
///
/// Non-`NOT_FOUND` failures from the key-value layer (spec.md §7,
/// `StorageError`). Absence of a key or value is modeled as `Option::None`
/// on the read path, never as an error.
///

#[derive(Debug, ThisError)]
pub enum StorageError {
    #[error("storage space '{0}' has not been opened")]
    SpaceNotOpen(String),

    #[error("storage corruption: {0}")]
    Corrupt(String),
}
