use crate::StorageError;

///
/// StorageAdapter
///
/// Read side of the storage contract (spec.md §4.1). Implementations are
/// expected to be cheap to clone/share across worker threads: the query
/// path opens one adapter per shard against a single immutable snapshot
/// (spec.md §5, "the read snapshot is shared (many-reader)").
///

pub trait StorageAdapter: Send + Sync {
    type Cursor: StorageCursor + Send;

    /// Returns the value stored at `key`, for single-value keys.
    fn get(&self, space: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Positions a cursor at `(key, first-value >= prefix)`; returns the
    /// matched multi-value if it still has `prefix` as a byte prefix, else
    /// `None`.
    fn get_range(
        &self,
        space: &str,
        key: &[u8],
        prefix: &[u8],
    ) -> Result<Option<Vec<u8>>, StorageError>;

    /// Returns every value stored under `key`, in sort order.
    fn get_all(&self, space: &str, key: &[u8]) -> Result<Vec<Vec<u8>>, StorageError>;

    /// Opens an ordered cursor over `space`.
    fn cursor(&self, space: &str) -> Result<Self::Cursor, StorageError>;
}

///
/// StorageCursor
///
/// An ordered cursor supporting the LMDB-style navigation primitives
/// spec.md §4.1 requires: FIRST, `SET_RANGE`, `NEXT_NODUP`, `NEXT_DUP`,
/// `GET_CURRENT`. `next_nodup` advances past every remaining value of the
/// current key to the first value of the next key; `next_dup` advances to
/// the next value of the *same* key.
///

pub trait StorageCursor {
    /// Positions at the first key in the space. Returns `false` if the
    /// space is empty.
    fn first(&mut self) -> bool;

    /// Positions at the first key greater than or equal to `key`, and
    /// within it, the first value. Returns `false` if no such key exists.
    fn set_range(&mut self, key: &[u8]) -> bool;

    /// Advances to the first value of the next distinct key. Returns
    /// `false` at end of space.
    fn next_nodup(&mut self) -> bool;

    /// Advances to the next value under the current key. Returns `false`
    /// if the current key has no further values.
    fn next_dup(&mut self) -> bool;

    /// The `(key, value)` pair at the cursor's current position, or
    /// `None` if the cursor is not positioned on a value.
    fn get_current(&self) -> Option<(&[u8], &[u8])>;
}

///
/// StorageWriter
///
/// Write side of the storage contract. Writes are serialized by the
/// single-writer discipline (spec.md §4.1); this crate does not itself
/// enforce that beyond requiring `&mut self`, matching spec.md §9's note
/// that `put_at` offers no transactional guarantee against concurrent
/// readers beyond what single-writer serialization already gives.
///

pub trait StorageWriter {
    fn open(&mut self, space: &str, create: bool) -> Result<(), StorageError>;

    /// Replaces every value stored under `key` with the single `value`
    /// given (single-value key semantics).
    fn put(&mut self, space: &str, key: &[u8], value: Vec<u8>) -> Result<(), StorageError>;

    /// Deletes any existing multi-value at `(key, prefix)`, then inserts
    /// `value` (spec.md §4.1).
    fn put_at(
        &mut self,
        space: &str,
        key: &[u8],
        prefix: &[u8],
        value: Vec<u8>,
    ) -> Result<(), StorageError>;

    fn del(&mut self, space: &str, key: &[u8]) -> Result<(), StorageError>;

    fn del_at(&mut self, space: &str, key: &[u8], prefix: &[u8]) -> Result<(), StorageError>;
}
