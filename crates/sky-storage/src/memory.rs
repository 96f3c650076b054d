use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{StorageAdapter, StorageCursor, StorageError, StorageWriter};

type Space = BTreeMap<Vec<u8>, BTreeMap<Vec<u8>, Vec<u8>>>;

///
/// MemoryStore
///
/// A single-writer, ordered, multi-value key-value store kept entirely in
/// memory. It exists because spec.md's storage adapter is a trait
/// boundary with no prescribed backend (§1, "Explicitly out of scope") —
/// this is the one concrete implementation the rest of the engine is
/// tested and demonstrated against, the in-memory analogue of the
/// original's LMDB-backed `transaction` (`examples/original_source/db/transaction.go`).
///

#[derive(Debug, Default)]
pub struct MemoryStore {
    spaces: BTreeMap<String, Space>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes an immutable, cheaply-cloneable snapshot of the store for the
    /// query path (spec.md §4.6 "Open a read snapshot").
    #[must_use]
    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            spaces: Arc::new(self.spaces.clone()),
        }
    }
}

impl StorageWriter for MemoryStore {
    fn open(&mut self, space: &str, create: bool) -> Result<(), StorageError> {
        if self.spaces.contains_key(space) {
            return Ok(());
        }
        if !create {
            return Err(StorageError::SpaceNotOpen(space.to_string()));
        }
        self.spaces.insert(space.to_string(), Space::new());
        Ok(())
    }

    fn put(&mut self, space: &str, key: &[u8], value: Vec<u8>) -> Result<(), StorageError> {
        let space = self
            .spaces
            .get_mut(space)
            .ok_or_else(|| StorageError::SpaceNotOpen(space.to_string()))?;
        let mut values = BTreeMap::new();
        values.insert(value.clone(), value);
        space.insert(key.to_vec(), values);
        Ok(())
    }

    fn put_at(
        &mut self,
        space: &str,
        key: &[u8],
        prefix: &[u8],
        value: Vec<u8>,
    ) -> Result<(), StorageError> {
        let space_name = space;
        let space = self
            .spaces
            .get_mut(space_name)
            .ok_or_else(|| StorageError::SpaceNotOpen(space_name.to_string()))?;
        let values = space.entry(key.to_vec()).or_default();
        let existing = values
            .range(prefix.to_vec()..)
            .next()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone());
        if let Some(existing) = existing {
            values.remove(&existing);
        }
        values.insert(value.clone(), value);
        Ok(())
    }

    fn del(&mut self, space: &str, key: &[u8]) -> Result<(), StorageError> {
        let space = self
            .spaces
            .get_mut(space)
            .ok_or_else(|| StorageError::SpaceNotOpen(space.to_string()))?;
        space.remove(key);
        Ok(())
    }

    fn del_at(&mut self, space: &str, key: &[u8], prefix: &[u8]) -> Result<(), StorageError> {
        let space_name = space;
        let space = self
            .spaces
            .get_mut(space_name)
            .ok_or_else(|| StorageError::SpaceNotOpen(space_name.to_string()))?;
        if let Some(values) = space.get_mut(key) {
            let existing = values
                .range(prefix.to_vec()..)
                .next()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(k, _)| k.clone());
            if let Some(existing) = existing {
                values.remove(&existing);
            }
        }
        Ok(())
    }
}

///
/// MemorySnapshot
///
/// An immutable, `Arc`-shared view of a [`MemoryStore`] at a point in
/// time. Cloning is O(1); every shard worker in the executor's fan-out
/// holds its own clone (spec.md §5, "each cursor is owned by exactly one
/// worker").
///

#[derive(Clone, Debug)]
pub struct MemorySnapshot {
    spaces: Arc<BTreeMap<String, Space>>,
}

impl StorageAdapter for MemorySnapshot {
    type Cursor = MemoryCursor;

    fn get(&self, space: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self
            .spaces
            .get(space)
            .and_then(|s| s.get(key))
            .and_then(|values| values.values().next())
            .cloned())
    }

    fn get_range(
        &self,
        space: &str,
        key: &[u8],
        prefix: &[u8],
    ) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.spaces.get(space).and_then(|s| s.get(key)).and_then(|values| {
            values
                .range(prefix.to_vec()..)
                .next()
                .filter(|(k, _)| k.starts_with(prefix))
                .map(|(_, v)| v.clone())
        }))
    }

    fn get_all(&self, space: &str, key: &[u8]) -> Result<Vec<Vec<u8>>, StorageError> {
        Ok(self
            .spaces
            .get(space)
            .and_then(|s| s.get(key))
            .map(|values| values.values().cloned().collect())
            .unwrap_or_default())
    }

    fn cursor(&self, space: &str) -> Result<Self::Cursor, StorageError> {
        Ok(MemoryCursor {
            space: self.spaces.get(space).cloned().unwrap_or_default(),
            position: None,
        })
    }
}

/// Cursor position: the current key and the value within it the cursor is
/// parked on.
struct Position {
    key: Vec<u8>,
    value: Vec<u8>,
}

pub struct MemoryCursor {
    space: Space,
    position: Option<Position>,
}

impl MemoryCursor {
    fn park_first_value_of(&mut self, key: &[u8]) -> bool {
        let Some(values) = self.space.get(key) else {
            return false;
        };
        let Some(first) = values.keys().next() else {
            return false;
        };
        self.position = Some(Position {
            key: key.to_vec(),
            value: first.clone(),
        });
        true
    }
}

impl StorageCursor for MemoryCursor {
    fn first(&mut self) -> bool {
        let Some(key) = self.space.keys().next().cloned() else {
            self.position = None;
            return false;
        };
        self.park_first_value_of(&key)
    }

    fn set_range(&mut self, key: &[u8]) -> bool {
        let Some(found_key) = self.space.range(key.to_vec()..).next().map(|(k, _)| k.clone())
        else {
            self.position = None;
            return false;
        };
        self.park_first_value_of(&found_key)
    }

    fn next_nodup(&mut self) -> bool {
        let Some(pos) = &self.position else {
            return false;
        };
        let Some(next_key) = self
            .space
            .range((std::ops::Bound::Excluded(pos.key.clone()), std::ops::Bound::Unbounded))
            .next()
            .map(|(k, _)| k.clone())
        else {
            self.position = None;
            return false;
        };
        self.park_first_value_of(&next_key)
    }

    fn next_dup(&mut self) -> bool {
        let Some(pos) = &self.position else {
            return false;
        };
        let key = pos.key.clone();
        let Some(values) = self.space.get(&key) else {
            self.position = None;
            return false;
        };
        let Some(next_value) = values
            .range((std::ops::Bound::Excluded(pos.value.clone()), std::ops::Bound::Unbounded))
            .next()
            .map(|(v, _)| v.clone())
        else {
            return false;
        };
        self.position = Some(Position { key, value: next_value });
        true
    }

    fn get_current(&self) -> Option<(&[u8], &[u8])> {
        self.position.as_ref().map(|p| (p.key.as_slice(), p.value.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_at_replaces_only_the_matching_prefix() {
        let mut store = MemoryStore::new();
        store.open("events", true).unwrap();
        store.put_at("events", b"obj1", b"\x00\x00\x00\x01", b"\x00\x00\x00\x01a".to_vec()).unwrap();
        store.put_at("events", b"obj1", b"\x00\x00\x00\x02", b"\x00\x00\x00\x02b".to_vec()).unwrap();
        store.put_at("events", b"obj1", b"\x00\x00\x00\x01", b"\x00\x00\x00\x01c".to_vec()).unwrap();

        let snap = store.snapshot();
        let all = snap.get_all("events", b"obj1").unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.contains(&b"\x00\x00\x00\x01c".to_vec()));
        assert!(all.contains(&b"\x00\x00\x00\x02b".to_vec()));
    }

    #[test]
    fn cursor_walks_keys_and_dups_in_order() {
        let mut store = MemoryStore::new();
        store.open("events", true).unwrap();
        store.put_at("events", b"a", b"1", b"1".to_vec()).unwrap();
        store.put_at("events", b"a", b"2", b"2".to_vec()).unwrap();
        store.put_at("events", b"b", b"1", b"1".to_vec()).unwrap();

        let snap = store.snapshot();
        let mut cursor = snap.cursor("events").unwrap();
        assert!(cursor.first());
        assert_eq!(cursor.get_current().unwrap().0, b"a");
        assert!(cursor.next_dup());
        assert_eq!(cursor.get_current().unwrap().1, b"2");
        assert!(!cursor.next_dup());
        assert!(cursor.next_nodup());
        assert_eq!(cursor.get_current().unwrap().0, b"b");
        assert!(!cursor.next_nodup());
    }
}
