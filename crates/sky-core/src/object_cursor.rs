use std::collections::HashMap;

use sky_primitives::{PropertyId, Timestamp};
use sky_schema::Table;
use sky_storage::StorageCursor;

use crate::event::{self, merge_same_timestamp, Event, Value};

///
/// EventState
///
/// One position in an object's materialized, carried-forward event
/// stream: the raw event's timestamp, the full property state after
/// overlaying this event onto the running carry-forward state, and
/// whether this is the last event of its session (spec.md §4.2).
///

#[derive(Clone, Debug)]
pub struct EventState {
    pub timestamp: Timestamp,
    pub values: HashMap<PropertyId, Value>,
    pub eos: bool,
}

///
/// ObjectCursor
///
/// Wraps an ordered [`StorageCursor`] plus a half-open `[start, end)` key
/// range identifying a shard of the object key space (spec.md §4.2); `end`
/// is `None` when the range runs to the end of the keyspace. Drives
/// object-to-object navigation; within an object, materializes the
/// carried-forward event sequence once per object so the interpreter can
/// do bounded look-ahead for `within` windows without re-reading storage.
///

pub struct ObjectCursor<'t, C> {
    cursor: C,
    start: Vec<u8>,
    end: Option<Vec<u8>>,
    session_idle_time: Option<i64>,
    table: &'t Table,
    events: Vec<EventState>,
    skipped_malformed: u64,
}

impl<'t, C: StorageCursor> ObjectCursor<'t, C> {
    pub fn new(cursor: C, start: Vec<u8>, end: Option<Vec<u8>>, session_idle_time: Option<i64>, table: &'t Table) -> Self {
        Self {
            cursor,
            start,
            end,
            session_idle_time,
            table,
            events: Vec::new(),
            skipped_malformed: 0,
        }
    }

    /// Positions at the first well-formed object whose key is `>= start`.
    /// A malformed blob on the first key in range is abandoned the same
    /// way `next_object` abandons one mid-shard (spec.md §4.2), not
    /// reported as an empty shard. Returns `false` only once the range is
    /// exhausted without finding a well-formed object.
    pub fn init(&mut self) -> bool {
        let positioned = if self.start.is_empty() {
            self.cursor.first()
        } else {
            self.cursor.set_range(&self.start)
        };
        if !positioned || !self.current_in_range() {
            return false;
        }
        if self.load_current_object() {
            return true;
        }
        self.next_object()
    }

    fn in_range(&self, key: &[u8]) -> bool {
        self.end.as_deref().is_none_or(|end| key < end)
    }

    fn current_in_range(&self) -> bool {
        self.cursor.get_current().is_some_and(|(key, _)| self.in_range(key))
    }

    /// Advances to the next object, stopping at the end of this shard's
    /// range. Malformed event blobs abandon the current object (spec.md
    /// §4.2 "Failure semantics") rather than failing the whole shard;
    /// well-formed storage errors are not possible against the in-memory
    /// adapter and are out of scope here.
    pub fn next_object(&mut self) -> bool {
        while self.cursor.next_nodup() && self.current_in_range() {
            if self.load_current_object() {
                return true;
            }
        }
        false
    }

    #[must_use]
    pub fn object_key(&self) -> Option<&[u8]> {
        self.cursor.get_current().map(|(k, _)| k)
    }

    #[must_use]
    pub fn object_events(&self) -> &[EventState] {
        &self.events
    }

    /// Count of objects abandoned so far in this shard because of a
    /// malformed event blob (spec.md §4.2 "Failure semantics").
    #[must_use]
    pub fn skipped_malformed(&self) -> u64 {
        self.skipped_malformed
    }

    /// Loads and carry-forward-materializes every event of the object the
    /// cursor currently sits on. Returns `false` if the object's blob is
    /// malformed (already logged; caller should move to the next object).
    /// Callers are expected to have already checked the cursor is
    /// positioned within this shard's `[start, end)` range.
    fn load_current_object(&mut self) -> bool {
        self.events.clear();

        let Some((key, _)) = self.cursor.get_current() else {
            return false;
        };
        let object_key = key.to_vec();

        let mut raw = Vec::new();
        loop {
            let Some((_, value)) = self.cursor.get_current() else {
                break;
            };
            match event::decode_event(value) {
                Ok(event) => raw.push(event),
                Err(err) => {
                    log::warn!(
                        "skipping object {object_key:?}: malformed event blob ({err})"
                    );
                    self.events.clear();
                    self.skipped_malformed += 1;
                    return false;
                }
            }
            if !self.cursor.next_dup() {
                break;
            }
        }

        self.events = materialize(raw, self.session_idle_time, self.table);
        true
    }
}

/// Coalesces duplicate timestamps, applies carry-forward of permanent
/// properties, clears transient properties after the event that set them,
/// and marks session boundaries (spec.md §3, §4.2).
fn materialize(raw: Vec<Event>, session_idle_time: Option<i64>, table: &Table) -> Vec<EventState> {
    let coalesced = coalesce(raw);

    let mut state: HashMap<PropertyId, Value> = HashMap::new();
    let mut out = Vec::with_capacity(coalesced.len());
    for (i, event) in coalesced.iter().enumerate() {
        state.retain(|id, _| {
            !table.property_by_id(*id).map(|p| p.transient).unwrap_or(false)
        });
        for (id, value) in &event.values {
            state.insert(*id, value.clone());
        }

        let is_last = i + 1 == coalesced.len();
        let eos = is_last
            || match session_idle_time {
                None => false,
                // `sessionIdleTime` is given in seconds (spec.md §8 scenario
                // 4's `7200` = a two-hour idle window); event timestamps
                // are microseconds (spec.md §3), so the gap is converted
                // before comparing.
                Some(idle) => event.timestamp.gap_to(coalesced[i + 1].timestamp) > idle.saturating_mul(1_000_000),
            };

        out.push(EventState {
            timestamp: event.timestamp,
            values: state.clone(),
            eos,
        });
    }
    out
}

fn coalesce(mut raw: Vec<Event>) -> Vec<Event> {
    raw.sort_by_key(|e| e.timestamp);
    let mut out: Vec<Event> = Vec::with_capacity(raw.len());
    for event in raw {
        if let Some(last) = out.last_mut() {
            if last.timestamp == event.timestamp {
                merge_same_timestamp(last, event);
                continue;
            }
        }
        out.push(event);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::encode_event;
    use sky_schema::{DataType, SchemaRegistry};
    use sky_storage::{MemoryStore, StorageAdapter, StorageWriter};

    fn table_with(props: &[(&str, DataType)]) -> Table {
        let mut registry = SchemaRegistry::new();
        let table = registry.table_or_create("events");
        for (name, data_type) in props {
            table.declare_property(name, *data_type, false).unwrap();
        }
        registry.table("events").unwrap().clone()
    }

    #[test]
    fn init_skips_past_a_malformed_first_object() {
        let table = table_with(&[("action", DataType::String)]);
        let action = table.property("action").unwrap().id;

        let mut store = MemoryStore::new();
        store.open("events", true).unwrap();
        // "bad" has a single, truncated (malformed) event blob.
        store.put_at("events", b"bad", b"\x00\x00\x00\x00\x00\x00\x00\x01", vec![0, 1, 2]).unwrap();
        // "good" has one well-formed event and sorts after "bad".
        let event = Event { timestamp: Timestamp::from_micros(1), values: HashMap::from([(action, Value::String("A0".into()))]) };
        store.put_at("events", b"good", &1i64.to_be_bytes(), encode_event(&event)).unwrap();

        let snapshot = store.snapshot();
        let cursor = snapshot.cursor("events").unwrap();
        let mut objects = ObjectCursor::new(cursor, Vec::new(), None, None, &table);

        assert!(objects.init());
        assert_eq!(objects.object_key(), Some(b"good".as_slice()));
        assert_eq!(objects.skipped_malformed(), 1);
        assert!(!objects.next_object());
    }
}
