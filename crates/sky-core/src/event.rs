use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sky_primitives::{PropertyId, Timestamp};

///
/// Value
///
/// A typed property value (spec.md §3). `Factor` properties are
/// dictionary-encoded strings at the schema level (Glossary); at the
/// value level they are plain strings, same as `DataType::String`.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl Value {
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Self::String(_) => None,
        }
    }
}

///
/// Event
///
/// Timestamp plus a map from property id to typed value (spec.md §3).
/// Events for one object are ordered strictly by timestamp; duplicate
/// timestamps within one object are coalesced by [`crate::object_cursor`]
/// before the interpreter ever sees them.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub timestamp: Timestamp,
    pub values: HashMap<PropertyId, Value>,
}

/// Merges `other` into `self`, per spec.md §3 coalescing rule: "merge
/// property maps; last writer wins per property". `other` is considered
/// the later write.
pub(crate) fn merge_same_timestamp(base: &mut Event, other: Event) {
    for (id, value) in other.values {
        base.values.insert(id, value);
    }
}

///
/// Wire encoding
///
/// The on-disk event format is explicitly out of scope (spec.md §1,
/// "treated as an opaque blob ... with the timestamp exposed"); this is
/// the one concrete codec the in-memory storage adapter and CLI use, kept
/// deliberately simple: an 8-byte big-endian timestamp (so raw byte
/// comparison sorts multi-value entries in timestamp order, matching the
/// LMDB `DUPSORT` behavior `examples/original_source/db/transaction.go`
/// relies on) followed by a count-prefixed list of `(property id, tagged
/// value)` pairs.
///

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("event blob truncated")]
    Truncated,
    #[error("event blob has unknown value tag {0}")]
    UnknownTag(u8),
    #[error("event blob has invalid utf8 string")]
    InvalidUtf8,
}

pub fn encode_event(event: &Event) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + event.values.len() * 12);
    buf.extend_from_slice(&event.timestamp.as_micros().to_be_bytes());
    let mut pairs: Vec<_> = event.values.iter().collect();
    pairs.sort_by_key(|(id, _)| id.get());
    buf.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
    for (id, value) in pairs {
        buf.extend_from_slice(&id.get().to_be_bytes());
        match value {
            Value::String(s) => {
                buf.push(0);
                buf.extend_from_slice(&(s.len() as u32).to_be_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
            Value::Integer(i) => {
                buf.push(1);
                buf.extend_from_slice(&i.to_be_bytes());
            }
            Value::Float(f) => {
                buf.push(2);
                buf.extend_from_slice(&f.to_bits().to_be_bytes());
            }
            Value::Boolean(b) => {
                buf.push(3);
                buf.push(u8::from(*b));
            }
        }
    }
    buf
}

pub fn decode_event(bytes: &[u8]) -> Result<Event, CodecError> {
    let mut cursor = ByteCursor::new(bytes);
    let timestamp = Timestamp::from_micros(cursor.read_i64()?);
    let count = cursor.read_u32()?;
    let mut values = HashMap::with_capacity(count as usize);
    for _ in 0..count {
        let id = PropertyId::new(cursor.read_i32()?);
        let tag = cursor.read_u8()?;
        let value = match tag {
            0 => {
                let len = cursor.read_u32()? as usize;
                let bytes = cursor.read_bytes(len)?;
                Value::String(String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)?)
            }
            1 => Value::Integer(cursor.read_i64()?),
            2 => Value::Float(f64::from_bits(cursor.read_u64()?)),
            3 => Value::Boolean(cursor.read_u8()? != 0),
            other => return Err(CodecError::UnknownTag(other)),
        };
        values.insert(id, value);
    }
    Ok(Event { timestamp, values })
}

struct ByteCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.pos + len > self.bytes.len() {
            return Err(CodecError::Truncated);
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }

    fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_be_bytes(self.read_bytes(4)?.try_into().unwrap()))
    }

    fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_be_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }

    fn read_i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_be_bytes(self.read_bytes(8)?.try_into().unwrap()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_value_type() {
        let mut values = HashMap::new();
        values.insert(PropertyId::new(0), Value::String("apple".into()));
        values.insert(PropertyId::new(1), Value::Integer(42));
        values.insert(PropertyId::new(2), Value::Float(1.5));
        values.insert(PropertyId::new(3), Value::Boolean(true));
        let event = Event { timestamp: Timestamp::from_micros(1_000_000), values };

        let encoded = encode_event(&event);
        let decoded = decode_event(&encoded).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let err = decode_event(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated));
    }
}
