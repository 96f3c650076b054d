use serde::{Deserialize, Serialize};

/// A point in time, stored as microseconds since the Unix epoch.
///
/// Event ordering and session-boundary detection both operate on this type;
/// the query expression language's `timestamp` identifier exposes the
/// seconds-since-epoch projection via [`Timestamp::as_seconds`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    #[must_use]
    pub const fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    #[must_use]
    pub const fn as_micros(self) -> i64 {
        self.0
    }

    #[must_use]
    pub const fn as_seconds(self) -> i64 {
        self.0.div_euclid(1_000_000)
    }

    /// Gap to a later timestamp, in microseconds. Panics are not possible:
    /// callers only ever compare consecutive events, which are not
    /// decreasing within one object (§3, "events for one object are
    /// ordered strictly by timestamp").
    #[must_use]
    pub fn gap_to(self, later: Self) -> i64 {
        later.0.saturating_sub(self.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Self(value)
    }
}
