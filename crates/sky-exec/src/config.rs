use std::time::Duration;

///
/// ExecutorConfig
///
/// Runtime knobs for one [`crate::Executor`] (spec.md §4.6, §5). Loading
/// these values from a config file is explicitly out of scope (spec.md
/// §1); callers build this directly, the way a library caller configures
/// any in-process component.
///

#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Number of shards to fan the object key space out across. Objects
    /// are bucketed to a shard by the first byte of their key, so this
    /// must be no more than 256 (spec.md §5, "each cursor is owned by
    /// exactly one worker").
    pub shard_count: usize,

    /// Session idle gap, in the same units as event timestamps' seconds
    /// projection, used when a query does not specify its own
    /// `sessionIdleTime` (spec.md §3 "Sessionization").
    pub default_session_idle_time: Option<i64>,

    /// Wall-clock budget for the whole query. Checked between objects, not
    /// between individual steps (spec.md §7 `DeadlineExceeded`).
    pub deadline: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            shard_count: 1,
            default_session_idle_time: None,
            deadline: None,
        }
    }
}

impl ExecutorConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    #[must_use]
    pub fn with_default_session_idle_time(mut self, idle: i64) -> Self {
        self.default_session_idle_time = Some(idle);
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}
