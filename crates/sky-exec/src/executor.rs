use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde_json::{json, Value as Json};

use sky_core::{factorize, AggTree, Interpreter, ObjectCursor, Query, Step};
use sky_schema::{SchemaRegistry, Table};
use sky_storage::{MemorySnapshot, StorageAdapter};

use crate::config::ExecutorConfig;
use crate::error::ExecError;
use crate::obs::metrics::ExecStats;

pub const EVENTS_SPACE: &str = "events";

///
/// Executor
///
/// The shard fan-out and result merge layer (C10, spec.md §4.6, §5): splits
/// a table's object key space into `config.shard_count` single-byte
/// buckets, runs one `Interpreter` per shard in parallel over its own
/// cursor against the shared read snapshot, and merges the per-shard
/// `AggTree`s associatively at the end. No locks sit on the per-object hot
/// path; the only cross-shard synchronization is the final sequential
/// fold.
///

pub struct Executor<'a> {
    registry: &'a SchemaRegistry,
    snapshot: &'a MemorySnapshot,
    config: ExecutorConfig,
}

impl<'a> Executor<'a> {
    #[must_use]
    pub fn new(registry: &'a SchemaRegistry, snapshot: &'a MemorySnapshot, config: ExecutorConfig) -> Self {
        Self { registry, snapshot, config }
    }

    /// Runs `query_json` to completion and returns its result alongside
    /// this run's [`ExecStats`] (spec.md §6 `execute`). `cancel`, if given,
    /// is polled between objects; setting it from another thread stops the
    /// run with `ExecError::Cancelled`.
    pub fn execute(&self, query_json: &str, cancel: Option<Arc<AtomicBool>>) -> Result<(Json, ExecStats), ExecError> {
        let query = Query::from_json(query_json)?;
        let table = self.registry.require_table(&query.table)?;
        let session_idle_time = query.session_idle_time.or(self.config.default_session_idle_time);
        let steps = factorize(query.steps);
        validate(table, &steps)?;

        let shard_count = self.config.shard_count.clamp(1, 256);
        let started = Instant::now();
        let ranges = shard_ranges(query.prefix.as_deref(), shard_count);

        let results: Vec<Result<(AggTree, ExecStats), ExecError>> = ranges
            .into_par_iter()
            .map(|(start, end)| {
                run_shard(
                    table,
                    self.snapshot,
                    &steps,
                    session_idle_time,
                    start,
                    end,
                    started,
                    self.config.deadline,
                    cancel.as_deref(),
                )
            })
            .collect();

        let mut tree = AggTree::new();
        let mut stats = ExecStats::new();
        for result in results {
            let (shard_tree, shard_stats) = result?;
            tree.merge(shard_tree);
            stats.merge(shard_stats);
        }

        Ok((tree.to_json(), stats))
    }

    /// A thin object-counting pass over `table_name`, independent of any
    /// query (spec.md §6 `stats`), grounded on
    /// `examples/original_source/skyd/benchmark.go`'s `stats()` wrapper: no
    /// interpreter runs, this only walks the shard cursors. `prefix`, when
    /// given, restricts the count to the same `[prefix, next-prefix)` range
    /// `execute` scans for a query prefix, rather than walking every shard.
    pub fn stats(&self, table_name: &str, prefix: Option<&str>) -> Result<Json, ExecError> {
        self.registry.require_table(table_name)?;
        let shard_count = self.config.shard_count.clamp(1, 256);
        let ranges = shard_ranges(prefix, shard_count);

        let totals: Vec<(u64, u64)> = ranges
            .into_par_iter()
            .map(|(start, end)| count_shard(self.snapshot, &start, end.as_deref()))
            .collect();

        let (objects, _events) = totals.into_iter().fold((0u64, 0u64), |(ao, ae), (o, e)| (ao + o, ae + e));
        Ok(json!({ "count": objects }))
    }
}

fn validate(table: &Table, steps: &[Step]) -> Result<(), ExecError> {
    Interpreter::new(table, steps.to_vec())?;
    Ok(())
}

/// Object keys are bucketed to a shard by their first byte (spec.md §5):
/// `shard_bounds` returns the `[start, end)` half-open byte range for
/// `shard` out of `shard_count` equal contiguous ranges of the 0..=255
/// byte space, with `end` absent for the last shard (runs to keyspace end).
fn shard_bounds(shard: usize, shard_count: usize) -> (u8, Option<u8>) {
    let width = 256 / shard_count.max(1);
    let start = (shard * width).min(255) as u8;
    let end = if shard + 1 < shard_count {
        Some(((shard + 1) * width).min(255) as u8)
    } else {
        None
    };
    (start, end)
}

/// Partitions the object key space the executor will scan (spec.md §4.6
/// point 2): when the query carries a `prefix`, every matching key already
/// shares it, so that single `[prefix, next-prefix)` range is scanned by
/// one worker rather than further split by leading byte; otherwise the
/// whole key space is split into `shard_count` single-byte ranges for
/// parallel workers.
fn shard_ranges(query_prefix: Option<&str>, shard_count: usize) -> Vec<(Vec<u8>, Option<Vec<u8>>)> {
    match query_prefix {
        Some(p) => {
            let start = p.as_bytes().to_vec();
            let end = prefix_upper_bound(&start);
            vec![(start, end)]
        }
        None => (0..shard_count)
            .map(|shard| {
                let (start, end) = shard_bounds(shard, shard_count);
                (vec![start], end.map(|e| vec![e]))
            })
            .collect(),
    }
}

/// The smallest byte string that is strictly greater than every string
/// starting with `prefix` (i.e. the exclusive upper bound of the range of
/// keys sharing `prefix`). `None` if `prefix` is empty or all `0xFF` bytes,
/// meaning the range runs to the end of the keyspace.
fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(&last) = upper.last() {
        if last == 0xFF {
            upper.pop();
        } else {
            *upper.last_mut().expect("checked non-empty above") += 1;
            return Some(upper);
        }
    }
    None
}

fn run_shard(
    table: &Table,
    snapshot: &MemorySnapshot,
    steps: &[Step],
    session_idle_time: Option<i64>,
    start: Vec<u8>,
    end: Option<Vec<u8>>,
    started: Instant,
    deadline: Option<std::time::Duration>,
    cancel: Option<&AtomicBool>,
) -> Result<(AggTree, ExecStats), ExecError> {
    let cursor = snapshot.cursor(EVENTS_SPACE)?;
    let mut objects = ObjectCursor::new(cursor, start, end, session_idle_time, table);
    let mut interpreter = Interpreter::new(table, steps.to_vec())?;
    let mut stats = ExecStats { shards_run: 1, ..ExecStats::new() };

    let mut has_object = objects.init();
    while has_object {
        if let Some(cancel) = cancel {
            if cancel.load(Ordering::Relaxed) {
                return Err(ExecError::Cancelled);
            }
        }
        if let Some(deadline) = deadline {
            if started.elapsed() > deadline {
                return Err(ExecError::DeadlineExceeded);
            }
        }

        let events = objects.object_events();
        stats.objects_scanned += 1;
        stats.events_scanned += events.len() as u64;
        interpreter.execute_object(events);

        has_object = objects.next_object();
    }

    stats.objects_skipped_malformed = objects.skipped_malformed();
    Ok((interpreter.into_tree(), stats))
}

fn count_shard(snapshot: &MemorySnapshot, start: &[u8], end: Option<&[u8]>) -> (u64, u64) {
    let Ok(mut cursor) = snapshot.cursor(EVENTS_SPACE) else {
        return (0, 0);
    };
    use sky_storage::StorageCursor;
    let mut objects = 0u64;
    let mut events = 0u64;

    if !cursor.set_range(start) {
        return (0, 0);
    }
    loop {
        let Some((key, _)) = cursor.get_current() else { break };
        if end.is_some_and(|end| key >= end) {
            break;
        }
        objects += 1;
        events += 1;
        while cursor.next_dup() {
            events += 1;
        }
        if !cursor.next_nodup() {
            break;
        }
    }
    (objects, events)
}
