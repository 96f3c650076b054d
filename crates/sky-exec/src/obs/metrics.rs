use serde_json::{json, Value as Json};

///
/// ExecStats
///
/// Object/event counters for one query run, in the spirit of
/// `examples/dragginzgame-icydb/crates/icydb-core/src/obs/metrics/mod.rs`'s
/// `EventOps`: call counters are execution attempts, row counters reflect
/// what was actually touched. `sky-exec` has no IC canister runtime to hang
/// a candid-serializable global on, so these are plain per-shard counters
/// the executor sums at merge time, standing in for
/// `examples/original_source/skyd/benchmark.go`'s `stats()` object-counting
/// wrapper (spec.md §6 `stats` operation).
///

#[derive(Clone, Copy, Debug, Default)]
pub struct ExecStats {
    pub shards_run: u64,
    pub objects_scanned: u64,
    pub objects_skipped_malformed: u64,
    pub events_scanned: u64,
}

impl ExecStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: ExecStats) {
        self.shards_run += other.shards_run;
        self.objects_scanned += other.objects_scanned;
        self.objects_skipped_malformed += other.objects_skipped_malformed;
        self.events_scanned += other.events_scanned;
    }

    #[must_use]
    pub fn to_json(self) -> Json {
        json!({
            "shardsRun": self.shards_run,
            "objectsScanned": self.objects_scanned,
            "objectsSkippedMalformed": self.objects_skipped_malformed,
            "eventsScanned": self.events_scanned,
        })
    }
}
