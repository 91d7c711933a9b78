//! YCSB-style workload driver.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use anyhow::{Context, Result};
use shmdb_client::{Client, ClientError};
use shmdb_types::{KvPair, Table};

use crate::LatencyTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    Read,
    Scan,
    Insert,
    Update,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Scan => "scan",
            Operation::Insert => "insert",
            Operation::Update => "update",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Relative weights of each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadMix {
    pub read: u32,
    pub scan: u32,
    pub insert: u32,
    pub update: u32,
}

impl WorkloadMix {
    /// Update heavy: 50% reads, 50% updates.
    pub fn a() -> Self {
        Self {
            read: 50,
            scan: 0,
            insert: 0,
            update: 50,
        }
    }

    /// Read mostly: 95% reads, 5% updates.
    pub fn b() -> Self {
        Self {
            read: 95,
            scan: 0,
            insert: 0,
            update: 5,
        }
    }

    /// Read only.
    pub fn c() -> Self {
        Self {
            read: 100,
            scan: 0,
            insert: 0,
            update: 0,
        }
    }

    /// Short ranges: 95% scans, 5% inserts.
    pub fn e() -> Self {
        Self {
            read: 0,
            scan: 95,
            insert: 5,
            update: 0,
        }
    }

    fn total(&self) -> u32 {
        self.read + self.scan + self.insert + self.update
    }

    /// Picks the operation for slot `n`, spreading each weight evenly over
    /// every window of `total()` slots.
    fn pick(&self, n: u64) -> Operation {
        let total = u64::from(self.total().max(1));
        let mut slot = (n.wrapping_mul(7_919)) % total;
        for (weight, op) in [
            (self.read, Operation::Read),
            (self.scan, Operation::Scan),
            (self.insert, Operation::Insert),
        ] {
            if slot < u64::from(weight) {
                return op;
            }
            slot -= u64::from(weight);
        }
        Operation::Update
    }
}

/// A table shape plus an operation mix.
#[derive(Debug, Clone)]
pub struct Workload {
    pub table: String,
    pub field_count: usize,
    pub field_len: usize,
    pub record_count: u64,
    pub scan_length: u64,
    pub mix: WorkloadMix,
}

impl Workload {
    /// The YCSB defaults: 10 fields of 100 bytes.
    pub fn ycsb(record_count: u64, mix: WorkloadMix) -> Self {
        Self {
            table: "usertable".to_string(),
            field_count: 10,
            field_len: 100,
            record_count,
            scan_length: 10,
            mix,
        }
    }

    pub fn table_schema(&self) -> Table {
        Table::new(
            self.table.clone(),
            (0..self.field_count).map(|i| format!("field{i}")),
        )
    }

    fn key(n: u64) -> String {
        format!("user{n:010}")
    }

    fn values(&self, n: u64) -> Vec<KvPair> {
        let fill = char::from(b'a' + (n % 26) as u8);
        (0..self.field_count)
            .map(|i| KvPair::new(format!("field{i}"), fill.to_string().repeat(self.field_len)))
            .collect()
    }

    /// Inserts the initial `record_count` records.
    pub fn load(&self, client: &mut Client) -> Result<LatencyTracker> {
        let mut tracker = LatencyTracker::new();
        for n in 0..self.record_count {
            let values = self.values(n);
            let started = Instant::now();
            client
                .insert(&self.table, &Self::key(n), &values)
                .with_context(|| format!("loading record {n}"))?;
            tracker.record_elapsed(started.elapsed());
        }
        tracing::info!(records = self.record_count, table = %self.table, "workload loaded");
        Ok(tracker)
    }

    /// Runs `operations` requests of the mix against loaded data.
    pub fn run(&self, client: &mut Client, operations: u64) -> Result<WorkloadReport> {
        let mut report = WorkloadReport::default();
        let mut next_insert = self.record_count;
        let span = self.record_count.max(1);

        for n in 0..operations {
            let op = self.mix.pick(n);
            let key = Self::key(n.wrapping_mul(2_654_435_761) % span);
            let started = Instant::now();
            let outcome = match op {
                Operation::Read => client.read(&self.table, &key, &[]).map(drop),
                Operation::Scan => client
                    .scan(&self.table, &key, self.scan_length, &[])
                    .map(drop),
                Operation::Update => {
                    let values = self.values(n);
                    client.update(&self.table, &key, &values[..1])
                }
                Operation::Insert => {
                    let values = self.values(next_insert);
                    next_insert += 1;
                    client.insert(&self.table, &Self::key(next_insert - 1), &values)
                }
            };
            let elapsed = started.elapsed();

            match outcome {
                Ok(()) => {}
                Err(ClientError::NotFound) => report.misses += 1,
                Err(e) => return Err(e).with_context(|| format!("{op} #{n} on {key}")),
            }
            report.latencies.entry(op).or_default().record_elapsed(elapsed);
        }
        Ok(report)
    }
}

/// Per-operation latencies from one [`Workload::run`].
#[derive(Debug, Default)]
pub struct WorkloadReport {
    pub latencies: BTreeMap<Operation, LatencyTracker>,
    /// Reads and scans that found nothing.
    pub misses: u64,
}

impl WorkloadReport {
    pub fn operations(&self) -> u64 {
        self.latencies.values().map(LatencyTracker::count).sum()
    }

    /// All operations combined.
    pub fn overall(&self) -> LatencyTracker {
        let mut all = LatencyTracker::new();
        for tracker in self.latencies.values() {
            all.merge(tracker);
        }
        all
    }

    pub fn to_json(&self) -> serde_json::Value {
        let per_op: Vec<_> = self
            .latencies
            .iter()
            .map(|(op, tracker)| tracker.to_json(op.name()))
            .collect();
        serde_json::json!({
            "operations": self.operations(),
            "misses": self.misses,
            "per_operation": per_op,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mix_follows_weights() {
        let mix = WorkloadMix::b();
        let reads = (0..1000).filter(|&n| mix.pick(n) == Operation::Read).count();
        assert_eq!(reads, 950);
    }

    #[test]
    fn read_only_mix_never_writes() {
        let mix = WorkloadMix::c();
        assert!((0..500).all(|n| mix.pick(n) == Operation::Read));
    }

    #[test]
    fn records_match_the_table() {
        let workload = Workload::ycsb(10, WorkloadMix::a());
        let table = workload.table_schema();
        let values = workload.values(3);

        assert_eq!(values.len(), 10);
        assert!(values.iter().all(|kv| table.has_column(&kv.field)));
        assert!(values.iter().all(|kv| kv.value == "d".repeat(100)));
    }
}
