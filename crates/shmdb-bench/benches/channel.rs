//! Round-trip benchmarks over a live session.
//!
//! Every iteration is one full rendezvous: encode, raise the request flag,
//! session decode and dispatch to the in-memory backend, publish, decode.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use shmdb_backend::MemoryBackend;
use shmdb_bench::{LatencyTracker, Workload, WorkloadMix};
use shmdb_client::{Client, ClientConfig};
use shmdb_server::{ConnectionManager, ServerConfig};
use shmdb_shm::{AnonymousRegions, WaitStrategy};
use shmdb_types::{Schema, SessionId};
use tracing_subscriber::EnvFilter;

const RECORDS: u64 = 10_000;

struct Harness {
    manager: ConnectionManager<MemoryBackend>,
    client: Client,
    id: SessionId,
}

impl Harness {
    fn start(wait: WaitStrategy, workload: &Workload) -> Self {
        let regions = Arc::new(AnonymousRegions::new());
        let manager = ConnectionManager::new(
            Arc::new(MemoryBackend::new()),
            regions.clone(),
            ServerConfig::default().with_wait(wait),
        )
        .unwrap();
        manager
            .install_schema(Schema::new(vec![workload.table_schema()], ":memory:"))
            .unwrap();

        let handle = manager.spawn().unwrap();
        let config = ClientConfig::default().with_wait(wait);
        let mut client = Client::connect(regions.as_ref(), &handle, &config).unwrap();
        workload.load(&mut client).unwrap();

        Self {
            manager,
            client,
            id: handle.id,
        }
    }

    fn finish(mut self) {
        self.client.close().unwrap();
        self.manager.join(self.id).unwrap();
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

// ============================================================================
// Single Operations
// ============================================================================

fn bench_round_trip(c: &mut Criterion) {
    init_tracing();
    let mut group = c.benchmark_group("round_trip");
    let workload = Workload::ycsb(RECORDS, WorkloadMix::c());

    for (name, wait) in [("spin", WaitStrategy::Spin), ("yield", WaitStrategy::Yield)] {
        let mut harness = Harness::start(wait, &workload);
        let mut n = 0u64;

        group.bench_function(BenchmarkId::new("read", name), |b| {
            b.iter(|| {
                n = (n + 7_919) % RECORDS;
                let key = format!("user{n:010}");
                black_box(harness.client.read("usertable", &key, &[]).unwrap());
            });
        });

        group.bench_function(BenchmarkId::new("scan_10", name), |b| {
            b.iter(|| {
                n = (n + 7_919) % (RECORDS - 10);
                let key = format!("user{n:010}");
                black_box(harness.client.scan("usertable", &key, 10, &[]).unwrap());
            });
        });

        harness.finish();
    }

    group.finish();
}

// ============================================================================
// Workload Latency Distribution
// ============================================================================

fn bench_workload_tail(c: &mut Criterion) {
    init_tracing();
    let mut group = c.benchmark_group("workload");
    group.sample_size(10);

    for (name, mix) in [("a", WorkloadMix::a()), ("b", WorkloadMix::b())] {
        let workload = Workload::ycsb(RECORDS, mix);
        let mut harness = Harness::start(WaitStrategy::Spin, &workload);
        let mut overall = LatencyTracker::new();

        group.bench_function(BenchmarkId::new("ycsb", name), |b| {
            b.iter_custom(|iters| {
                let started = Instant::now();
                let report = workload.run(&mut harness.client, iters).unwrap();
                overall.merge(&report.overall());
                started.elapsed()
            });
        });

        overall.print_summary(&format!("ycsb-{name}"));
        println!("{}", overall.to_json(&format!("ycsb-{name}")));
        harness.finish();
    }

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(channel_benches, bench_round_trip, bench_workload_tail);

criterion_main!(channel_benches);
