//! Runs small workloads through a live session.

use std::sync::Arc;

use shmdb_backend::MemoryBackend;
use shmdb_bench::{Operation, Workload, WorkloadMix};
use shmdb_client::{Client, ClientConfig};
use shmdb_server::{ConnectionManager, ServerConfig};
use shmdb_shm::{AnonymousRegions, WaitStrategy};
use shmdb_types::Schema;

fn run(mix: WorkloadMix, operations: u64) -> (shmdb_bench::WorkloadReport, u64) {
    let workload = Workload::ycsb(200, mix);
    let regions = Arc::new(AnonymousRegions::new());
    let manager = ConnectionManager::new(
        Arc::new(MemoryBackend::new()),
        regions.clone(),
        ServerConfig::new(64 * 1024).with_wait(WaitStrategy::Yield),
    )
    .unwrap();
    manager
        .install_schema(Schema::new(vec![workload.table_schema()], ":memory:"))
        .unwrap();

    let handle = manager.spawn().unwrap();
    let config = ClientConfig::default().with_wait(WaitStrategy::Yield);
    let mut client = Client::connect(regions.as_ref(), &handle, &config).unwrap();

    let load = workload.load(&mut client).unwrap();
    assert_eq!(load.count(), 200);
    let report = workload.run(&mut client, operations).unwrap();

    client.close().unwrap();
    let requests = manager.join(handle.id).unwrap().requests;
    (report, requests)
}

#[test]
fn update_heavy_mix() {
    let (report, requests) = run(WorkloadMix::a(), 1_000);

    assert_eq!(report.operations(), 1_000);
    assert_eq!(report.misses, 0);
    assert_eq!(report.latencies[&Operation::Read].count(), 500);
    assert_eq!(report.latencies[&Operation::Update].count(), 500);
    assert_eq!(requests, 200 + 1_000 + 1);

    let json = report.to_json();
    assert_eq!(json["operations"], 1_000);
    assert_eq!(json["per_operation"].as_array().unwrap().len(), 2);
}

#[test]
fn scan_mix_grows_the_table() {
    let (report, _) = run(WorkloadMix::e(), 400);

    assert_eq!(report.latencies[&Operation::Insert].count(), 20);
    assert_eq!(report.latencies[&Operation::Scan].count(), 380);
    assert!(report.overall().max() > 0);
}
