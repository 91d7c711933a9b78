//! End-to-end session tests: spawn, serve over real threads, close.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use shmdb_backend::MemoryBackend;
use shmdb_client::{Client, ClientConfig, ClientError, publish_schema};
use shmdb_config::{SchemaConfig, ShmdbConfig};
use shmdb_server::{ConnectionManager, ServerConfig, ServerError, SessionHandle};
use shmdb_shm::{AnonymousRegions, ChannelError, FileRegions, RegionProvider, WaitStrategy};
use shmdb_types::{KvPair, Schema, Table, record};
use shmdb_wire::EMPTY;
use test_case::test_case;

const TABLE: &str = "usertable";

fn ycsb_manager(provider: Arc<dyn RegionProvider>) -> ConnectionManager<MemoryBackend> {
    let config = ServerConfig::new(64 * 1024).with_wait(WaitStrategy::Yield);
    let manager = ConnectionManager::new(Arc::new(MemoryBackend::new()), provider, config).unwrap();
    manager.install_schema(SchemaConfig::ycsb(10).to_schema()).unwrap();
    manager
}

fn client_config() -> ClientConfig {
    ClientConfig::default()
        .with_wait(WaitStrategy::Yield)
        .with_poll_timeout(Duration::from_secs(30))
}

fn connect(manager: &ConnectionManager<MemoryBackend>, handle: &SessionHandle) -> Client {
    Client::connect(manager.provider().as_ref(), handle, &client_config()).unwrap()
}

fn as_set(record: &[KvPair]) -> HashSet<KvPair> {
    record.iter().cloned().collect()
}

fn file_backed() -> (Option<tempfile::TempDir>, Arc<dyn RegionProvider>) {
    let dir = tempfile::tempdir().unwrap();
    let provider = FileRegions::new(dir.path()).unwrap();
    (Some(dir), Arc::new(provider))
}

fn anonymous() -> (Option<tempfile::TempDir>, Arc<dyn RegionProvider>) {
    (None, Arc::new(AnonymousRegions::new()))
}

#[test_case(anonymous ; "anonymous regions")]
#[test_case(file_backed ; "file regions")]
fn insert_read_scan_close(backing: fn() -> (Option<tempfile::TempDir>, Arc<dyn RegionProvider>)) {
    let (dir, provider) = backing();
    let manager = ycsb_manager(provider);
    let handle = manager.spawn().unwrap();
    let mut client = connect(&manager, &handle);

    let written = record([("field0", "A"), ("field1", "B")]);
    client.insert(TABLE, "user1", &written).unwrap();
    client.insert(TABLE, "user2", &record([("field0", "C")])).unwrap();

    let read = client.read(TABLE, "user1", &[]).unwrap();
    assert_eq!(as_set(&read), as_set(&written));

    let rows = client.scan(TABLE, "user1", 1, &[]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(as_set(&rows[0]), as_set(&written));

    let projected = client.read(TABLE, "user1", &["field1"]).unwrap();
    assert_eq!(projected, record([("field1", "B")]));

    client.update(TABLE, "user2", &record([("field0", "D")])).unwrap();
    client.delete(TABLE, "user1").unwrap();
    assert!(client.read(TABLE, "user1", &[]).unwrap_err().is_not_found());
    assert_eq!(client.scan(TABLE, "user0", 10, &["field0"]).unwrap(), vec![record([("field0", "D")])]);

    client.close().unwrap();
    let summary = manager.join(handle.id).unwrap();
    assert_eq!(summary.requests, 10);

    if let Some(dir) = dir {
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

#[test]
fn ten_thousand_round_trips() {
    let manager = ycsb_manager(Arc::new(AnonymousRegions::new()));
    let handle = manager.spawn().unwrap();
    let mut client = connect(&manager, &handle);

    for i in 0..5_000 {
        let key = format!("user{i:05}");
        let value = format!("value-{i}");
        client.insert(TABLE, &key, &record([("field3", value.as_str())])).unwrap();
        assert_eq!(
            client.read(TABLE, &key, &[]).unwrap(),
            record([("field3", value.as_str())])
        );
    }

    client.close().unwrap();
    assert_eq!(manager.join(handle.id).unwrap().requests, 10_001);
    assert_eq!(manager.backend().record_count(TABLE), Some(5_000));
}

#[test]
fn concurrent_sessions_do_not_interfere() {
    const SESSIONS: usize = 8;
    const OPS: usize = 250;

    let manager = Arc::new(ycsb_manager(Arc::new(AnonymousRegions::new())));
    let handles: Vec<SessionHandle> = (0..SESSIONS).map(|_| manager.spawn().unwrap()).collect();
    assert_eq!(manager.active_sessions(), SESSIONS);

    let workers: Vec<_> = handles
        .iter()
        .enumerate()
        .map(|(n, handle)| {
            let manager = Arc::clone(&manager);
            let handle = handle.clone();
            thread::spawn(move || {
                let mut client = connect(&manager, &handle);
                for i in 0..OPS {
                    let key = format!("s{n}-k{i:04}");
                    let tag = format!("{n}:{i}");
                    client.insert(TABLE, &key, &record([("field0", tag.as_str())])).unwrap();
                    let read = client.read(TABLE, &key, &["field0"]).unwrap();
                    assert_eq!(read, record([("field0", tag.as_str())]));
                }
                let own = client.scan(TABLE, &format!("s{n}-"), OPS as u64, &[]).unwrap();
                assert!(own.iter().all(|row| row[0].value.starts_with(&format!("{n}:"))));
                client.close().unwrap();
            })
        })
        .collect();

    for worker in workers {
        worker.join().unwrap();
    }
    for handle in &handles {
        assert_eq!(manager.join(handle.id).unwrap().requests, (2 * OPS + 2) as u64);
    }
    assert_eq!(manager.backend().record_count(TABLE), Some(SESSIONS * OPS));
    assert_eq!(manager.metrics().sessions_active(), 0);
    assert_eq!(manager.backend().closed_sessions(), SESSIONS as u64);
}

#[test]
fn same_key_in_different_tables_stays_per_session() {
    let regions = Arc::new(AnonymousRegions::new());
    let config = ServerConfig::new(4096).with_wait(WaitStrategy::Yield);
    let manager = Arc::new(
        ConnectionManager::new(Arc::new(MemoryBackend::new()), regions.clone(), config).unwrap(),
    );
    manager
        .install_schema(Schema::new(
            vec![Table::new("t1", ["f"]), Table::new("t2", ["f"])],
            ":memory:",
        ))
        .unwrap();

    let workers: Vec<_> = [("t1", "A"), ("t2", "B")]
        .into_iter()
        .map(|(table, value)| {
            let manager = Arc::clone(&manager);
            let handle = manager.spawn().unwrap();
            thread::spawn(move || {
                let mut client = connect(&manager, &handle);
                client.insert(table, "u1", &record([("f", value)])).unwrap();
                let read = client.read(table, "u1", &[]).unwrap();
                client.close().unwrap();
                manager.join(handle.id).unwrap();
                read
            })
        })
        .collect();

    let reads: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    assert_eq!(reads, vec![record([("f", "A")]), record([("f", "B")])]);
    assert_eq!(manager.backend().record_count("t1"), Some(1));
    assert_eq!(manager.backend().record_count("t2"), Some(1));
}

#[test]
fn nothing_is_served_after_close() {
    let regions = Arc::new(AnonymousRegions::new());
    let manager = ycsb_manager(regions.clone());
    let handle = manager.spawn().unwrap();
    let request = regions.map(&handle.request).unwrap();
    let response = regions.map(&handle.response).unwrap();
    let mut client = connect(&manager, &handle);

    client.close().unwrap();
    manager.join(handle.id).unwrap();

    // The session is gone; a raised request flag stays unanswered.
    request.store_flag(b'r');
    thread::sleep(Duration::from_millis(50));
    assert_eq!(response.load_flag(), EMPTY);

    let err = client.close().unwrap_err();
    assert!(matches!(err, ClientError::Channel(ChannelError::Closed)));
    assert!(matches!(
        client.read(TABLE, "user1", &[]),
        Err(ClientError::Channel(ChannelError::Closed))
    ));
}

#[test]
fn protocol_violation_leaves_other_sessions_serving() {
    let regions = Arc::new(AnonymousRegions::new());
    let manager = ycsb_manager(regions.clone());
    let victim = manager.spawn().unwrap();
    let survivor = manager.spawn().unwrap();

    let mut bystander = connect(&manager, &survivor);
    bystander.insert(TABLE, "before", &record([("field0", "x")])).unwrap();

    regions.map(&victim.request).unwrap().store_flag(b'x');
    let err = manager.join(victim.id).unwrap_err();
    assert!(err.is_protocol());

    bystander.insert(TABLE, "after", &record([("field0", "y")])).unwrap();
    assert_eq!(bystander.scan(TABLE, "a", 10, &[]).unwrap().len(), 2);
    bystander.close().unwrap();
    manager.join(survivor.id).unwrap();

    // The aborted session released its regions on the way out.
    assert!(Client::connect(regions.as_ref(), &victim, &client_config()).is_err());
}

#[test]
fn schema_published_by_the_client() {
    let regions = Arc::new(AnonymousRegions::new());
    let manager =
        ConnectionManager::new(Arc::new(MemoryBackend::new()), regions.clone(), ServerConfig::new(4096))
            .unwrap();
    assert!(matches!(manager.spawn(), Err(ServerError::SchemaNotInstalled)));

    let schema = SchemaConfig::ycsb(3).to_schema();
    let publication = publish_schema(regions.as_ref(), &schema, 4096).unwrap();
    manager.install_schema_from_region(publication.handle()).unwrap();
    assert!(matches!(publication.acknowledgement(), Some(Ok(()))));
    regions.release(publication.handle()).unwrap();

    let handle = manager.spawn().unwrap();
    let mut client = connect(&manager, &handle);
    client.insert(TABLE, "user1", &record([("field2", "z")])).unwrap();
    assert!(matches!(
        client.insert(TABLE, "user1", &record([("field3", "z")])),
        Err(ClientError::Conflict)
    ));
    client.close().unwrap();
    manager.join(handle.id).unwrap();
}

#[test]
fn configured_manager_serves_with_configured_capacity() {
    let mut config = ShmdbConfig::power_saving();
    config.region.capacity = 512;
    config.session.poll_timeout_ms = 30_000;

    let regions = Arc::new(AnonymousRegions::new());
    let manager =
        ConnectionManager::new(Arc::new(MemoryBackend::new()), regions.clone(), ServerConfig::from(&config))
            .unwrap();
    manager.install_schema(SchemaConfig::ycsb(1).to_schema()).unwrap();

    let handle = manager.spawn().unwrap();
    let mut client = Client::connect(regions.as_ref(), &handle, &ClientConfig::from(&config)).unwrap();

    let big = "v".repeat(600);
    let err = client.insert(TABLE, "user1", &record([("field0", big.as_str())])).unwrap_err();
    assert!(err.is_recoverable());

    client.insert(TABLE, "user1", &record([("field0", "small")])).unwrap();
    client.close().unwrap();
    assert_eq!(manager.join(handle.id).unwrap().requests, 2);
}
