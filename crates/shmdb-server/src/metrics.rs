//! Prometheus metrics for sessions and operations.
//!
//! Each [`ConnectionManager`](crate::ConnectionManager) owns its own
//! registry, so independent managers (and tests) never share counters.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `shmdb_sessions_spawned_total` | counter | |
//! | `shmdb_sessions_active` | gauge | |
//! | `shmdb_spawn_failures_total` | counter | |
//! | `shmdb_operations_total` | counter | `op`, `status` |
//! | `shmdb_protocol_errors_total` | counter | |
//! | `shmdb_operation_duration_seconds` | histogram | `op` |

use std::time::Duration;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use shmdb_wire::{Opcode, Status};

use crate::error::ServerResult;

/// Round trips over shared memory sit in the low microseconds; the buckets
/// span 1µs to ~65ms.
const DURATION_BUCKETS: [f64; 17] = [
    1e-6, 2e-6, 4e-6, 8e-6, 16e-6, 32e-6, 64e-6, 128e-6, 256e-6, 512e-6, 1.024e-3, 2.048e-3,
    4.096e-3, 8.192e-3, 16.384e-3, 32.768e-3, 65.536e-3,
];

#[derive(Clone)]
pub struct ServerMetrics {
    registry: Registry,
    sessions_spawned: IntCounter,
    sessions_active: IntGauge,
    spawn_failures: IntCounter,
    operations: IntCounterVec,
    protocol_errors: IntCounter,
    operation_duration: HistogramVec,
}

impl ServerMetrics {
    pub fn new() -> ServerResult<Self> {
        let registry = Registry::new();

        let sessions_spawned =
            IntCounter::new("shmdb_sessions_spawned_total", "Sessions that reached Serving")?;
        let sessions_active =
            IntGauge::new("shmdb_sessions_active", "Sessions not yet terminated")?;
        let spawn_failures =
            IntCounter::new("shmdb_spawn_failures_total", "Spawn attempts that failed")?;
        let operations = IntCounterVec::new(
            Opts::new("shmdb_operations_total", "Requests served by opcode and status"),
            &["op", "status"],
        )?;
        let protocol_errors = IntCounter::new(
            "shmdb_protocol_errors_total",
            "Sessions aborted by a protocol violation",
        )?;
        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "shmdb_operation_duration_seconds",
                "Time from request observed to response published",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["op"],
        )?;

        registry.register(Box::new(sessions_spawned.clone()))?;
        registry.register(Box::new(sessions_active.clone()))?;
        registry.register(Box::new(spawn_failures.clone()))?;
        registry.register(Box::new(operations.clone()))?;
        registry.register(Box::new(protocol_errors.clone()))?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self {
            registry,
            sessions_spawned,
            sessions_active,
            spawn_failures,
            operations,
            protocol_errors,
            operation_duration,
        })
    }

    pub fn session_spawned(&self) {
        self.sessions_spawned.inc();
        self.sessions_active.inc();
    }

    pub fn session_terminated(&self) {
        self.sessions_active.dec();
    }

    pub fn spawn_failed(&self) {
        self.spawn_failures.inc();
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.inc();
    }

    pub fn record_operation(&self, op: Opcode, status: Status, elapsed: Duration) {
        self.operations
            .with_label_values(&[op.name(), status.name()])
            .inc();
        self.operation_duration
            .with_label_values(&[op.name()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn sessions_active(&self) -> i64 {
        self.sessions_active.get()
    }

    pub fn sessions_spawned(&self) -> u64 {
        self.sessions_spawned.get()
    }

    pub fn spawn_failures(&self) -> u64 {
        self.spawn_failures.get()
    }

    pub fn operations(&self, op: Opcode, status: Status) -> u64 {
        self.operations
            .with_label_values(&[op.name(), status.name()])
            .get()
    }

    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors.get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Renders every metric in the Prometheus text exposition format.
    pub fn render(&self) -> ServerResult<String> {
        Ok(TextEncoder::new().encode_to_string(&self.registry.gather())?)
    }
}

impl std::fmt::Debug for ServerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerMetrics")
            .field("sessions_spawned", &self.sessions_spawned())
            .field("sessions_active", &self.sessions_active())
            .field("protocol_errors", &self.protocol_errors())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = ServerMetrics::new().unwrap();
        assert_eq!(metrics.sessions_active(), 0);
        assert_eq!(metrics.sessions_spawned(), 0);
        assert_eq!(metrics.operations(Opcode::Read, Status::Ok), 0);
    }

    #[test]
    fn session_gauge_tracks_lifecycle() {
        let metrics = ServerMetrics::new().unwrap();
        metrics.session_spawned();
        metrics.session_spawned();
        metrics.session_terminated();

        assert_eq!(metrics.sessions_spawned(), 2);
        assert_eq!(metrics.sessions_active(), 1);
    }

    #[test]
    fn render_includes_labelled_operations() {
        let metrics = ServerMetrics::new().unwrap();
        metrics.record_operation(Opcode::Scan, Status::NotFound, Duration::from_micros(3));

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"shmdb_operations_total{op="scan",status="not_found"} 1"#));
        assert!(text.contains("shmdb_operation_duration_seconds_bucket"));
    }

    #[test]
    fn registries_are_independent() {
        let a = ServerMetrics::new().unwrap();
        let b = ServerMetrics::new().unwrap();
        a.protocol_error();
        assert_eq!(a.protocol_errors(), 1);
        assert_eq!(b.protocol_errors(), 0);
    }
}
