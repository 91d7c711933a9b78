//! # shmdb-bench: Latency benchmarks for the shmdb transport
//!
//! Provides the latency bookkeeping shared by the criterion benches and a
//! YCSB-style [`Workload`] driver that runs an operation mix through a live
//! session.

#![allow(clippy::cast_precision_loss)] // Latency stats use f64 for percentile calculations
#![allow(clippy::cast_possible_truncation)] // Nanosecond counts fit in u64
//!
//! ## Benchmarks
//!
//! - **wire**: request/response payload encoding and decoding
//! - **channel**: full round trips over a spawned session
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench -p shmdb-bench
//!
//! # Run one benchmark, logging session lifecycle
//! RUST_LOG=shmdb_server=info cargo bench -p shmdb-bench --bench channel
//!
//! # Save and compare baselines
//! cargo bench -p shmdb-bench --bench channel -- --save-baseline main
//! cargo bench -p shmdb-bench --bench channel -- --baseline main
//! ```

use std::time::Duration;

use hdrhistogram::Histogram;

mod workload;

pub use workload::{Operation, Workload, WorkloadMix, WorkloadReport};

/// Tracks latency percentiles for operations.
#[derive(Debug, Clone)]
pub struct LatencyTracker {
    histogram: Histogram<u64>,
}

impl LatencyTracker {
    /// Creates a new latency tracker with 3 significant digits.
    pub fn new() -> Self {
        Self {
            histogram: Histogram::new(3).expect("valid histogram config"),
        }
    }

    /// Records a latency measurement in nanoseconds.
    pub fn record(&mut self, latency_ns: u64) {
        self.histogram.record(latency_ns).ok();
    }

    /// Records an elapsed duration.
    pub fn record_elapsed(&mut self, elapsed: Duration) {
        self.record(elapsed.as_nanos() as u64);
    }

    /// Folds another tracker's samples into this one.
    pub fn merge(&mut self, other: &LatencyTracker) {
        self.histogram.add(&other.histogram).ok();
    }

    pub fn count(&self) -> u64 {
        self.histogram.len()
    }

    pub fn p50(&self) -> u64 {
        self.histogram.value_at_quantile(0.50)
    }

    pub fn p95(&self) -> u64 {
        self.histogram.value_at_quantile(0.95)
    }

    pub fn p99(&self) -> u64 {
        self.histogram.value_at_quantile(0.99)
    }

    pub fn p999(&self) -> u64 {
        self.histogram.value_at_quantile(0.999)
    }

    pub fn max(&self) -> u64 {
        self.histogram.max()
    }

    pub fn mean(&self) -> f64 {
        self.histogram.mean()
    }

    pub fn min(&self) -> u64 {
        self.histogram.min()
    }

    /// Exports latency statistics as JSON for CI integration.
    pub fn to_json(&self, operation: &str) -> serde_json::Value {
        serde_json::json!({
            "operation": operation,
            "count": self.count(),
            "min_ns": self.min(),
            "p50_ns": self.p50(),
            "p95_ns": self.p95(),
            "p99_ns": self.p99(),
            "p999_ns": self.p999(),
            "max_ns": self.max(),
            "mean_ns": self.mean(),
        })
    }

    /// Prints a summary of latency statistics.
    pub fn print_summary(&self, operation: &str) {
        println!("{operation} latency ({} samples):", self.count());
        for (label, ns) in [
            ("p50", self.p50()),
            ("p95", self.p95()),
            ("p99", self.p99()),
            ("p99.9", self.p999()),
            ("max", self.max()),
        ] {
            println!("  {label:<6} {ns:>10} ns ({:>8.2} μs)", ns as f64 / 1000.0);
        }
        println!(
            "  {:<6} {:>10.0} ns ({:>8.2} μs)",
            "mean",
            self.mean(),
            self.mean() / 1000.0
        );
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentiles_are_ordered() {
        let mut tracker = LatencyTracker::new();
        for i in 1..=100 {
            tracker.record(i * 1000);
        }

        assert!(tracker.p50() > 0);
        assert!(tracker.p99() > tracker.p50());
        assert!(tracker.p999() >= tracker.p99());
        assert!(tracker.max() >= tracker.p999());
    }

    #[test]
    fn mean_includes_outliers() {
        let mut tracker = LatencyTracker::new();
        tracker.record(1000);
        tracker.record(2000);
        tracker.record(3000);
        tracker.record_elapsed(Duration::from_micros(10));

        assert!((tracker.mean() - 4000.0).abs() < 500.0);
        assert!(tracker.max() >= 10000);
    }

    #[test]
    fn merge_adds_samples() {
        let mut a = LatencyTracker::new();
        let mut b = LatencyTracker::new();
        a.record(1000);
        b.record(2000);
        b.record(3000);

        a.merge(&b);
        assert_eq!(a.count(), 3);
    }

    #[test]
    fn json_export() {
        let mut tracker = LatencyTracker::new();
        tracker.record(1000);
        tracker.record(5000);
        tracker.record(10000);

        let json = tracker.to_json("read");
        assert_eq!(json["operation"], "read");
        assert_eq!(json["count"], 3);
        assert!(json["max_ns"].as_u64().unwrap() >= 10000);
    }
}
