//! Server configuration.

use std::time::Duration;

use shmdb_config::{ShmdbConfig, WaitMode};
use shmdb_shm::{Poller, WaitStrategy};
use shmdb_types::DEFAULT_REGION_CAPACITY;

/// Settings applied to every session a connection manager spawns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Size of each allocated region, flag byte included.
    pub capacity: usize,
    /// What an idle session does between polls.
    pub wait: WaitStrategy,
    /// Empty polls spent spinning before `wait` applies.
    pub spin_limit: u32,
    /// Session threads are named `{prefix}-{id}`.
    pub thread_name_prefix: String,
}

impl ServerConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_spin_limit(mut self, spin_limit: u32) -> Self {
        self.spin_limit = spin_limit;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// The poller sessions use on their request region. Sessions never time
    /// out: they only stop on Close.
    pub fn poller(&self) -> Poller {
        Poller::new(self.wait).with_spin_limit(self.spin_limit)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_REGION_CAPACITY,
            wait: WaitStrategy::default(),
            spin_limit: 1_000,
            thread_name_prefix: "shmdb-session".to_string(),
        }
    }
}

impl From<&ShmdbConfig> for ServerConfig {
    fn from(config: &ShmdbConfig) -> Self {
        let session = &config.session;
        Self {
            capacity: config.region.capacity,
            wait: wait_strategy(session.wait, session.sleep_interval()),
            spin_limit: session.spin_limit,
            thread_name_prefix: session.thread_name_prefix.clone(),
        }
    }
}

/// Maps the configured wait mode onto a poller strategy.
pub fn wait_strategy(mode: WaitMode, sleep: Duration) -> WaitStrategy {
    match mode {
        WaitMode::Spin => WaitStrategy::Spin,
        WaitMode::Yield => WaitStrategy::Yield,
        WaitMode::Sleep => WaitStrategy::Sleep(sleep),
    }
}
