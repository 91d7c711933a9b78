//! Flag polling.
//!
//! Waiting on a flag spins first, then falls back to the configured
//! [`WaitStrategy`] once `spin_limit` polls have come up empty. Pure spinning
//! gives the lowest wake latency; yielding or sleeping trades latency for
//! CPU.

use std::time::{Duration, Instant};

use shmdb_wire::EMPTY;

use crate::region::Region;

/// How often the deadline is checked while still spinning.
const DEADLINE_CHECK_INTERVAL: u32 = 1024;

/// What a poller does between empty polls once spinning is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Keep spinning with a CPU pause hint.
    Spin,
    /// Yield the thread to the scheduler.
    Yield,
    /// Sleep for the given duration.
    Sleep(Duration),
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self::Sleep(Duration::from_micros(1))
    }
}

/// Polling did not observe a set flag before the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed(pub Duration);

/// Busy-polls a region flag until it becomes non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    strategy: WaitStrategy,
    spin_limit: u32,
    deadline: Option<Duration>,
}

impl Poller {
    pub fn new(strategy: WaitStrategy) -> Self {
        Self {
            strategy,
            spin_limit: 0,
            deadline: None,
        }
    }

    /// Spins this many times before applying the strategy.
    pub fn with_spin_limit(mut self, spin_limit: u32) -> Self {
        self.spin_limit = spin_limit;
        self
    }

    /// Gives up after `deadline`. `None` waits forever.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn strategy(&self) -> WaitStrategy {
        self.strategy
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Waits until the flag of `region` is non-zero and returns it.
    ///
    /// The load uses acquire ordering, so the payload is safe to read once
    /// this returns.
    pub fn wait(&self, region: &Region) -> Result<u8, Elapsed> {
        let started = self.deadline.map(|_| Instant::now());
        let mut polls: u32 = 0;

        loop {
            let flag = region.load_flag();
            if flag != EMPTY {
                return Ok(flag);
            }

            polls = polls.saturating_add(1);
            let spinning = polls <= self.spin_limit;

            if let (Some(deadline), Some(started)) = (self.deadline, started)
                && (!spinning || polls % DEADLINE_CHECK_INTERVAL == 0)
            {
                let waited = started.elapsed();
                if waited >= deadline {
                    return Err(Elapsed(waited));
                }
            }

            if spinning {
                std::hint::spin_loop();
                continue;
            }
            match self.strategy {
                WaitStrategy::Spin => std::hint::spin_loop(),
                WaitStrategy::Yield => std::thread::yield_now(),
                WaitStrategy::Sleep(interval) => std::thread::sleep(interval),
            }
        }
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(WaitStrategy::default())
    }
}
