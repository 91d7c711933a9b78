//! Shared-memory and channel error types.

use std::time::Duration;

use shmdb_wire::WireError;
use thiserror::Error;

use crate::RegionHandle;

/// Result type for region operations.
pub type ShmResult<T> = Result<T, ShmError>;

/// Result type for channel round trips.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors raised while allocating, mapping or releasing regions.
///
/// These are resource errors: they fail the operation that hit them and
/// leave every other region untouched.
#[derive(Debug, Error)]
pub enum ShmError {
    /// I/O error from the operating system.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Mapping a region into the address space failed.
    #[error("failed to map {handle}: {source}")]
    MapFailed {
        handle: RegionHandle,
        source: std::io::Error,
    },

    /// A region must hold at least the flag byte and one payload byte.
    #[error("region capacity {capacity} is too small (minimum {minimum})")]
    CapacityTooSmall { capacity: usize, minimum: usize },

    /// The provider refused to allocate more regions.
    #[error("region limit reached: {limit} live regions")]
    Exhausted { limit: usize },

    /// The handle does not name a live region of this provider.
    #[error("unknown region {0}")]
    UnknownRegion(RegionHandle),

    /// The handle was produced by a different kind of provider.
    #[error("region {0} does not belong to this provider")]
    ForeignHandle(RegionHandle),
}

/// Errors observed by the client side of a channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Encoding the request or decoding the response failed.
    #[error("wire protocol error: {0}")]
    Wire(#[from] WireError),

    /// The channel completed a Close round trip; no further calls are allowed.
    #[error("channel closed")]
    Closed,

    /// A previous call left the channel in an unknown state.
    #[error("channel poisoned by an earlier failure")]
    Poisoned,

    /// The server did not publish a response within the poll deadline.
    #[error("no response after {waited:?}")]
    Timeout { waited: Duration },

    /// The session hit a protocol violation and shut down.
    #[error("session aborted by server")]
    Aborted,
}

impl ChannelError {
    /// Returns true if the channel can no longer carry requests.
    ///
    /// An overflow while encoding a request is the only non-fatal case: the
    /// request flag was never raised, so the server saw nothing.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Wire(WireError::BufferOverflow { .. }))
    }
}
