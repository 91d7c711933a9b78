//! Client error types.

use shmdb_shm::{ChannelError, ShmError};
use shmdb_wire::WireError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by [`Client`](crate::Client) calls.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The key, or every key in the scanned range, does not exist.
    #[error("record not found")]
    NotFound,

    /// The backend rejected the write.
    #[error("write conflict")]
    Conflict,

    /// The backend failed; the message is the server's.
    #[error("server failure: {0}")]
    Failed(String),

    /// The channel refused or lost the call.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Mapping or allocating a region failed.
    #[error("region error: {0}")]
    Region(#[from] ShmError),

    /// A control message did not encode.
    #[error("wire protocol error: {0}")]
    Wire(#[from] WireError),
}

impl ClientError {
    /// Returns true if the session is still usable after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::NotFound | Self::Conflict | Self::Failed(_) => true,
            Self::Channel(e) => !e.is_fatal(),
            Self::Region(_) | Self::Wire(_) => false,
        }
    }

    /// Returns true if this is a `NotFound` error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
