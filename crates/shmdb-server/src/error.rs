//! Server error types.

use shmdb_backend::BackendError;
use shmdb_shm::ShmError;
use shmdb_types::SessionId;
use shmdb_wire::{Opcode, WireError};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// A violation of the channel protocol.
///
/// Always fatal to the session it occurred in: the channel state is presumed
/// corrupted, so the session publishes an abort and shuts down.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The request flag held a byte outside the opcode set.
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// The request payload did not decode.
    #[error("malformed {opcode} request: {source}")]
    Malformed { opcode: Opcode, source: WireError },

    /// Not even an error reply fits in the response region.
    #[error("response region too small for any reply ({capacity} bytes)")]
    ResponseOverflow { capacity: usize },

    /// A control region did not hold the expected message.
    #[error("unexpected control flag {0:#04x}")]
    UnexpectedControlFlag(u8),
}

/// Errors that can occur during server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Channel protocol violation.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Wire codec error outside a session (e.g. a control message).
    #[error("wire protocol error: {0}")]
    Wire(#[from] WireError),

    /// Region allocation or mapping failed.
    #[error("region error: {0}")]
    Region(#[from] ShmError),

    /// Backend failure during schema creation or session init/close.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// I/O error (e.g. the OS refused to start a session thread).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Metrics registration failed.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// `install_schema` was called twice.
    #[error("schema already installed")]
    SchemaAlreadyInstalled,

    /// `spawn` was called before `install_schema`.
    #[error("schema not installed")]
    SchemaNotInstalled,

    /// No session with this id is being supervised.
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// The session thread panicked.
    #[error("{0} panicked")]
    SessionPanicked(SessionId),

    /// The session failed before reaching `Ready`; the cause was reported to
    /// the spawn caller.
    #[error("{0} failed to start")]
    StartupFailed(SessionId),
}

impl ServerError {
    /// Returns true if this is a protocol violation.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Returns true if region allocation or mapping failed.
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Region(_) | Self::Io(_))
    }

    /// Returns the protocol error if this is one.
    pub fn protocol(&self) -> Option<&ProtocolError> {
        match self {
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }
}
