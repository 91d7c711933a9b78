//! Flag byte values for the request and response regions.

use std::fmt::{self, Display};

use crate::error::WireError;

/// Value of a flag byte when no message is pending.
pub const EMPTY: u8 = 0;

/// Flag of a control region holding an encoded [`Schema`](shmdb_types::Schema).
///
/// The server overwrites it with a [`Status`] once the schema is installed.
pub const SCHEMA_MESSAGE: u8 = b'S';

/// Operation selector stored in byte 0 of the request region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Read = b'r',
    Scan = b's',
    Insert = b'i',
    Update = b'u',
    Delete = b'd',
    Close = b'c',
}

impl Opcode {
    pub const ALL: [Opcode; 6] = [
        Opcode::Read,
        Opcode::Scan,
        Opcode::Insert,
        Opcode::Update,
        Opcode::Delete,
        Opcode::Close,
    ];

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Short lowercase name, used as a metrics label.
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Read => "read",
            Opcode::Scan => "scan",
            Opcode::Insert => "insert",
            Opcode::Update => "update",
            Opcode::Delete => "delete",
            Opcode::Close => "close",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = WireError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'r' => Ok(Opcode::Read),
            b's' => Ok(Opcode::Scan),
            b'i' => Ok(Opcode::Insert),
            b'u' => Ok(Opcode::Update),
            b'd' => Ok(Opcode::Delete),
            b'c' => Ok(Opcode::Close),
            other => Err(WireError::UnknownOpcode(other)),
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Completion status stored in byte 0 of the response region.
///
/// Any non-zero value marks the response as published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    /// The operation succeeded; the payload holds its result, if any.
    Ok = 1,
    /// The key or range did not exist. Read and Scan also carry an empty
    /// sequence.
    NotFound = 2,
    /// The backend rejected the write (e.g. duplicate key).
    Conflict = 3,
    /// Any other backend failure; the payload holds a message string.
    Failed = 4,
    /// The session hit a protocol violation and has shut down.
    Aborted = 0xFF,
}

impl Status {
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::NotFound => "not_found",
            Status::Conflict => "conflict",
            Status::Failed => "failed",
            Status::Aborted => "aborted",
        }
    }

    /// Returns true if the session is still usable after this status.
    pub fn is_recoverable(self) -> bool {
        !matches!(self, Status::Aborted)
    }
}

impl TryFrom<u8> for Status {
    type Error = WireError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            1 => Ok(Status::Ok),
            2 => Ok(Status::NotFound),
            3 => Ok(Status::Conflict),
            4 => Ok(Status::Failed),
            0xFF => Ok(Status::Aborted),
            other => Err(WireError::UnknownStatus(other)),
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
