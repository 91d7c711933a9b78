//! Wire protocol error types.

use thiserror::Error;

/// Result type for codec operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while encoding or decoding a payload.
///
/// Every variant is a protocol error: the buffer that produced it must be
/// abandoned, since the cursor position is unspecified after a failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    /// The encoder ran out of space in its buffer.
    #[error("buffer overflow: need {needed} bytes, {remaining} remaining")]
    BufferOverflow { needed: usize, remaining: usize },

    /// The decoder reached the end of its buffer mid-value.
    #[error("truncated payload: need {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A length prefix does not fit in this platform's address space.
    #[error("length prefix {0} exceeds addressable memory")]
    LengthOverflow(u64),

    /// A decoded string was not valid UTF-8.
    #[error("invalid UTF-8 in string payload")]
    InvalidUtf8,

    /// The request flag held a byte outside the known opcode set.
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    /// The response flag held a byte outside the known status set.
    #[error("unknown response status {0:#04x}")]
    UnknownStatus(u8),
}

impl WireError {
    /// Returns true if the error was raised while writing a payload.
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::BufferOverflow { .. })
    }
}
