//! # shmdb-wire: Payload codec for `shmdb` channels
//!
//! Every message exchanged over a shared region has the shape
//! `[flag: 1 byte][payload]`. The flag is an [`Opcode`] in the request
//! region and a [`Status`] in the response region; the payload is produced
//! by an [`Encoder`] and consumed by a [`Decoder`].
//!
//! All integers are 8-byte little-endian regardless of host word size, and
//! every read and write is bounds checked against the buffer it was given.

mod codec;
mod error;
mod message;
mod opcode;


pub use codec::{Decode, Decoder, Encode, Encoder, U64_LEN};
pub use error::{WireError, WireResult};
pub use message::{DeleteRequest, ReadRequest, Reply, Request, ScanRequest, WriteRequest};
pub use opcode::{EMPTY, Opcode, SCHEMA_MESSAGE, Status};
