//! # shmdb
//!
//! A shared-memory transport that puts a table store behind a synchronous
//! request/response channel, for benchmarking storage engines without
//! socket overhead.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  req region   ┌──────────────────────────────────────┐
//! │  Client  │ ────────────► │ Session ─► RequestHandler ─► Backend │
//! │          │ ◄──────────── │   (one thread per connection)        │
//! └──────────┘  resp region  └──────────────────────────────────────┘
//!                                 ▲ spawned by ConnectionManager
//! ```
//!
//! Byte 0 of each region is an atomic flag: the client raises an opcode in
//! the request flag, the session answers with a status in the response
//! flag. Everything after byte 0 is a little-endian payload.
//!
//! # Quick Start
//!
//! ```ignore
//! use shmdb::{Schema, Shmdb, Table, record};
//!
//! let db = Shmdb::in_process(Schema::new(
//!     vec![Table::new("usertable", ["field0", "field1"])],
//!     ":memory:",
//! ))?;
//!
//! let mut client = db.connect()?;
//! client.insert("usertable", "user1", &record([("field0", "A")]))?;
//! let row = client.read("usertable", "user1", &[])?;
//! client.close()?;
//! ```

mod error;
mod shmdb;

pub use error::{Result, ShmdbError};
pub use shmdb::Shmdb;

pub use shmdb_backend::{Backend, BackendError, BackendResult, MemoryBackend};
pub use shmdb_client::{Client, ClientConfig, ClientError, SchemaPublication, publish_schema};
pub use shmdb_config::{ConfigLoader, ShmdbConfig};
pub use shmdb_server::{
    ConnectionManager, ServerConfig, ServerError, ServerMetrics, SessionHandle, SessionState,
    SessionSummary,
};
pub use shmdb_shm::{AnonymousRegions, FileRegions, RegionHandle, RegionProvider, WaitStrategy};
pub use shmdb_types::{KvPair, Record, ResultSet, Schema, SessionId, Table, record};
pub use shmdb_wire::{Opcode, Status};
