//! # shmdb-client: Client for shmdb sessions
//!
//! Drives one session's request/response regions with typed
//! Read/Scan/Insert/Update/Delete/Close calls.
//!
//! ## Usage
//!
//! ```ignore
//! use shmdb_client::{Client, ClientConfig};
//! use shmdb_types::record;
//!
//! let handle = manager.spawn()?;
//! let mut client = Client::connect(provider.as_ref(), &handle, &ClientConfig::default())?;
//!
//! client.insert("usertable", "user1", &record([("field0", "A")]))?;
//! let row = client.read("usertable", "user1", &[])?;
//! client.close()?;
//! ```
//!
//! Region capacity is not negotiated: the client encodes into whatever the
//! session was spawned with. Requests that do not fit fail locally without
//! reaching the session.

mod client;
mod error;

pub use client::{Client, ClientConfig, SchemaPublication, publish_schema};
pub use error::{ClientError, ClientResult};
