//! # shmdb-backend: Storage behind a session
//!
//! Sessions drive a [`Backend`] through five record operations (read, scan,
//! insert, update, delete) plus schema creation and per-session
//! init/close. [`MemoryBackend`] is the reference implementation used by
//! tests and benchmarks.

mod backend;
mod error;
mod memory;

pub use backend::Backend;
pub use error::{BackendError, BackendResult};
pub use memory::{MemoryBackend, MemoryContext};
