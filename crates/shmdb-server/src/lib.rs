//! # shmdb-server: Sessions and the connection manager
//!
//! Each client connection is a [`Session`] serving one pair of shared
//! regions on its own thread. The [`ConnectionManager`] installs the schema
//! once, allocates regions, starts sessions and supervises them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        shmdb-server                          │
//! │  ┌───────────────────┐   spawn   ┌────────────────────────┐  │
//! │  │ ConnectionManager │ ────────► │ Session (own thread)   │  │
//! │  │  schema, monitors │           │  ServerChannel         │  │
//! │  └───────────────────┘           │  → RequestHandler      │  │
//! │                                  │  → Backend::Context    │  │
//! │                                  └────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sessions share nothing with each other. A protocol violation aborts only
//! the session it happened in.
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use shmdb_backend::MemoryBackend;
//! use shmdb_server::{ConnectionManager, ServerConfig};
//! use shmdb_shm::AnonymousRegions;
//!
//! let manager = ConnectionManager::new(
//!     Arc::new(MemoryBackend::new()),
//!     Arc::new(AnonymousRegions::new()),
//!     ServerConfig::default(),
//! )?;
//! manager.install_schema(schema)?;
//! let handle = manager.spawn()?;
//! ```

mod config;
mod error;
mod handler;
mod manager;
pub mod metrics;
mod session;

pub use config::{ServerConfig, wait_strategy};
pub use error::{ProtocolError, ServerError, ServerResult};
pub use handler::{RequestHandler, encode_outcome, status_of};
pub use manager::ConnectionManager;
pub use metrics::ServerMetrics;
pub use session::{Session, SessionState, SessionSummary, StateCell};
pub use shmdb_shm::SessionHandle;
