//! # shmdb-shm: Shared regions and the rendezvous channel
//!
//! This crate owns every `unsafe` access to shared memory in `shmdb`:
//!
//! - [`Region`]: one mapping of a fixed-capacity region whose byte 0 is an
//!   atomic flag
//! - [`RegionProvider`]: allocation, mapping and release of regions, with
//!   [`AnonymousRegions`] and [`FileRegions`] implementations
//! - [`Poller`]: flag polling with a configurable [`WaitStrategy`]
//! - [`ServerChannel`] / [`ClientChannel`]: the two ends of the
//!   request/response rendezvous
//! - [`ControlRegion`]: one-shot control messages such as schema install
//!
//! Payload bytes are exposed only inside the channel types, which enforce
//! the single-writer discipline of the flag protocol.

#![allow(unsafe_code)]

mod anonymous;
mod channel;
mod control;
mod error;
mod file;
mod provider;
mod region;
mod wait;


pub use anonymous::AnonymousRegions;
pub use channel::{ClientChannel, ServerChannel, SessionHandle};
pub use control::ControlRegion;
pub use error::{ChannelError, ChannelResult, ShmError, ShmResult};
pub use file::FileRegions;
pub use provider::RegionProvider;
pub use region::{MIN_CAPACITY, Region, RegionHandle};
pub use wait::{Elapsed, Poller, WaitStrategy};
