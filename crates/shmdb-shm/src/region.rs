//! A mapped shared region with its flag byte.

use std::fmt::{self, Display};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use memmap2::MmapRaw;
use serde::{Deserialize, Serialize};
use shmdb_types::HEADER_LEN;

use crate::error::{ShmError, ShmResult};

/// Smallest usable region: the flag byte plus one payload byte.
pub const MIN_CAPACITY: usize = HEADER_LEN + 1;

/// Identifies a region independently of any mapping of it.
///
/// Handles are what the connection manager hands back from a spawn: the
/// other party resolves them through the same kind of provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionHandle {
    /// An in-process anonymous mapping, resolved by id.
    Anonymous(u64),
    /// A file-backed mapping that any process can open by path.
    File(PathBuf),
}

impl Display for RegionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous(id) => write!(f, "anon:{id}"),
            Self::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

/// One mapping of a shared region.
///
/// Byte 0 is the flag, accessed only through atomic loads and stores.
/// Bytes `[1, capacity)` are the payload; who may touch them at any moment
/// is decided by the flag protocol in [`crate::channel`], not by the
/// mapping itself.
pub struct Region {
    handle: RegionHandle,
    map: Arc<MmapRaw>,
}

impl Region {
    pub(crate) fn new(handle: RegionHandle, map: Arc<MmapRaw>) -> ShmResult<Self> {
        if map.len() < MIN_CAPACITY {
            return Err(ShmError::CapacityTooSmall {
                capacity: map.len(),
                minimum: MIN_CAPACITY,
            });
        }
        Ok(Self { handle, map })
    }

    pub fn handle(&self) -> &RegionHandle {
        &self.handle
    }

    /// Total size of the region, flag byte included.
    pub fn capacity(&self) -> usize {
        self.map.len()
    }

    /// Bytes available to a payload.
    pub fn payload_capacity(&self) -> usize {
        self.capacity() - HEADER_LEN
    }

    fn flag(&self) -> &AtomicU8 {
        // SAFETY: the mapping is at least MIN_CAPACITY bytes and stays alive
        // for as long as `self.map` does. `AtomicU8` has alignment 1, and
        // byte 0 is only ever accessed atomically by both parties.
        unsafe { AtomicU8::from_ptr(self.map.as_mut_ptr()) }
    }

    /// Reads the flag with acquire ordering.
    ///
    /// A non-zero result makes every payload write the other party made
    /// before its release store visible to this thread.
    pub fn load_flag(&self) -> u8 {
        self.flag().load(Ordering::Acquire)
    }

    /// Writes the flag with release ordering, publishing all prior payload
    /// writes.
    pub fn store_flag(&self, value: u8) {
        self.flag().store(value, Ordering::Release);
    }

    /// Payload bytes for reading.
    ///
    /// # Safety
    ///
    /// The caller must hold the payload under the flag protocol: the other
    /// party has published it and will not write again until this side
    /// stores its own flag.
    pub(crate) unsafe fn payload(&self) -> &[u8] {
        // SAFETY: offset HEADER_LEN is in bounds (capacity >= MIN_CAPACITY);
        // exclusivity is the caller's obligation.
        unsafe {
            std::slice::from_raw_parts(
                self.map.as_ptr().add(HEADER_LEN),
                self.payload_capacity(),
            )
        }
    }

    /// Payload bytes for writing.
    ///
    /// # Safety
    ///
    /// The caller must be the only writer of the payload under the flag
    /// protocol, and the other party must not be reading it.
    pub(crate) unsafe fn payload_mut(&mut self) -> &mut [u8] {
        // SAFETY: as for `payload`; `&mut self` rules out aliasing through
        // this mapping, the flag protocol rules it out through the other.
        unsafe {
            std::slice::from_raw_parts_mut(
                self.map.as_mut_ptr().add(HEADER_LEN),
                self.payload_capacity(),
            )
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("handle", &self.handle)
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
