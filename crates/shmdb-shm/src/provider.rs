//! Region provider trait.
//!
//! The [`RegionProvider`] trait abstracts where shared regions come from:
//! - [`AnonymousRegions`](crate::AnonymousRegions): shared anonymous
//!   mappings, for sessions and clients in the same process
//! - [`FileRegions`](crate::FileRegions): file-backed mappings (e.g. under
//!   `/dev/shm`) that a separate process can open by path
//!
//! Both sides of a channel must resolve handles through the same kind of
//! provider.

use std::fmt::Debug;

use crate::error::ShmResult;
use crate::region::{Region, RegionHandle};

/// Source of shared regions.
///
/// A handle stays valid from [`allocate`](Self::allocate) until
/// [`release`](Self::release). Mappings obtained before release remain
/// usable until dropped; only new [`map`](Self::map) calls fail.
pub trait RegionProvider: Send + Sync + Debug {
    /// Allocates a zero-filled region of `capacity` bytes.
    fn allocate(&self, capacity: usize) -> ShmResult<RegionHandle>;

    /// Maps an allocated region read/write.
    fn map(&self, handle: &RegionHandle) -> ShmResult<Region>;

    /// Releases a region. Existing mappings stay valid until dropped.
    fn release(&self, handle: &RegionHandle) -> ShmResult<()>;

    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Allocates and maps in one step, releasing the allocation if the
    /// mapping fails.
    fn allocate_mapped(&self, capacity: usize) -> ShmResult<Region> {
        let handle = self.allocate(capacity)?;
        match self.map(&handle) {
            Ok(region) => Ok(region),
            Err(e) => {
                if let Err(release_err) = self.release(&handle) {
                    tracing::warn!(%handle, error = %release_err, "failed to release unmapped region");
                }
                Err(e)
            }
        }
    }
}
