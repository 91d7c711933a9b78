//! In-process shared anonymous mappings.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use memmap2::{MmapOptions, MmapRaw};

use crate::error::{ShmError, ShmResult};
use crate::provider::RegionProvider;
use crate::region::{MIN_CAPACITY, Region, RegionHandle};

/// Provider backed by anonymous mappings shared between threads.
///
/// Every `map` of a handle returns a view of the same memory. The memory is
/// unmapped once the region is released and the last [`Region`] viewing it
/// is dropped.
#[derive(Debug)]
pub struct AnonymousRegions {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, Arc<MmapRaw>>>,
    limit: Option<usize>,
}

impl AnonymousRegions {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            live: Mutex::new(HashMap::new()),
            limit: None,
        }
    }

    /// Creates a provider that refuses to hold more than `limit` live
    /// regions at once.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new()
        }
    }

    /// Number of allocated, unreleased regions.
    pub fn live_regions(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for AnonymousRegions {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionProvider for AnonymousRegions {
    fn allocate(&self, capacity: usize) -> ShmResult<RegionHandle> {
        if capacity < MIN_CAPACITY {
            return Err(ShmError::CapacityTooSmall {
                capacity,
                minimum: MIN_CAPACITY,
            });
        }

        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(limit) = self.limit
            && live.len() >= limit
        {
            return Err(ShmError::Exhausted { limit });
        }

        let map = MmapOptions::new().len(capacity).map_anon()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        live.insert(id, Arc::new(MmapRaw::from(map)));

        tracing::trace!(id, capacity, "allocated anonymous region");
        Ok(RegionHandle::Anonymous(id))
    }

    fn map(&self, handle: &RegionHandle) -> ShmResult<Region> {
        let RegionHandle::Anonymous(id) = handle else {
            return Err(ShmError::ForeignHandle(handle.clone()));
        };
        let map = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| ShmError::UnknownRegion(handle.clone()))?;
        Region::new(handle.clone(), map)
    }

    fn release(&self, handle: &RegionHandle) -> ShmResult<()> {
        let RegionHandle::Anonymous(id) = handle else {
            return Err(ShmError::ForeignHandle(handle.clone()));
        };
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .map(drop)
            .ok_or_else(|| ShmError::UnknownRegion(handle.clone()))
    }

    fn name(&self) -> &'static str {
        "anonymous"
    }
}
