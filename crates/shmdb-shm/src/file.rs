//! File-backed shared mappings.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::MmapOptions;
use uuid::Uuid;

use crate::error::{ShmError, ShmResult};
use crate::provider::RegionProvider;
use crate::region::{MIN_CAPACITY, Region, RegionHandle};

/// Provider that creates one file per region inside a directory.
///
/// Pointing the directory at a tmpfs such as `/dev/shm` keeps the regions in
/// memory; any process that can open the path can map the region. Release
/// unlinks the file, which does not disturb existing mappings.
#[derive(Debug, Clone)]
pub struct FileRegions {
    dir: PathBuf,
}

impl FileRegions {
    /// Creates a provider rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> ShmResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_of<'h>(&self, handle: &'h RegionHandle) -> ShmResult<&'h Path> {
        match handle {
            RegionHandle::File(path) => Ok(path),
            RegionHandle::Anonymous(_) => Err(ShmError::ForeignHandle(handle.clone())),
        }
    }
}

impl RegionProvider for FileRegions {
    fn allocate(&self, capacity: usize) -> ShmResult<RegionHandle> {
        if capacity < MIN_CAPACITY {
            return Err(ShmError::CapacityTooSmall {
                capacity,
                minimum: MIN_CAPACITY,
            });
        }

        let path = self.dir.join(format!("shmdb-{}.region", Uuid::new_v4()));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        if let Err(e) = file.set_len(capacity as u64) {
            let _ = fs::remove_file(&path);
            return Err(e.into());
        }

        tracing::trace!(path = %path.display(), capacity, "allocated file region");
        Ok(RegionHandle::File(path))
    }

    fn map(&self, handle: &RegionHandle) -> ShmResult<Region> {
        let path = self.path_of(handle)?;
        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ShmError::UnknownRegion(handle.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let len = usize::try_from(file.metadata()?.len()).unwrap_or(usize::MAX);
        let map = MmapOptions::new()
            .len(len)
            .map_raw(&file)
            .map_err(|source| ShmError::MapFailed {
                handle: handle.clone(),
                source,
            })?;
        Region::new(handle.clone(), Arc::new(map))
    }

    fn release(&self, handle: &RegionHandle) -> ShmResult<()> {
        let path = self.path_of(handle)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ShmError::UnknownRegion(handle.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
