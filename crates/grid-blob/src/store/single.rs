use std::path::{Path, PathBuf};

use crate::error::{GridBlobError, Result};
use crate::store::handle::{BlobHandle, OpenMode};
use crate::store::lock::TileLock;
use crate::store::{check_buffer, check_tile_id, StorePin, TileStore};

/// All tiles in one blob file.
#[derive(Debug)]
pub struct SingleBlob {
    handle: BlobHandle,
    bytes_per_tile: usize,
    tile_count: u64,
}

impl SingleBlob {
    /// `<dir>/<name>.<ext>`
    pub fn blob_path(dir: impl AsRef<Path>, name: &str, ext: &str) -> PathBuf {
        dir.as_ref().join(format!("{name}.{ext}"))
    }

    /// Open an existing blob for reading.
    pub fn open(path: impl Into<PathBuf>, bytes_per_tile: usize, tile_count: u64, leave_open: bool) -> Result<Self> {
        let store = Self {
            handle: BlobHandle::new(path, OpenMode::Read, leave_open),
            bytes_per_tile,
            tile_count,
        };
        // fail fast on a missing blob
        store.handle.open_now()?;
        Ok(store)
    }

    /// Read/write store; the blob is created on the first transfer.
    pub fn create(path: impl Into<PathBuf>, bytes_per_tile: usize, tile_count: u64, leave_open: bool) -> Self {
        Self {
            handle: BlobHandle::new(path, OpenMode::ReadWriteCreate, leave_open),
            bytes_per_tile,
            tile_count,
        }
    }

    pub fn handle(&self) -> &BlobHandle {
        &self.handle
    }

    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    /// Number of whole tiles the file currently holds.
    pub fn stored_tiles(&self) -> Result<u64> {
        Ok(self.handle.file_len()? / self.bytes_per_tile as u64)
    }

    /// Change the number of addressable tiles.
    pub(crate) fn set_tile_count(&mut self, tile_count: u64) {
        self.tile_count = tile_count;
    }

    fn offset(&self, tile_id: u64) -> u64 {
        tile_id * self.bytes_per_tile as u64
    }
}

impl TileStore for SingleBlob {
    fn bytes_per_tile(&self) -> usize {
        self.bytes_per_tile
    }

    fn tile_count(&self) -> u64 {
        self.tile_count
    }

    fn get(&self, tile_id: u64, buf: &mut [u8]) -> Result<bool> {
        check_tile_id(tile_id, self.tile_count)?;
        check_buffer(self.bytes_per_tile, buf.len())?;
        let lease = self.handle.lease()?;
        let read = lease
            .read_at(buf, self.offset(tile_id))
            .map_err(|e| GridBlobError::io(lease.path(), e))?;
        Ok(read > 0)
    }

    fn put(&self, tile_id: u64, bytes: &[u8]) -> Result<()> {
        check_tile_id(tile_id, self.tile_count)?;
        check_buffer(self.bytes_per_tile, bytes.len())?;
        if self.handle.mode() == OpenMode::Read {
            return Err(GridBlobError::invalid_argument(format!(
                "blob {} is open read-only",
                self.handle.path().display()
            )));
        }
        let lease = self.handle.lease()?;
        lease
            .write_all_at(bytes, self.offset(tile_id))
            .map_err(|e| GridBlobError::io(lease.path(), e))
    }

    fn lock_tile(&self, tile_id: u64) -> Result<TileLock<'_>> {
        check_tile_id(tile_id, self.tile_count)?;
        TileLock::acquire(self.handle.lease()?, self.offset(tile_id), self.bytes_per_tile as u64)
    }

    fn pin(&self) -> Result<StorePin<'_>> {
        Ok(StorePin::new(vec![self.handle.pin()?]))
    }

    fn preallocate(&self) -> Result<()> {
        let full = self.tile_count * self.bytes_per_tile as u64;
        if self.handle.file_len()? < full {
            self.handle.set_len(full)?;
        }
        Ok(())
    }
}
