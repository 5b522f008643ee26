use std::path::{Path, PathBuf};

use crate::error::{GridBlobError, Result};
use crate::meta::GridMetaInfo;
use crate::store::handle::{BlobHandle, OpenMode};
use crate::store::lock::TileLock;
use crate::store::{check_buffer, check_tile_id, StorePin, TileStore};

/// Tiles spread over `<name>0.<ext>`, `<name>1.<ext>`, ... each holding a
/// contiguous run of `tiles_per_blob` tiles. The last blob may be shorter.
#[derive(Debug)]
pub struct SplitBlobs {
    blobs: Vec<BlobHandle>,
    tiles_per_blob: u64,
    bytes_per_tile: usize,
    tile_count: u64,
}

impl SplitBlobs {
    /// `<dir>/<name><index>.<ext>`
    pub fn blob_path(dir: impl AsRef<Path>, name: &str, index: usize, ext: &str) -> PathBuf {
        dir.as_ref().join(format!("{name}{index}.{ext}"))
    }

    /// Blobs present on disk, probing from index 0 until one is missing.
    pub fn discover(dir: impl AsRef<Path>, name: &str, ext: &str) -> Vec<PathBuf> {
        let dir = dir.as_ref();
        (0..)
            .map(|i| Self::blob_path(dir, name, i, ext))
            .take_while(|p| p.is_file())
            .collect()
    }

    /// Open every discovered blob for reading and check that together they
    /// hold exactly the tiles described by `meta`. Handles stay open for
    /// the lifetime of the store.
    pub fn open(dir: impl AsRef<Path>, name: &str, ext: &str, meta: &GridMetaInfo) -> Result<Self> {
        let dir = dir.as_ref();
        let paths = Self::discover(dir, name, ext);
        if paths.is_empty() {
            return Err(GridBlobError::corrupt_grid(format!(
                "no blobs named {name}<n>.{ext} in {}",
                dir.display()
            )));
        }

        let bytes_per_tile = meta.bytes_per_tile();
        let mut blobs = Vec::with_capacity(paths.len());
        let mut sizes = Vec::with_capacity(paths.len());
        for path in paths {
            let handle = BlobHandle::new(path, OpenMode::Read, true);
            handle.open_now()?;
            sizes.push(handle.file_len()?);
            blobs.push(handle);
        }

        let total: u64 = sizes.iter().sum();
        if total != meta.total_bytes() {
            return Err(GridBlobError::corrupt_grid(format!(
                "{} blobs hold {total} bytes, grid needs {} ({} tiles of {bytes_per_tile} bytes)",
                blobs.len(),
                meta.total_bytes(),
                meta.tile_count()
            )));
        }

        let first = sizes[0];
        if first == 0 || first % bytes_per_tile as u64 != 0 {
            return Err(GridBlobError::corrupt_grid(format!(
                "first blob size {first} is not a positive multiple of the tile size {bytes_per_tile}"
            )));
        }
        let last = sizes.len() - 1;
        for (i, &size) in sizes.iter().enumerate() {
            let consistent = if i < last { size == first } else { size <= first };
            if !consistent {
                return Err(GridBlobError::corrupt_grid(format!(
                    "blob {} has {size} bytes, expected {first}",
                    blobs[i].path().display()
                )));
            }
        }

        let tiles_per_blob = first / bytes_per_tile as u64;
        tracing::debug!(
            dir = %dir.display(),
            name,
            blobs = blobs.len(),
            tiles_per_blob,
            "Opened split grid"
        );

        Ok(Self {
            blobs,
            tiles_per_blob,
            bytes_per_tile,
            tile_count: meta.tile_count(),
        })
    }

    /// Read/write store whose blobs are at most `max_blob_size` bytes.
    /// Blob files are created on the first transfer into them.
    pub fn create(
        dir: impl AsRef<Path>,
        name: &str,
        ext: &str,
        meta: &GridMetaInfo,
        max_blob_size: u64,
        leave_open: bool,
    ) -> Result<Self> {
        let bytes_per_tile = meta.bytes_per_tile();
        let tiles_per_blob = max_blob_size / bytes_per_tile as u64;
        if tiles_per_blob == 0 {
            return Err(GridBlobError::invalid_argument(format!(
                "maximum blob size {max_blob_size} is smaller than one tile ({bytes_per_tile} bytes)"
            )));
        }
        let blob_count = meta.tile_count().div_ceil(tiles_per_blob) as usize;
        let blobs = (0..blob_count)
            .map(|i| BlobHandle::new(Self::blob_path(&dir, name, i, ext), OpenMode::ReadWriteCreate, leave_open))
            .collect();

        Ok(Self {
            blobs,
            tiles_per_blob,
            bytes_per_tile,
            tile_count: meta.tile_count(),
        })
    }

    pub fn tiles_per_blob(&self) -> u64 {
        self.tiles_per_blob
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    pub fn blob_paths(&self) -> impl Iterator<Item = &Path> {
        self.blobs.iter().map(BlobHandle::path)
    }

    /// Blob holding `tile_id` and the tile's offset inside it.
    fn locate(&self, tile_id: u64) -> Result<(&BlobHandle, u64)> {
        check_tile_id(tile_id, self.tile_count)?;
        let index = (tile_id / self.tiles_per_blob) as usize;
        let offset = (tile_id % self.tiles_per_blob) * self.bytes_per_tile as u64;
        let blob = self.blobs.get(index).ok_or_else(|| {
            GridBlobError::corrupt_grid(format!("tile id {tile_id} maps to missing blob {index}"))
        })?;
        Ok((blob, offset))
    }

    fn tiles_in_blob(&self, index: usize) -> u64 {
        let start = index as u64 * self.tiles_per_blob;
        self.tiles_per_blob.min(self.tile_count.saturating_sub(start))
    }
}

impl TileStore for SplitBlobs {
    fn bytes_per_tile(&self) -> usize {
        self.bytes_per_tile
    }

    fn tile_count(&self) -> u64 {
        self.tile_count
    }

    fn get(&self, tile_id: u64, buf: &mut [u8]) -> Result<bool> {
        check_buffer(self.bytes_per_tile, buf.len())?;
        let (blob, offset) = self.locate(tile_id)?;
        if blob.mode() == OpenMode::ReadWriteCreate && !blob.is_open() && !blob.path().exists() {
            buf.fill(0);
            return Ok(false);
        }
        let lease = blob.lease()?;
        let read = lease
            .read_at(buf, offset)
            .map_err(|e| GridBlobError::io(lease.path(), e))?;
        Ok(read > 0)
    }

    fn put(&self, tile_id: u64, bytes: &[u8]) -> Result<()> {
        check_buffer(self.bytes_per_tile, bytes.len())?;
        let (blob, offset) = self.locate(tile_id)?;
        if blob.mode() == OpenMode::Read {
            return Err(GridBlobError::invalid_argument(format!(
                "blob {} is open read-only",
                blob.path().display()
            )));
        }
        let lease = blob.lease()?;
        lease
            .write_all_at(bytes, offset)
            .map_err(|e| GridBlobError::io(lease.path(), e))
    }

    fn lock_tile(&self, tile_id: u64) -> Result<TileLock<'_>> {
        let (blob, offset) = self.locate(tile_id)?;
        TileLock::acquire(blob.lease()?, offset, self.bytes_per_tile as u64)
    }

    fn pin(&self) -> Result<StorePin<'_>> {
        let guards = self.blobs.iter().map(BlobHandle::pin).collect::<Result<Vec<_>>>()?;
        Ok(StorePin::new(guards))
    }

    fn preallocate(&self) -> Result<()> {
        for (index, blob) in self.blobs.iter().enumerate() {
            let full = self.tiles_in_blob(index) * self.bytes_per_tile as u64;
            if blob.file_len()? < full {
                blob.set_len(full)?;
            }
        }
        Ok(())
    }
}
