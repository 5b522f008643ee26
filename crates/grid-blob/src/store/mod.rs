//! Blob-backed tile storage.
//!
//! A [`TileStore`] moves whole tiles in and out of one or more blob files.
//! Readers and the writer are expressed against this capability; the two
//! backends differ only in how a tile id maps to a file and an offset.
//!
//! ```text
//! single:  <dir>/<name>.<ext>       tile n at [n*bpt, (n+1)*bpt)
//! split:   <dir>/<name><i>.<ext>    blob i holds tiles [i*tpb, (i+1)*tpb)
//! ```

pub mod handle;
pub mod lock;
mod single;
mod split;

pub use handle::{BlobHandle, OpenMode, PinGuard};
pub use lock::TileLock;
pub use single::SingleBlob;
pub use split::SplitBlobs;

use crate::error::Result;

/// Extension used for blob files when none is given.
pub const DEFAULT_BLOB_EXTENSION: &str = "bin";

/// Whole-tile access to a grid's blob storage.
///
/// Implementations must be safe to share between threads; transfers of
/// different tiles may run concurrently.
pub trait TileStore: Send + Sync {
    /// Size of one tile payload.
    fn bytes_per_tile(&self) -> usize;

    /// Number of tile ids this store can address.
    fn tile_count(&self) -> u64;

    /// Fill `buf` with tile `tile_id`. Returns false if the tile has no
    /// backing bytes yet; the buffer is fully overwritten either way.
    ///
    /// `buf` must be exactly [`bytes_per_tile`](Self::bytes_per_tile) long.
    fn get(&self, tile_id: u64, buf: &mut [u8]) -> Result<bool>;

    /// Store a full tile.
    fn put(&self, tile_id: u64, bytes: &[u8]) -> Result<()>;

    /// Lock the byte range of one tile for a read-modify-write. The blob
    /// stays open while the lock is held.
    fn lock_tile(&self, tile_id: u64) -> Result<TileLock<'_>>;

    /// Keep every blob open until the returned guard drops.
    fn pin(&self) -> Result<StorePin<'_>>;

    /// Extend the blob(s) to hold every tile.
    fn preallocate(&self) -> Result<()>;
}

/// Pins on every blob of a store.
pub struct StorePin<'a> {
    _guards: Vec<PinGuard<'a>>,
}

impl<'a> StorePin<'a> {
    pub(crate) fn new(guards: Vec<PinGuard<'a>>) -> Self {
        Self { _guards: guards }
    }
}

pub(crate) fn check_buffer(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(crate::error::GridBlobError::invalid_argument(format!(
            "tile buffer must be {expected} bytes, got {actual}"
        )));
    }
    Ok(())
}

pub(crate) fn check_tile_id(tile_id: u64, tile_count: u64) -> Result<()> {
    if tile_id >= tile_count {
        return Err(crate::error::GridBlobError::out_of_range(format!(
            "tile id {tile_id} outside grid of {tile_count} tiles"
        )));
    }
    Ok(())
}
