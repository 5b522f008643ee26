use std::path::{Path, PathBuf};

use crate::buffer_pool::BufferPool;
use crate::config::GridBlobConfig;
use crate::error::Result;
use crate::meta::GridMetaInfo;
use crate::reader::{reconcile_tile_count, GridReader};
use crate::store::{SingleBlob, StorePin, TileStore, DEFAULT_BLOB_EXTENSION};

/// Reader over a grid stored in exactly one blob file.
///
/// The blob is opened lazily and closed after every transfer unless the
/// reader is pinned or configured with `leave_open`.
pub struct SingleBlobReader {
    meta: GridMetaInfo,
    store: SingleBlob,
    config: GridBlobConfig,
    pool: BufferPool,
}

impl SingleBlobReader {
    /// Open `<dir>/<name>.bin` described by `<dir>/<name>.info`.
    pub fn open(dir: impl AsRef<Path>, name: &str, config: GridBlobConfig) -> Result<Self> {
        let dir = dir.as_ref();
        let meta = GridMetaInfo::read_from_file(dir, name)?;
        Self::with_meta(SingleBlob::blob_path(dir, name, DEFAULT_BLOB_EXTENSION), meta, config)
    }

    /// Open a blob with an already known grid description.
    ///
    /// If the blob holds a different number of tiles than `meta` records,
    /// the file wins (with a warning) unless `strict_tile_count` is set.
    pub fn with_meta(blob: impl Into<PathBuf>, meta: GridMetaInfo, config: GridBlobConfig) -> Result<Self> {
        let mut store = SingleBlob::open(blob, meta.bytes_per_tile(), meta.tile_count(), config.leave_open)?;
        let meta = reconcile_tile_count(meta, store.stored_tiles()?, &config, store.path())?;
        store.set_tile_count(meta.tile_count());

        tracing::debug!(
            path = %store.path().display(),
            rows = meta.rows(),
            columns = meta.columns(),
            bytes_per_tile = meta.bytes_per_tile(),
            "Opened single blob grid"
        );

        Ok(Self {
            meta,
            store,
            pool: BufferPool::new(config.pool_buffers_per_size),
            config,
        })
    }

    /// Keep the blob open until the guard drops.
    pub fn pin(&self) -> Result<StorePin<'_>> {
        self.store.pin()
    }

    pub fn store(&self) -> &SingleBlob {
        &self.store
    }
}

impl GridReader for SingleBlobReader {
    fn meta(&self) -> &GridMetaInfo {
        &self.meta
    }

    fn config(&self) -> &GridBlobConfig {
        &self.config
    }

    fn buffer_pool(&self) -> &BufferPool {
        &self.pool
    }

    fn location(&self) -> &Path {
        self.store.path()
    }

    fn read_tile_bytes(&self, col: u32, row: u32, buf: &mut [u8]) -> Result<bool> {
        let tile_id = self.meta.addressing().tile_id(col, row)?;
        self.store
            .get(tile_id, buf)
            .map_err(|e| e.at_tile(col, row))
    }
}
