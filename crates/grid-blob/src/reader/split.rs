use std::path::{Path, PathBuf};

use crate::buffer_pool::BufferPool;
use crate::config::GridBlobConfig;
use crate::error::Result;
use crate::meta::GridMetaInfo;
use crate::reader::GridReader;
use crate::store::{SplitBlobs, TileStore, DEFAULT_BLOB_EXTENSION};

/// Reader over a grid spread across `<name>0.bin`, `<name>1.bin`, ...
///
/// All blobs are discovered and opened when the reader is created and stay
/// open for its lifetime.
pub struct SplitBlobReader {
    meta: GridMetaInfo,
    store: SplitBlobs,
    config: GridBlobConfig,
    pool: BufferPool,
    location: PathBuf,
}

impl SplitBlobReader {
    /// Open the blobs of `<dir>/<name>` described by `<dir>/<name>.info`.
    pub fn open(dir: impl AsRef<Path>, name: &str, config: GridBlobConfig) -> Result<Self> {
        let dir = dir.as_ref();
        let meta = GridMetaInfo::read_from_file(dir, name)?;
        Self::with_meta(dir, name, DEFAULT_BLOB_EXTENSION, meta, config)
    }

    pub fn with_meta(
        dir: impl AsRef<Path>,
        name: &str,
        ext: &str,
        meta: GridMetaInfo,
        config: GridBlobConfig,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let store = SplitBlobs::open(dir, name, ext, &meta)?;
        Ok(Self {
            meta,
            store,
            pool: BufferPool::new(config.pool_buffers_per_size),
            config,
            location: dir.join(name),
        })
    }

    pub fn store(&self) -> &SplitBlobs {
        &self.store
    }
}

impl GridReader for SplitBlobReader {
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
        &self.location
    }

    fn read_tile_bytes(&self, col: u32, row: u32, buf: &mut [u8]) -> Result<bool> {
        let tile_id = self.meta.addressing().tile_id(col, row)?;
        self.store
            .get(tile_id, buf)
            .map_err(|e| e.at_tile(col, row))
    }
}
