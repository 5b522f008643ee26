//! Creating and updating grids.
//!
//! A [`GridWriter`] starts either bound to a known grid geometry or unbound,
//! in which case the first source raster written determines the geometry.
//! Once bound the geometry never changes, and the blob file(s) are
//! extended to hold every tile of the grid.
//!
//! Partial writes are read-modify-write cycles per tile:
//!
//! ```text
//! lock(mutex) -> lock(byte range) -> get(tile) -> overlay(source) -> put(tile)
//! ```
//!
//! and only ever go through the [`TileStore`] capability, so single and
//! split blob layouts behave the same.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::buffer_pool::BufferPool;
use crate::config::GridBlobConfig;
use crate::error::{GridBlobError, Result};
use crate::georef::RasterGeoReference;
use crate::meta::GridMetaInfo;
use crate::raster::{SourceRaster, TileTarget};
use crate::store::{SingleBlob, SplitBlobs, StorePin, TileStore, DEFAULT_BLOB_EXTENSION};
use crate::types::{BoundingBox, RasterRect, SampleLayout, TileRange};

/// Geometry and layout choices for a new grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    /// Number of tile columns. Derived from the default tile width if unset.
    pub columns: Option<u32>,
    /// Number of tile rows. Derived from the default tile width if unset.
    pub rows: Option<u32>,
    /// Split the grid into blobs of at most this many bytes.
    pub max_blob_size: Option<u64>,
    /// Blob file extension.
    pub extension: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            columns: None,
            rows: None,
            max_blob_size: None,
            extension: DEFAULT_BLOB_EXTENSION.to_string(),
        }
    }
}

impl WriterOptions {
    pub fn with_grid(mut self, columns: u32, rows: u32) -> Self {
        self.columns = Some(columns);
        self.rows = Some(rows);
        self
    }

    pub fn with_max_blob_size(mut self, bytes: u64) -> Self {
        self.max_blob_size = Some(bytes);
        self
    }
}

struct Bound {
    meta: GridMetaInfo,
    store: Box<dyn TileStore>,
}

/// Writes tiles and metadata of one grid at `<dir>/<name>`.
pub struct GridWriter {
    dir: PathBuf,
    name: String,
    options: WriterOptions,
    config: GridBlobConfig,
    pool: BufferPool,
    state: OnceLock<Bound>,
    write_lock: Mutex<()>,
}

impl GridWriter {
    /// Writer whose geometry is taken from the first raster written.
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>, options: WriterOptions, config: GridBlobConfig) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            pool: BufferPool::new(config.pool_buffers_per_size),
            options,
            config,
            state: OnceLock::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Writer bound to an existing grid description.
    pub fn with_meta(
        dir: impl Into<PathBuf>,
        name: impl Into<String>,
        meta: GridMetaInfo,
        options: WriterOptions,
        config: GridBlobConfig,
    ) -> Result<Self> {
        let writer = Self::new(dir, name, options, config);
        writer.bind_to(meta)?;
        Ok(writer)
    }

    /// Writer bound to a grid covering `envelope`, with the tile layout
    /// derived from `options` and the configured default tile width.
    pub fn with_geometry(
        dir: impl Into<PathBuf>,
        name: impl Into<String>,
        envelope: &BoundingBox,
        geo_reference: &RasterGeoReference,
        layout: SampleLayout,
        options: WriterOptions,
        config: GridBlobConfig,
    ) -> Result<Self> {
        let writer = Self::new(dir, name, options, config);
        let meta = writer.derive_meta(envelope, geo_reference, layout)?;
        writer.bind_to(meta)?;
        Ok(writer)
    }

    pub fn is_bound(&self) -> bool {
        self.state.get().is_some()
    }

    /// Grid description, once bound.
    pub fn meta(&self) -> Option<&GridMetaInfo> {
        self.state.get().map(|bound| &bound.meta)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tile layout for a raster covering `envelope` at `geo_reference`'s
    /// resolution: `columns = max(1, ceil(width / default_tile_width))`,
    /// `tile_width = ceil(width / columns)`, and the same for rows.
    fn derive_meta(
        &self,
        envelope: &BoundingBox,
        geo_reference: &RasterGeoReference,
        layout: SampleLayout,
    ) -> Result<GridMetaInfo> {
        self.config
            .validate()
            .map_err(GridBlobError::invalid_argument)?;
        let pixels = geo_reference.pixel_rect_for(envelope);
        if pixels.is_empty() {
            return Err(GridBlobError::invalid_argument(format!(
                "envelope {envelope:?} covers no pixels"
            )));
        }
        let width = pixels.width as u64;
        let height = pixels.height as u64;
        let default_tile = self.config.default_tile_width as u64;

        let columns = match self.options.columns {
            Some(c) => c as u64,
            None => width.div_ceil(default_tile).max(1),
        };
        let rows = match self.options.rows {
            Some(r) => r as u64,
            None => height.div_ceil(default_tile).max(1),
        };
        if columns == 0 || rows == 0 {
            return Err(GridBlobError::invalid_argument(format!(
                "target grid must have positive columns and rows, got {columns}x{rows}"
            )));
        }
        let to_u32 = |v: u64, what: &str| {
            u32::try_from(v).map_err(|_| GridBlobError::invalid_argument(format!("{what} {v} too large")))
        };

        GridMetaInfo::new(
            to_u32(rows, "rows")?,
            to_u32(columns, "columns")?,
            to_u32(width.div_ceil(columns), "tile width")?,
            to_u32(height.div_ceil(rows), "tile height")?,
            geo_reference.relocated(pixels.x, pixels.y),
            layout,
        )
    }

    fn bind_to(&self, meta: GridMetaInfo) -> Result<&Bound> {
        if let Some(bound) = self.state.get() {
            return Ok(bound);
        }
        let store: Box<dyn TileStore> = match self.options.max_blob_size {
            Some(max) => Box::new(SplitBlobs::create(
                &self.dir,
                &self.name,
                &self.options.extension,
                &meta,
                max,
                self.config.leave_open,
            )?),
            None => Box::new(SingleBlob::create(
                SingleBlob::blob_path(&self.dir, &self.name, &self.options.extension),
                meta.bytes_per_tile(),
                meta.tile_count(),
                self.config.leave_open,
            )),
        };
        // every tile the metadata describes must exist in the blob(s)
        store.preallocate()?;
        tracing::info!(
            dir = %self.dir.display(),
            name = %self.name,
            rows = meta.rows(),
            columns = meta.columns(),
            tile_width = meta.tile_width(),
            tile_height = meta.tile_height(),
            split = self.options.max_blob_size.is_some(),
            "Bound grid writer"
        );
        // a concurrent first write may have bound already; either result
        // describes the same grid
        let _ = self.state.set(Bound { meta, store });
        self.bound()
    }

    fn bound(&self) -> Result<&Bound> {
        self.state.get().ok_or_else(|| {
            GridBlobError::invalid_argument(format!(
                "grid writer for {} has no geometry yet; write a raster first",
                self.name
            ))
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| {
            GridBlobError::io(
                &self.dir,
                std::io::Error::new(std::io::ErrorKind::Other, "grid writer mutex poisoned"),
            )
        })
    }

    /// Merge `source` into every tile it overlaps.
    ///
    /// `rect` restricts the write to a pixel rectangle of the grid. Sub-rasters
    /// of `source` are released as soon as the last tile they touch has been
    /// written. Returns the number of tiles written.
    pub fn write<S: SourceRaster + ?Sized>(&self, source: &mut S, rect: Option<RasterRect>) -> Result<usize> {
        let bound = match self.state.get() {
            Some(bound) => bound,
            None => {
                let meta = self.derive_meta(&source.envelope(), source.geo_reference(), source.layout())?;
                self.bind_to(meta)?
            }
        };
        let meta = &bound.meta;
        if source.layout() != meta.layout() {
            return Err(GridBlobError::invalid_argument(format!(
                "raster layout {:?} does not match grid layout {:?}",
                source.layout(),
                meta.layout()
            )));
        }

        let addressing = meta.addressing();
        let source_envelope = source.envelope();
        let footprint = meta.geo_reference().pixel_rect_for(&source_envelope);
        let Some(tiles) = addressing.intersecting_tiles(&footprint) else {
            return Err(GridBlobError::corrupt_grid(format!(
                "raster {source_envelope:?} lies outside the grid envelope {:?}",
                meta.envelope()
            )));
        };
        let restriction = match rect {
            Some(rect) => match rect.intersection(&footprint) {
                Some(r) => Some(meta.geo_reference().world_envelope_for(&r)),
                None => return Ok(0),
            },
            None => None,
        };

        tracing::debug!(
            name = %self.name,
            min_col = tiles.min_col,
            min_row = tiles.min_row,
            max_col = tiles.max_col,
            max_row = tiles.max_row,
            "Writing raster"
        );

        let bytes_per_tile = meta.bytes_per_tile();
        let mut written = 0;
        for (col, row) in tiles.iter() {
            let mut target_envelope = meta.tile_world_envelope(col, row);
            if let Some(restriction) = &restriction {
                match target_envelope.intersection(restriction) {
                    Some(env) => target_envelope = env,
                    None => continue,
                }
            }
            if !target_envelope.intersects(&source_envelope) {
                continue;
            }

            let tile_id = addressing.tile_id(col, row)?;
            {
                let _guard = self.lock()?;
                let _range = bound.store.lock_tile(tile_id).map_err(|e| e.at_tile(col, row))?;
                let mut buf = self.pool.acquire(bytes_per_tile);
                bound.store.get(tile_id, &mut buf).map_err(|e| e.at_tile(col, row))?;

                let mut target = TileTarget {
                    envelope: target_envelope,
                    geo_reference: meta.tile_geo_reference(col, row),
                    width: meta.tile_width(),
                    height: meta.tile_height(),
                    layout: meta.layout(),
                    bytes: &mut buf,
                };
                source.overlay(&mut target)?;
                bound.store.put(tile_id, &buf).map_err(|e| e.at_tile(col, row))?;
            }
            written += 1;
            tracing::debug!(name = %self.name, col, row, "Wrote tile");

            let released = source.release_consumed(&mut |sub_envelope: &BoundingBox| {
                consumed_after(meta, &tiles, sub_envelope, (col, row))
            });
            if released > 0 {
                tracing::debug!(col, row, released, "Released merged sub-rasters");
            }
        }

        // sub-rasters whose last tile was skipped by `rect` are done too
        let last = (tiles.max_col, tiles.max_row);
        source.release_consumed(&mut |sub_envelope: &BoundingBox| consumed_after(meta, &tiles, sub_envelope, last));
        Ok(written)
    }

    /// Overwrite one whole tile.
    pub fn write_tile(&self, col: u32, row: u32, bytes: &[u8]) -> Result<()> {
        let bound = self.bound()?;
        let tile_id = bound.meta.addressing().tile_id(col, row)?;
        let _guard = self.lock()?;
        let _range = bound.store.lock_tile(tile_id).map_err(|e| e.at_tile(col, row))?;
        bound.store.put(tile_id, bytes).map_err(|e| e.at_tile(col, row))
    }

    /// Overwrite every tile from one buffer holding all tiles in id order.
    ///
    /// Each tile's byte range is locked while it is written, so other
    /// processes never observe a partly written tile.
    pub fn write_entire_file(&self, bytes: &[u8]) -> Result<()> {
        let bound = self.bound()?;
        let expected = bound.meta.total_bytes();
        if bytes.len() as u64 != expected {
            return Err(GridBlobError::invalid_argument(format!(
                "grid needs exactly {expected} bytes, got {}",
                bytes.len()
            )));
        }
        let _guard = self.lock()?;
        let _pin = bound.store.pin()?;
        for (tile_id, tile) in bytes.chunks_exact(bound.meta.bytes_per_tile()).enumerate() {
            let tile_id = tile_id as u64;
            let _range = bound.store.lock_tile(tile_id)?;
            bound.store.put(tile_id, tile)?;
        }
        tracing::debug!(name = %self.name, bytes = bytes.len(), "Wrote entire grid");
        Ok(())
    }

    /// Write `<dir>/<name>.info`.
    pub fn write_metadata_file(&self) -> Result<PathBuf> {
        self.bound()?.meta.write_to_file(&self.dir, &self.name)
    }

    /// Extend the blob(s) to their full size. Binding already does this;
    /// call again if a blob was truncated behind the writer's back.
    pub fn preallocate(&self) -> Result<()> {
        self.bound()?.store.preallocate()
    }

    /// Keep every blob open until the guard drops.
    pub fn pin(&self) -> Result<StorePin<'_>> {
        self.bound()?.store.pin()
    }

    /// Transfer buffer statistics.
    pub fn pool_stats(&self) -> crate::types::PoolStats {
        self.pool.stats()
    }
}

/// True once every tile of `range` that `envelope` touches has been
/// processed, given that tiles are visited in row-major order and `current`
/// was the last one.
fn consumed_after(meta: &GridMetaInfo, range: &TileRange, envelope: &BoundingBox, current: (u32, u32)) -> bool {
    let rect = meta.geo_reference().pixel_rect_for(envelope);
    let Some(touched) = meta.addressing().intersecting_tiles(&rect) else {
        return false;
    };
    let last_row = touched.max_row.min(range.max_row);
    let last_col = touched.max_col.min(range.max_col);
    if touched.min_row > range.max_row || touched.min_col > range.max_col {
        return false;
    }
    (last_row, last_col) <= (current.1, current.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Raster, RasterData, TiledRaster};

    fn gray(width: u32, height: u32, value: u8) -> RasterData {
        RasterData::from_bytes(
            width,
            height,
            SampleLayout::gray8(),
            vec![value; (width * height) as usize],
        )
        .unwrap()
    }

    #[test]
    fn test_unbound_writer_derives_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let geo = RasterGeoReference::new(0.0, 1200.0, 1.0, -1.0);
        let mut raster = Raster::new(geo, gray(1200, 700, 9));

        let writer = GridWriter::new(dir.path(), "g", WriterOptions::default(), GridBlobConfig::default());
        assert!(!writer.is_bound());
        assert!(matches!(writer.write_metadata_file(), Err(GridBlobError::InvalidArgument(_))));

        writer.write(&mut raster, None).unwrap();
        let meta = writer.meta().unwrap();
        assert_eq!((meta.columns(), meta.rows()), (3, 2));
        assert_eq!((meta.tile_width(), meta.tile_height()), (400, 350));
    }

    #[test]
    fn test_explicit_grid_options() {
        let dir = tempfile::tempdir().unwrap();
        let geo = RasterGeoReference::new(0.0, 10.0, 1.0, -1.0);
        let writer = GridWriter::with_geometry(
            dir.path(),
            "g",
            &BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            &geo,
            SampleLayout::gray8(),
            WriterOptions::default().with_grid(3, 2),
            GridBlobConfig::default(),
        )
        .unwrap();
        let meta = writer.meta().unwrap();
        assert_eq!((meta.tile_width(), meta.tile_height()), (4, 5));
    }

    #[test]
    fn test_write_tile_and_entire_file_check_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let meta = GridMetaInfo::new(
            2,
            2,
            2,
            2,
            RasterGeoReference::new(0.0, 4.0, 1.0, -1.0),
            SampleLayout::gray8(),
        )
        .unwrap();
        let writer = GridWriter::with_meta(dir.path(), "g", meta, WriterOptions::default(), GridBlobConfig::default())
            .unwrap();

        assert!(matches!(writer.write_tile(0, 0, &[1, 2, 3]), Err(GridBlobError::InvalidArgument(_))));
        assert!(matches!(writer.write_tile(2, 0, &[0; 4]), Err(GridBlobError::OutOfRange(_))));
        assert!(matches!(writer.write_entire_file(&[0; 15]), Err(GridBlobError::InvalidArgument(_))));

        let all: Vec<u8> = (0..16).collect();
        writer.write_entire_file(&all).unwrap();
        writer.write_tile(1, 1, &[9, 9, 9, 9]).unwrap();
        let blob = std::fs::read(dir.path().join("g.bin")).unwrap();
        assert_eq!(&blob[..12], &all[..12]);
        assert_eq!(&blob[12..], &[9, 9, 9, 9]);
    }

    #[test]
    fn test_restricted_write_releases_every_sub_raster() {
        let dir = tempfile::tempdir().unwrap();
        let geo = RasterGeoReference::new(0.0, 4.0, 1.0, -1.0);
        let meta = GridMetaInfo::new(1, 2, 4, 4, geo, SampleLayout::gray8()).unwrap();
        let writer = GridWriter::with_meta(dir.path(), "g", meta, WriterOptions::default(), GridBlobConfig::default())
            .unwrap();

        // one 6x4 sub-raster spanning both tiles, written only into tile (0,0)
        let mut tiled = TiledRaster::new(geo, BoundingBox::new(0.0, 0.0, 6.0, 4.0), SampleLayout::gray8());
        tiled.push(Raster::new(geo, gray(6, 4, 7))).unwrap();

        let written = writer.write(&mut tiled, Some(RasterRect::new(0, 0, 4, 4))).unwrap();
        assert_eq!(written, 1);
        assert!(tiled.is_empty());

        let blob = std::fs::read(dir.path().join("g.bin")).unwrap();
        assert_eq!(&blob[..16], &[7; 16]);
        assert_eq!(&blob[16..], &[0; 16]);
    }

    #[test]
    fn test_consumed_after_row_major() {
        let meta = GridMetaInfo::new(
            2,
            2,
            2,
            2,
            RasterGeoReference::new(0.0, 4.0, 1.0, -1.0),
            SampleLayout::gray8(),
        )
        .unwrap();
        let range = TileRange::new(0, 0, 1, 1);
        // covers pixels (1,1)..(3,3): touches all four tiles
        let env = meta.geo_reference().world_envelope_for(&RasterRect::new(1, 1, 2, 2));
        assert!(!consumed_after(&meta, &range, &env, (0, 0)));
        assert!(!consumed_after(&meta, &range, &env, (0, 1)));
        assert!(consumed_after(&meta, &range, &env, (1, 1)));

        // only tile (0,0)
        let env = meta.geo_reference().world_envelope_for(&RasterRect::new(0, 0, 2, 2));
        assert!(consumed_after(&meta, &range, &env, (0, 0)));
    }
}
