//! Tile- and region-level reads over a grid.
//!
//! Implementors supply [`GridReader::read_tile_bytes`]; everything else
//! (single tiles as rasters, clipped pixel regions, world regions and whole
//! grid loads) is built on top of it and the grid's [`GridMetaInfo`].

mod single;
mod split;

pub use single::SingleBlobReader;
pub use split::SplitBlobReader;

use std::path::Path;

use rayon::prelude::*;

use crate::buffer_pool::BufferPool;
use crate::config::GridBlobConfig;
use crate::error::{GridBlobError, Result};
use crate::meta::GridMetaInfo;
use crate::raster::{copy_block, PlaneMut, PlaneRef, Raster, RasterData, TiledRaster};
use crate::types::{BoundingBox, RasterRect};

/// Pixels read from a grid, with the clipped rectangle they cover.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionData {
    /// The requested rectangle clipped to the grid.
    pub rect: RasterRect,
    /// Samples of `rect`, geo-referenced at its upper-left corner.
    pub raster: Raster,
}

/// Read access to a tiled grid.
pub trait GridReader: Send + Sync {
    /// Description of the grid being read.
    fn meta(&self) -> &GridMetaInfo;

    fn config(&self) -> &GridBlobConfig;

    /// Pool of tile transfer buffers.
    fn buffer_pool(&self) -> &BufferPool;

    /// Where the grid lives, for diagnostics.
    fn location(&self) -> &Path;

    /// Fill `buf` with the bytes of tile `(col, row)`.
    ///
    /// Returns false if the tile has no backing bytes; `buf` is fully
    /// overwritten (zero-filled) in that case too. `buf` must be exactly
    /// `bytes_per_tile` long.
    fn read_tile_bytes(&self, col: u32, row: u32, buf: &mut [u8]) -> Result<bool>;

    /// One tile as a raster geo-referenced at the tile's origin.
    fn get_tile(&self, col: u32, row: u32) -> Result<Raster> {
        let meta = self.meta();
        meta.addressing().tile_id(col, row)?;

        let mut bytes = vec![0; meta.bytes_per_tile()];
        if !self.read_tile_bytes(col, row, &mut bytes)? {
            return Err(GridBlobError::tile_io(
                self.location(),
                col,
                row,
                std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "tile has no backing bytes"),
            ));
        }
        let data = RasterData::from_bytes(meta.tile_width(), meta.tile_height(), meta.layout(), bytes)?;
        Ok(Raster::new(meta.tile_geo_reference(col, row), data))
    }

    /// Read a pixel rectangle, clipped to the grid.
    ///
    /// Returns `None` if `rect` lies entirely outside the grid. A supplied
    /// `buffer` must have exactly the size of the clipped region; it is
    /// fully overwritten, and it is dropped if a tile read fails. Tiles
    /// without backing bytes read as zeros.
    fn read_region(&self, rect: &RasterRect, buffer: Option<Vec<u8>>) -> Result<Option<RegionData>> {
        let meta = self.meta();
        let addressing = meta.addressing();
        let Some(clipped) = addressing.snap_to_grid(rect) else {
            return Ok(None);
        };
        let Some(tiles) = addressing.intersecting_tiles(&clipped) else {
            return Ok(None);
        };

        let layout = meta.layout();
        let (width, height) = (clipped.width as u32, clipped.height as u32);
        let expected = RasterData::byte_len(width, height, &layout);
        let bytes = match buffer {
            Some(buf) if buf.len() != expected => {
                return Err(GridBlobError::invalid_argument(format!(
                    "region {}x{} needs a {expected} byte buffer, got {}",
                    width,
                    height,
                    buf.len()
                )))
            }
            Some(buf) => buf,
            None => vec![0; expected],
        };
        let mut out = RasterData::from_bytes(width, height, layout, bytes)?;

        tracing::debug!(
            location = %self.location().display(),
            x = clipped.x,
            y = clipped.y,
            width,
            height,
            tiles = tiles.tile_count(),
            "Reading region"
        );

        let (tile_width, tile_height) = (meta.tile_width() as usize, meta.tile_height() as usize);
        let mut tile_buf = self.buffer_pool().acquire(meta.bytes_per_tile());
        for (col, row) in tiles.iter() {
            let tile_rect = addressing.tile_envelope(col, row);
            let Some(overlap) = tile_rect.intersection(&clipped) else {
                continue;
            };
            self.read_tile_bytes(col, row, &mut tile_buf)?;
            copy_block(
                &layout,
                PlaneRef::new(&tile_buf, tile_width, tile_height),
                ((overlap.x - tile_rect.x) as usize, (overlap.y - tile_rect.y) as usize),
                PlaneMut::new(out.as_bytes_mut(), width as usize, height as usize),
                ((overlap.x - clipped.x) as usize, (overlap.y - clipped.y) as usize),
                (overlap.width as usize, overlap.height as usize),
            );
        }

        let geo_reference = meta.geo_reference().relocated(clipped.x, clipped.y);
        Ok(Some(RegionData {
            rect: clipped,
            raster: Raster::new(geo_reference, out),
        }))
    }

    /// Read the pixels covering a world envelope.
    fn read_world_region(&self, envelope: &BoundingBox, buffer: Option<Vec<u8>>) -> Result<Option<RegionData>> {
        let rect = self.meta().geo_reference().pixel_rect_for(envelope);
        self.read_region(&rect, buffer)
    }

    /// Every tile of the grid. Tiles without backing bytes are skipped.
    fn load(&self) -> Result<TiledRaster> {
        let meta = self.meta();
        let addressing = meta.addressing();
        let read = |tile_id: u64| -> Result<Option<Raster>> {
            let (col, row) = addressing.col_row(tile_id)?;
            let mut bytes = vec![0; meta.bytes_per_tile()];
            if !self.read_tile_bytes(col, row, &mut bytes)? {
                tracing::warn!(col, row, location = %self.location().display(), "Skipping tile without data");
                return Ok(None);
            }
            let data = RasterData::from_bytes(meta.tile_width(), meta.tile_height(), meta.layout(), bytes)?;
            Ok(Some(Raster::new(meta.tile_geo_reference(col, row), data)))
        };

        let tiles: Vec<Option<Raster>> = if self.config().parallel_load {
            (0..meta.tile_count()).into_par_iter().map(read).collect::<Result<_>>()?
        } else {
            (0..meta.tile_count()).map(read).collect::<Result<_>>()?
        };

        let mut raster = TiledRaster::new(*meta.geo_reference(), meta.envelope(), meta.layout());
        for tile in tiles.into_iter().flatten() {
            raster.push(tile)?;
        }
        tracing::debug!(
            location = %self.location().display(),
            tiles = raster.len(),
            "Loaded grid"
        );
        Ok(raster)
    }
}

/// Heal or reject a disagreement between the recorded tile count and the
/// number of tiles a single blob actually holds.
pub(crate) fn reconcile_tile_count(
    meta: GridMetaInfo,
    stored_tiles: u64,
    config: &GridBlobConfig,
    location: &Path,
) -> Result<GridMetaInfo> {
    if stored_tiles == meta.tile_count() {
        return Ok(meta);
    }
    if config.strict_tile_count {
        return Err(GridBlobError::corrupt_grid(format!(
            "{} holds {stored_tiles} tiles, metadata describes {}",
            location.display(),
            meta.tile_count()
        )));
    }

    let rows = stored_tiles.div_ceil(meta.columns() as u64).max(1);
    let rows = u32::try_from(rows)
        .map_err(|_| GridBlobError::corrupt_grid(format!("{} holds too many tiles", location.display())))?;
    tracing::warn!(
        location = %location.display(),
        stored_tiles,
        expected_tiles = meta.tile_count(),
        rows,
        "Blob size disagrees with grid metadata, using the file's tile count"
    );
    meta.with_rows(rows)
}
