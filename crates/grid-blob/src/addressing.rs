//! Tile addressing within a grid.
//!
//! Every component relies on the row-major linearization
//! `tile_id = row * columns + column`.

use crate::error::{GridBlobError, Result};
use crate::types::{RasterRect, TileRange};

/// Pure tile arithmetic for a grid of `columns` x `rows` tiles of
/// `tile_width` x `tile_height` pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridAddressing {
    columns: u32,
    rows: u32,
    tile_width: u32,
    tile_height: u32,
}

impl GridAddressing {
    pub fn new(columns: u32, rows: u32, tile_width: u32, tile_height: u32) -> Result<Self> {
        if columns == 0 || rows == 0 || tile_width == 0 || tile_height == 0 {
            return Err(GridBlobError::invalid_argument(format!(
                "grid dimensions must be positive: {columns}x{rows} tiles of {tile_width}x{tile_height}"
            )));
        }
        Ok(Self::new_unchecked(columns, rows, tile_width, tile_height))
    }

    /// For dimensions already validated by [`GridMetaInfo`](crate::GridMetaInfo).
    pub(crate) fn new_unchecked(columns: u32, rows: u32, tile_width: u32, tile_height: u32) -> Self {
        Self {
            columns,
            rows,
            tile_width,
            tile_height,
        }
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn tile_count(&self) -> u64 {
        self.columns as u64 * self.rows as u64
    }

    /// Full pixel extent of the grid.
    pub fn extent(&self) -> RasterRect {
        RasterRect::new(
            0,
            0,
            self.columns as i64 * self.tile_width as i64,
            self.rows as i64 * self.tile_height as i64,
        )
    }

    pub fn tile_id(&self, col: u32, row: u32) -> Result<u64> {
        if col >= self.columns || row >= self.rows {
            return Err(GridBlobError::out_of_range(format!(
                "tile ({col},{row}) outside {}x{} grid",
                self.columns, self.rows
            )));
        }
        Ok(row as u64 * self.columns as u64 + col as u64)
    }

    /// Inverse of [`tile_id`](Self::tile_id).
    pub fn col_row(&self, tile_id: u64) -> Result<(u32, u32)> {
        if tile_id >= self.tile_count() {
            return Err(GridBlobError::out_of_range(format!(
                "tile id {tile_id} outside grid of {} tiles",
                self.tile_count()
            )));
        }
        let columns = self.columns as u64;
        Ok(((tile_id % columns) as u32, (tile_id / columns) as u32))
    }

    /// Pixel rectangle occupied by a tile.
    pub fn tile_envelope(&self, col: u32, row: u32) -> RasterRect {
        RasterRect::new(
            col as i64 * self.tile_width as i64,
            row as i64 * self.tile_height as i64,
            self.tile_width as i64,
            self.tile_height as i64,
        )
    }

    /// Clip `rect` to the grid. `None` if nothing remains.
    pub fn snap_to_grid(&self, rect: &RasterRect) -> Option<RasterRect> {
        if rect.is_empty() {
            return None;
        }
        rect.intersection(&self.extent())
    }

    /// Column containing pixel `x`, clamped to `[-1, columns]` where the
    /// bounds mean "outside".
    pub fn column_of(&self, x: i64) -> i64 {
        if x < 0 {
            return -1;
        }
        (x / self.tile_width as i64).min(self.columns as i64)
    }

    /// Row containing pixel `y`, clamped to `[-1, rows]`.
    pub fn row_of(&self, y: i64) -> i64 {
        if y < 0 {
            return -1;
        }
        (y / self.tile_height as i64).min(self.rows as i64)
    }

    /// Inclusive range of tiles touched by `rect`.
    ///
    /// The right and bottom edges are exclusive: a maximum that lands
    /// exactly on a tile boundary does not pull in the tile starting there.
    pub fn intersecting_tiles(&self, rect: &RasterRect) -> Option<TileRange> {
        if rect.is_empty() {
            return None;
        }
        let min_col = self.column_of(rect.x);
        let min_row = self.row_of(rect.y);
        let mut max_col = self.column_of(rect.max_x());
        let mut max_row = self.row_of(rect.max_y());
        if rect.max_x() % self.tile_width as i64 == 0 {
            max_col -= 1;
        }
        if rect.max_y() % self.tile_height as i64 == 0 {
            max_row -= 1;
        }

        if max_col < 0 || max_row < 0 || min_col >= self.columns as i64 || min_row >= self.rows as i64 {
            return None;
        }

        Some(TileRange::new(
            min_col.max(0) as u32,
            min_row.max(0) as u32,
            max_col.min(self.columns as i64 - 1) as u32,
            max_row.min(self.rows as i64 - 1) as u32,
        ))
    }
}
