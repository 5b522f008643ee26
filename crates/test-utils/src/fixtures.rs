//! Common grid fixtures.
//!
//! This module provides pre-defined grid shapes that represent common
//! scenarios in the test suite.

/// Shape of a test grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    pub rows: u32,
    pub columns: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub bands: u32,
    pub bytes_per_sample: u32,
}

impl GridSpec {
    /// Returns the number of tiles.
    pub fn tile_count(&self) -> u64 {
        self.rows as u64 * self.columns as u64
    }

    /// Returns the size of one tile in bytes.
    pub fn bytes_per_tile(&self) -> usize {
        self.tile_width as usize * self.tile_height as usize * self.bands as usize * self.bytes_per_sample as usize
    }

    /// Returns the size of all tiles in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.tile_count() * self.bytes_per_tile() as u64
    }

    /// Returns the pixel extent as (width, height).
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.columns * self.tile_width, self.rows * self.tile_height)
    }
}

/// 3x3 tiles of 128x128 single-byte pixels.
pub const GRID_3X3: GridSpec = GridSpec {
    rows: 3,
    columns: 3,
    tile_width: 128,
    tile_height: 128,
    bands: 1,
    bytes_per_sample: 1,
};

/// 4x4 tiles of 256x256 single-byte pixels.
pub const GRID_4X4_256: GridSpec = GridSpec {
    rows: 4,
    columns: 4,
    tile_width: 256,
    tile_height: 256,
    bands: 1,
    bytes_per_sample: 1,
};

/// Small RGB grid: 2 rows x 3 columns of 16x8 pixels, 3 bands.
pub const GRID_RGB_SMALL: GridSpec = GridSpec {
    rows: 2,
    columns: 3,
    tile_width: 16,
    tile_height: 8,
    bands: 3,
    bytes_per_sample: 1,
};

/// Tiny grid for exhaustive tests: 5 rows x 4 columns of 4x4 pixels.
pub const GRID_TINY: GridSpec = GridSpec {
    rows: 5,
    columns: 4,
    tile_width: 4,
    tile_height: 4,
    bands: 1,
    bytes_per_sample: 1,
};

/// Default grid name used by integration tests.
pub const GRID_NAME: &str = "grid";
