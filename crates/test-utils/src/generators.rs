//! Test data generators for tile and raster payloads.
//!
//! These generators create predictable, verifiable byte patterns that can
//! be used across the test suite.

/// Creates a tile payload whose bytes identify the tile.
///
/// Byte `i` of tile `tile_id` is `(tile_id * 31 + i * 7) mod 251`, so two
/// different tiles (or a shifted copy of one tile) never compare equal for
/// realistic tile sizes.
///
/// # Example
///
/// ```
/// use test_utils::tile_pattern;
///
/// let tile = tile_pattern(2, 4);
/// assert_eq!(tile, vec![62, 69, 76, 83]);
/// ```
pub fn tile_pattern(tile_id: u64, bytes_per_tile: usize) -> Vec<u8> {
    (0..bytes_per_tile)
        .map(|i| ((tile_id * 31 + i as u64 * 7) % 251) as u8)
        .collect()
}

/// Creates the bytes of a whole grid: `tile_count` tiles of
/// [`tile_pattern`] in tile id order.
pub fn grid_pattern(tile_count: u64, bytes_per_tile: usize) -> Vec<u8> {
    (0..tile_count)
        .flat_map(|id| tile_pattern(id, bytes_per_tile))
        .collect()
}

/// Creates a single-band, one byte per sample raster in row-major order
/// where the pixel at `(x, y)` holds `(x + 3 * y) mod 256`.
///
/// # Example
///
/// ```
/// use test_utils::create_gradient_raster;
///
/// let raster = create_gradient_raster(4, 2);
/// assert_eq!(raster, vec![0, 1, 2, 3, 3, 4, 5, 6]);
/// ```
pub fn create_gradient_raster(width: usize, height: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height);
    for y in 0..height {
        for x in 0..width {
            data.push(((x + 3 * y) % 256) as u8);
        }
    }
    data
}

/// Creates a raster filled with one value.
pub fn create_constant_raster(width: usize, height: usize, sample_size: usize, value: u8) -> Vec<u8> {
    vec![value; width * height * sample_size]
}

/// Value of [`create_gradient_raster`] at `(x, y)`.
pub fn gradient_value(x: usize, y: usize) -> u8 {
    ((x + 3 * y) % 256) as u8
}
