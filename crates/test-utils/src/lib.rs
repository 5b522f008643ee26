//! Shared test utilities for the grid-blob workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Deterministic tile and raster byte generators
//! - CRC32 checksums for comparing tile payloads
//! - Common grid fixtures
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, tile_pattern, checksum};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Creates a fresh temporary directory for one grid.
///
/// The directory is removed when the returned guard drops.
pub fn temp_grid_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("grid-blob-test")
        .tempdir()
        .expect("failed to create temporary grid directory")
}

/// CRC32 of a byte slice.
pub fn checksum(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// CRC32 of every `chunk`-sized piece of `bytes`, in order.
///
/// Handy for comparing a whole blob tile by tile.
pub fn chunk_checksums(bytes: &[u8], chunk: usize) -> Vec<u32> {
    bytes.chunks(chunk).map(crc32fast::hash).collect()
}

/// Macro asserting that every byte of a slice equals one value.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_all_bytes;
///
/// assert_all_bytes!(&tile, 0x42);
/// ```
#[macro_export]
macro_rules! assert_all_bytes {
    ($bytes:expr, $value:expr) => {{
        let bytes: &[u8] = $bytes;
        let value: u8 = $value;
        if let Some(pos) = bytes.iter().position(|b| *b != value) {
            panic!(
                "assertion failed: byte {} is {:#04x}, expected {:#04x} (len {})",
                pos, bytes[pos], value, bytes.len()
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_all_bytes() {
        assert_all_bytes!(&[7u8, 7, 7], 7);
    }

    #[test]
    #[should_panic(expected = "byte 2")]
    fn test_assert_all_bytes_fails() {
        assert_all_bytes!(&[7u8, 7, 8], 7);
    }

    #[test]
    fn test_chunk_checksums() {
        let bytes = [1u8, 2, 3, 1, 2, 3];
        let sums = chunk_checksums(&bytes, 3);
        assert_eq!(sums.len(), 2);
        assert_eq!(sums[0], sums[1]);
        assert_eq!(sums[0], checksum(&[1, 2, 3]));
    }
}
