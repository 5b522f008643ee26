//! Tiled raster storage in flat blob files.
//!
//! This crate stores large geo-referenced rasters as fixed-size tiles packed
//! into one or more headerless binary blobs, with random access by pixel or
//! world coordinate at a predictable cost of one byte-range transfer per
//! tile. It enables:
//!
//! - **Clipped region reads**: any pixel rectangle, assembled from the tiles
//!   it touches
//! - **Safe partial writes**: read-modify-write per tile under a process
//!   mutex and an OS byte-range lock
//! - **Split storage**: grids spread across several blobs of bounded size
//!
//! # Architecture
//!
//! ```text
//! world envelope
//!      │
//!      ▼
//! RasterGeoReference::pixel_rect_for
//!      │
//!      ▼
//! GridAddressing::snap_to_grid / intersecting_tiles
//!      │
//!      ├─► tile (col,row) -> tile id -> (blob, offset)
//!      │
//!      ├─► TileStore::get into a pooled tile buffer
//!      │
//!      └─► scanline copy into the output raster
//!               │
//!               ▼
//!          RegionData
//! ```
//!
//! # Example
//!
//! ```ignore
//! use grid_blob::{GridBlobConfig, GridReader, RasterRect, SingleBlobReader};
//!
//! let reader = SingleBlobReader::open("/data/ortho", "tiles", GridBlobConfig::from_env())?;
//! if let Some(region) = reader.read_region(&RasterRect::new(1000, 2000, 512, 512), None)? {
//!     println!("read {} bytes", region.raster.data().as_bytes().len());
//! }
//! ```

pub mod addressing;
pub mod buffer_pool;
pub mod config;
pub mod error;
pub mod georef;
pub mod meta;
pub mod raster;
pub mod reader;
pub mod store;
pub mod types;
pub mod writer;

// Re-export commonly used types at crate root
pub use addressing::GridAddressing;
pub use buffer_pool::{BufferPool, PooledBuffer};
pub use config::GridBlobConfig;
pub use error::{GridBlobError, Result};
pub use georef::RasterGeoReference;
pub use meta::GridMetaInfo;
pub use raster::{Raster, RasterData, SourceRaster, TileTarget, TiledRaster};
pub use reader::{GridReader, RegionData, SingleBlobReader, SplitBlobReader};
pub use store::{SingleBlob, SplitBlobs, StorePin, TileStore, DEFAULT_BLOB_EXTENSION};
pub use types::{BoundingBox, Interleave, PoolStats, RasterRect, SampleLayout, TileRange};
pub use writer::{GridWriter, WriterOptions};
