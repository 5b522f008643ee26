//! In-memory raster payloads.
//!
//! [`RasterData`] is the byte-backed sample buffer a tile is wrapped in,
//! [`Raster`] pairs it with a geo-reference, and [`TiledRaster`] is a
//! collection of rasters sharing one pixel space (the result of loading a
//! whole grid, or a mosaic being written into one).

use crate::error::{GridBlobError, Result};
use crate::georef::RasterGeoReference;
use crate::types::{BoundingBox, Interleave, RasterRect, SampleLayout};

/// Samples of a `width` x `height` raster, laid out per [`SampleLayout`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterData {
    width: u32,
    height: u32,
    layout: SampleLayout,
    bytes: Vec<u8>,
}

impl RasterData {
    /// Number of bytes a raster of this size and layout occupies.
    pub fn byte_len(width: u32, height: u32, layout: &SampleLayout) -> usize {
        width as usize * height as usize * layout.sample_size()
    }

    /// Zero-filled raster.
    pub fn zeroed(width: u32, height: u32, layout: SampleLayout) -> Self {
        Self {
            width,
            height,
            layout,
            bytes: vec![0; Self::byte_len(width, height, &layout)],
        }
    }

    /// Wrap existing bytes. The length must match exactly.
    pub fn from_bytes(width: u32, height: u32, layout: SampleLayout, bytes: Vec<u8>) -> Result<Self> {
        let expected = Self::byte_len(width, height, &layout);
        if bytes.len() != expected {
            return Err(GridBlobError::invalid_argument(format!(
                "raster of {width}x{height} needs {expected} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            width,
            height,
            layout,
            bytes,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> SampleLayout {
        self.layout
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Read-only view of a sample plane.
pub(crate) struct PlaneRef<'a> {
    bytes: &'a [u8],
    width: usize,
    height: usize,
}

impl<'a> PlaneRef<'a> {
    pub(crate) fn new(bytes: &'a [u8], width: usize, height: usize) -> Self {
        Self {
            bytes,
            width,
            height,
        }
    }
}

/// Mutable view of a sample plane.
pub(crate) struct PlaneMut<'a> {
    bytes: &'a mut [u8],
    width: usize,
    height: usize,
}

impl<'a> PlaneMut<'a> {
    pub(crate) fn new(bytes: &'a mut [u8], width: usize, height: usize) -> Self {
        Self {
            bytes,
            width,
            height,
        }
    }
}

fn sample_offset(layout: &SampleLayout, width: usize, height: usize, x: usize, y: usize, band: usize) -> usize {
    let bands = layout.bands as usize;
    let bps = layout.bytes_per_sample as usize;
    match layout.interleave {
        Interleave::Pixel => ((y * width + x) * bands + band) * bps,
        Interleave::Line => ((y * bands + band) * width + x) * bps,
        Interleave::Band => ((band * height + y) * width + x) * bps,
    }
}

/// Copy a `size` block scanline by scanline between two planes of the same
/// layout. Pixel-interleaved rows move as one run covering all bands, the
/// other layouts move one run per band.
pub(crate) fn copy_block(
    layout: &SampleLayout,
    src: PlaneRef<'_>,
    src_origin: (usize, usize),
    dst: PlaneMut<'_>,
    dst_origin: (usize, usize),
    size: (usize, usize),
) {
    let (width, height) = size;
    let (band_runs, run_len) = match layout.interleave {
        Interleave::Pixel => (1, width * layout.sample_size()),
        Interleave::Line | Interleave::Band => (layout.bands as usize, width * layout.bytes_per_sample as usize),
    };
    for row in 0..height {
        for band in 0..band_runs {
            let from = sample_offset(
                layout,
                src.width,
                src.height,
                src_origin.0,
                src_origin.1 + row,
                band,
            );
            let to = sample_offset(
                layout,
                dst.width,
                dst.height,
                dst_origin.0,
                dst_origin.1 + row,
                band,
            );
            dst.bytes[to..to + run_len].copy_from_slice(&src.bytes[from..from + run_len]);
        }
    }
}

/// A raster with its own geo-reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    geo_reference: RasterGeoReference,
    data: RasterData,
}

impl Raster {
    pub fn new(geo_reference: RasterGeoReference, data: RasterData) -> Self {
        Self { geo_reference, data }
    }

    pub fn geo_reference(&self) -> &RasterGeoReference {
        &self.geo_reference
    }

    pub fn data(&self) -> &RasterData {
        &self.data
    }

    pub fn into_data(self) -> RasterData {
        self.data
    }

    pub fn envelope(&self) -> BoundingBox {
        self.geo_reference.world_envelope_for(&RasterRect::new(
            0,
            0,
            self.data.width() as i64,
            self.data.height() as i64,
        ))
    }
}

/// A tile buffer being filled during a write.
pub struct TileTarget<'a> {
    pub envelope: BoundingBox,
    pub geo_reference: RasterGeoReference,
    pub width: u32,
    pub height: u32,
    pub layout: SampleLayout,
    pub bytes: &'a mut [u8],
}

/// A raster that can be merged into grid tiles.
pub trait SourceRaster {
    /// World envelope of the data.
    fn envelope(&self) -> BoundingBox;

    /// Geo-reference of the raster's pixel space.
    fn geo_reference(&self) -> &RasterGeoReference;

    fn layout(&self) -> SampleLayout;

    /// Copy every pixel that falls inside `target`'s envelope into the
    /// target buffer. Returns false if nothing overlapped.
    fn overlay(&self, target: &mut TileTarget<'_>) -> Result<bool>;

    /// Drop parts that `consumed` reports as fully merged. Returns the
    /// number of parts released.
    fn release_consumed(&mut self, _consumed: &mut dyn FnMut(&BoundingBox) -> bool) -> usize {
        0
    }
}

impl SourceRaster for Raster {
    fn envelope(&self) -> BoundingBox {
        Raster::envelope(self)
    }

    fn geo_reference(&self) -> &RasterGeoReference {
        &self.geo_reference
    }

    fn layout(&self) -> SampleLayout {
        self.data.layout()
    }

    fn overlay(&self, target: &mut TileTarget<'_>) -> Result<bool> {
        if self.data.layout() != target.layout {
            return Err(GridBlobError::invalid_argument(format!(
                "sample layout mismatch: raster {:?}, grid {:?}",
                self.data.layout(),
                target.layout
            )));
        }
        if !self.geo_reference.same_resolution(&target.geo_reference) {
            return Err(GridBlobError::invalid_argument(format!(
                "raster resolution {:?} differs from grid resolution {:?}",
                self.geo_reference.resolution(),
                target.geo_reference.resolution()
            )));
        }
        let Some(common) = Raster::envelope(self).intersection(&target.envelope) else {
            return Ok(false);
        };

        let own_bounds = RasterRect::new(0, 0, self.data.width() as i64, self.data.height() as i64);
        let tile_bounds = RasterRect::new(0, 0, target.width as i64, target.height as i64);
        let Some(src) = self.geo_reference.pixel_rect_for(&common).intersection(&own_bounds) else {
            return Ok(false);
        };
        let Some(dst) = target.geo_reference.pixel_rect_for(&common).intersection(&tile_bounds) else {
            return Ok(false);
        };

        let width = src.width.min(dst.width) as usize;
        let height = src.height.min(dst.height) as usize;
        copy_block(
            &target.layout,
            PlaneRef::new(
                self.data.as_bytes(),
                self.data.width() as usize,
                self.data.height() as usize,
            ),
            (src.x as usize, src.y as usize),
            PlaneMut::new(target.bytes, target.width as usize, target.height as usize),
            (dst.x as usize, dst.y as usize),
            (width, height),
        );
        Ok(true)
    }
}

/// Rasters sharing one pixel space, e.g. every tile of a grid.
#[derive(Debug, Clone)]
pub struct TiledRaster {
    geo_reference: RasterGeoReference,
    envelope: BoundingBox,
    layout: SampleLayout,
    tiles: Vec<Raster>,
}

impl TiledRaster {
    pub fn new(geo_reference: RasterGeoReference, envelope: BoundingBox, layout: SampleLayout) -> Self {
        Self {
            geo_reference,
            envelope,
            layout,
            tiles: Vec::new(),
        }
    }

    /// Add a tile; its layout must match the collection's.
    pub fn push(&mut self, tile: Raster) -> Result<()> {
        if tile.data().layout() != self.layout {
            return Err(GridBlobError::invalid_argument(format!(
                "tile layout {:?} does not match {:?}",
                tile.data().layout(),
                self.layout
            )));
        }
        self.tiles.push(tile);
        Ok(())
    }

    pub fn tiles(&self) -> &[Raster] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl SourceRaster for TiledRaster {
    fn envelope(&self) -> BoundingBox {
        self.envelope
    }

    fn geo_reference(&self) -> &RasterGeoReference {
        &self.geo_reference
    }

    fn layout(&self) -> SampleLayout {
        self.layout
    }

    fn overlay(&self, target: &mut TileTarget<'_>) -> Result<bool> {
        let mut touched = false;
        for tile in &self.tiles {
            touched |= tile.overlay(target)?;
        }
        Ok(touched)
    }

    fn release_consumed(&mut self, consumed: &mut dyn FnMut(&BoundingBox) -> bool) -> usize {
        let before = self.tiles.len();
        self.tiles.retain(|tile| !consumed(&tile.envelope()));
        before - self.tiles.len()
    }
}
