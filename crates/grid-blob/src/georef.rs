//! Affine mapping between world coordinates and raster pixel space.
//!
//! The parameters are those of an ESRI world file. The origin is the outer
//! upper-left corner of pixel (0, 0), so pixel `(px, py)` covers the world
//! area between the images of `(px, py)` and `(px + 1, py + 1)`.

use serde::{Deserialize, Serialize};

use crate::error::{GridBlobError, Result};
use crate::types::{BoundingBox, RasterRect};

/// Snapping tolerance in pixel units.
const PIXEL_EPSILON: f64 = 1e-6;

/// World-file style geo-reference.
///
/// ```text
/// world_x = origin_x + px * res_x + py * rot_x
/// world_y = origin_y + px * rot_y + py * res_y
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterGeoReference {
    pub res_x: f64,
    pub rot_y: f64,
    pub rot_x: f64,
    pub res_y: f64,
    pub origin_x: f64,
    pub origin_y: f64,
}

impl RasterGeoReference {
    /// Axis-aligned reference, no rotation. `res_y` is usually negative
    /// (rows grow southwards).
    pub fn new(origin_x: f64, origin_y: f64, res_x: f64, res_y: f64) -> Self {
        Self {
            res_x,
            rot_y: 0.0,
            rot_x: 0.0,
            res_y,
            origin_x,
            origin_y,
        }
    }

    /// Reference that maps `envelope` onto a `width` x `height` raster,
    /// north up.
    pub fn from_envelope(envelope: &BoundingBox, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(GridBlobError::invalid_argument(format!(
                "raster size must be positive, got {width}x{height}"
            )));
        }
        if envelope.width() <= 0.0 || envelope.height() <= 0.0 {
            return Err(GridBlobError::invalid_argument(format!(
                "envelope must have a positive extent: {envelope:?}"
            )));
        }
        Ok(Self::new(
            envelope.min_x,
            envelope.max_y,
            envelope.width() / width as f64,
            -envelope.height() / height as f64,
        ))
    }

    /// Validate that the mapping is invertible.
    pub fn validate(&self) -> Result<()> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < f64::EPSILON * 1e-6 {
            return Err(GridBlobError::invalid_argument(format!(
                "geo-reference is not invertible: {self:?}"
            )));
        }
        Ok(())
    }

    fn determinant(&self) -> f64 {
        self.res_x * self.res_y - self.rot_x * self.rot_y
    }

    /// Resolution (world units per pixel) along x and y.
    pub fn resolution(&self) -> (f64, f64) {
        (self.res_x, self.res_y)
    }

    /// World coordinate of a (possibly fractional) pixel position.
    pub fn world_coordinate(&self, px: f64, py: f64) -> (f64, f64) {
        (
            self.origin_x + px * self.res_x + py * self.rot_x,
            self.origin_y + px * self.rot_y + py * self.res_y,
        )
    }

    /// Fractional pixel position of a world coordinate.
    pub fn raster_coordinate_unrounded(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.determinant();
        let dx = x - self.origin_x;
        let dy = y - self.origin_y;
        (
            (self.res_y * dx - self.rot_x * dy) / det,
            (self.res_x * dy - self.rot_y * dx) / det,
        )
    }

    /// Pixel containing a world coordinate.
    pub fn raster_coordinate_for(&self, x: f64, y: f64) -> (i64, i64) {
        let (px, py) = self.raster_coordinate_unrounded(x, y);
        (
            (px + PIXEL_EPSILON).floor() as i64,
            (py + PIXEL_EPSILON).floor() as i64,
        )
    }

    /// World envelope covered by a pixel rectangle.
    pub fn world_envelope_for(&self, rect: &RasterRect) -> BoundingBox {
        let corners = [
            self.world_coordinate(rect.x as f64, rect.y as f64),
            self.world_coordinate(rect.max_x() as f64, rect.y as f64),
            self.world_coordinate(rect.x as f64, rect.max_y() as f64),
            self.world_coordinate(rect.max_x() as f64, rect.max_y() as f64),
        ];
        envelope_of(&corners)
    }

    /// Smallest pixel rectangle covering a world envelope.
    ///
    /// Edges within a millionth of a pixel of a pixel boundary snap to it,
    /// so an envelope produced by [`world_envelope_for`] maps back to the
    /// same rectangle.
    ///
    /// [`world_envelope_for`]: Self::world_envelope_for
    pub fn pixel_rect_for(&self, envelope: &BoundingBox) -> RasterRect {
        let corners = [
            self.raster_coordinate_unrounded(envelope.min_x, envelope.max_y),
            self.raster_coordinate_unrounded(envelope.max_x, envelope.max_y),
            self.raster_coordinate_unrounded(envelope.min_x, envelope.min_y),
            self.raster_coordinate_unrounded(envelope.max_x, envelope.min_y),
        ];
        let bounds = envelope_of(&corners);
        let x = (bounds.min_x + PIXEL_EPSILON).floor() as i64;
        let y = (bounds.min_y + PIXEL_EPSILON).floor() as i64;
        let max_x = (bounds.max_x - PIXEL_EPSILON).ceil() as i64;
        let max_y = (bounds.max_y - PIXEL_EPSILON).ceil() as i64;
        RasterRect::new(x, y, (max_x - x).max(0), (max_y - y).max(0))
    }

    /// Pixel size of a world envelope.
    pub fn size(&self, envelope: &BoundingBox) -> (i64, i64) {
        let rect = self.pixel_rect_for(envelope);
        (rect.width, rect.height)
    }

    /// Same mapping with its origin moved to pixel `(px, py)`.
    pub fn relocated(&self, px: i64, py: i64) -> Self {
        let (origin_x, origin_y) = self.world_coordinate(px as f64, py as f64);
        Self {
            origin_x,
            origin_y,
            ..*self
        }
    }

    /// True if both references share resolution and rotation, so pixels of
    /// one can be copied into the other without resampling.
    pub fn same_resolution(&self, other: &RasterGeoReference) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= a.abs().max(b.abs()) * 1e-9;
        close(self.res_x, other.res_x)
            && close(self.res_y, other.res_y)
            && close(self.rot_x, other.rot_x)
            && close(self.rot_y, other.rot_y)
    }
}

fn envelope_of(points: &[(f64, f64)]) -> BoundingBox {
    let mut bbox = BoundingBox::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for &(x, y) in points {
        bbox.min_x = bbox.min_x.min(x);
        bbox.min_y = bbox.min_y.min(y);
        bbox.max_x = bbox.max_x.max(x);
        bbox.max_y = bbox.max_y.max(y);
    }
    bbox
}
