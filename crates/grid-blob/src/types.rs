//! Core types for grid blob storage.

use serde::{Deserialize, Serialize};

/// A world-coordinate envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Check if this bounding box intersects another.
    ///
    /// Boxes that only share an edge do not intersect.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x < other.max_x
            && other.min_x < self.max_x
            && self.min_y < other.max_y
            && other.min_y < self.max_y
    }

    /// Intersection of two boxes, `None` if they do not overlap.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }
        Some(BoundingBox::new(
            self.min_x.max(other.min_x),
            self.min_y.max(other.min_y),
            self.max_x.min(other.max_x),
            self.max_y.min(other.max_y),
        ))
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// An axis-aligned integer rectangle in a raster's pixel space.
///
/// Coordinates may be negative for client requests; the engine clips
/// before addressing tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RasterRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl RasterRect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn max_x(&self) -> i64 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn max_y(&self) -> i64 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Intersection of two rectangles, `None` if they do not overlap.
    pub fn intersection(&self, other: &RasterRect) -> Option<RasterRect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let max_x = self.max_x().min(other.max_x());
        let max_y = self.max_y().min(other.max_y());
        if max_x <= x || max_y <= y {
            return None;
        }
        Some(RasterRect::new(x, y, max_x - x, max_y - y))
    }
}

/// Inclusive range of tile coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileRange {
    pub min_col: u32,
    pub min_row: u32,
    pub max_col: u32,
    pub max_row: u32,
}

impl TileRange {
    pub fn new(min_col: u32, min_row: u32, max_col: u32, max_row: u32) -> Self {
        Self {
            min_col,
            min_row,
            max_col,
            max_row,
        }
    }

    /// Number of tiles in the range.
    pub fn tile_count(&self) -> usize {
        ((self.max_col - self.min_col + 1) as usize) * ((self.max_row - self.min_row + 1) as usize)
    }

    /// Iterate over (col, row) in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> {
        let (min_col, max_col) = (self.min_col, self.max_col);
        (self.min_row..=self.max_row).flat_map(move |row| (min_col..=max_col).map(move |col| (col, row)))
    }
}

/// How band samples are arranged inside a tile payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interleave {
    /// All bands of one pixel are adjacent.
    #[default]
    Pixel,
    /// Each image row holds band 0's samples, then band 1's, ...
    Line,
    /// One full plane per band.
    Band,
}

impl Interleave {
    /// Parse from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pixel" => Some(Self::Pixel),
            "line" => Some(Self::Line),
            "band" => Some(Self::Band),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pixel => "pixel",
            Self::Line => "line",
            Self::Band => "band",
        }
    }
}

impl std::fmt::Display for Interleave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sample layout of the raster payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleLayout {
    pub bands: u32,
    pub bytes_per_sample: u32,
    #[serde(default)]
    pub interleave: Interleave,
}

impl SampleLayout {
    pub fn new(bands: u32, bytes_per_sample: u32, interleave: Interleave) -> Self {
        Self {
            bands,
            bytes_per_sample,
            interleave,
        }
    }

    /// Single band, one byte per sample.
    pub fn gray8() -> Self {
        Self::new(1, 1, Interleave::Pixel)
    }

    /// Bytes occupied by one pixel across all bands.
    pub fn sample_size(&self) -> usize {
        self.bands as usize * self.bytes_per_sample as usize
    }
}

/// Statistics about buffer pool usage.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub pooled_buffers: usize,
    pub pooled_bytes: usize,
}

impl PoolStats {
    /// Fraction of acquisitions served from the pool (0.0 - 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        let touching = BoundingBox::new(10.0, 0.0, 20.0, 10.0);

        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        assert!(!a.intersects(&touching));
        assert_eq!(
            a.intersection(&b),
            Some(BoundingBox::new(5.0, 5.0, 10.0, 10.0))
        );
    }

    #[test]
    fn test_rect_intersection() {
        let a = RasterRect::new(-10, -10, 20, 20);
        let b = RasterRect::new(0, 0, 100, 100);
        assert_eq!(a.intersection(&b), Some(RasterRect::new(0, 0, 10, 10)));

        let c = RasterRect::new(100, 0, 5, 5);
        assert_eq!(b.intersection(&c), None);
    }

    #[test]
    fn test_tile_range_iter_row_major() {
        let range = TileRange::new(1, 2, 2, 3);
        let tiles: Vec<_> = range.iter().collect();
        assert_eq!(tiles, vec![(1, 2), (2, 2), (1, 3), (2, 3)]);
        assert_eq!(range.tile_count(), 4);
    }

    #[test]
    fn test_interleave_parse() {
        assert_eq!(Interleave::parse("PIXEL"), Some(Interleave::Pixel));
        assert_eq!(Interleave::parse(" band "), Some(Interleave::Band));
        assert_eq!(Interleave::parse("bsq"), None);
    }

    #[test]
    fn test_sample_size() {
        assert_eq!(SampleLayout::new(3, 2, Interleave::Pixel).sample_size(), 6);
        assert_eq!(SampleLayout::gray8().sample_size(), 1);
    }

    #[test]
    fn test_pool_stats_hit_rate() {
        let mut stats = PoolStats::default();
        assert!((stats.hit_rate() - 0.0).abs() < f64::EPSILON);

        stats.hits = 3;
        stats.misses = 1;
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }
}
