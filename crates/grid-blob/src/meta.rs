//! Grid description and its sidecar metadata file.
//!
//! The sidecar lives next to the blob(s) as `<dir>/<name>.info`. It is a
//! line-oriented text file: the six world-file parameters
//! (`res_x`, `rot_y`, `rot_x`, `res_y`, `origin_x`, `origin_y`) followed by
//! `rows`, `columns`, `tile_width`, `tile_height`, `bands`,
//! `bytes_per_sample` and `interleave`, one value per line.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::addressing::GridAddressing;
use crate::error::{GridBlobError, Result};
use crate::georef::RasterGeoReference;
use crate::types::{BoundingBox, Interleave, RasterRect, SampleLayout};

/// Extension of the sidecar metadata file.
pub const METADATA_EXTENSION: &str = "info";

/// Immutable description of a grid.
///
/// Only constructed through [`GridMetaInfo::new`] or the sidecar parser, so
/// the dimensions are always positive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridMetaInfo {
    rows: u32,
    columns: u32,
    tile_width: u32,
    tile_height: u32,
    geo_reference: RasterGeoReference,
    layout: SampleLayout,
}

impl GridMetaInfo {
    /// Fails with `InvalidArgument` for non-positive dimensions or an
    /// empty sample layout.
    pub fn new(
        rows: u32,
        columns: u32,
        tile_width: u32,
        tile_height: u32,
        geo_reference: RasterGeoReference,
        layout: SampleLayout,
    ) -> Result<Self> {
        GridAddressing::new(columns, rows, tile_width, tile_height)?;
        if layout.bands == 0 || layout.bytes_per_sample == 0 {
            return Err(GridBlobError::invalid_argument(format!(
                "sample layout must be positive: {} bands of {} bytes",
                layout.bands, layout.bytes_per_sample
            )));
        }
        geo_reference.validate()?;
        Ok(Self {
            rows,
            columns,
            tile_width,
            tile_height,
            geo_reference,
            layout,
        })
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn geo_reference(&self) -> &RasterGeoReference {
        &self.geo_reference
    }

    pub fn layout(&self) -> SampleLayout {
        self.layout
    }

    pub fn tile_count(&self) -> u64 {
        self.rows as u64 * self.columns as u64
    }

    /// Size of one tile payload in bytes.
    pub fn bytes_per_tile(&self) -> usize {
        self.tile_width as usize * self.tile_height as usize * self.layout.sample_size()
    }

    /// Size of all tiles in bytes.
    pub fn total_bytes(&self) -> u64 {
        self.tile_count() * self.bytes_per_tile() as u64
    }

    /// Addressing helper for this grid.
    pub fn addressing(&self) -> GridAddressing {
        GridAddressing::new_unchecked(self.columns, self.rows, self.tile_width, self.tile_height)
    }

    /// World envelope of the whole grid.
    pub fn envelope(&self) -> BoundingBox {
        self.geo_reference.world_envelope_for(&self.addressing().extent())
    }

    /// World envelope of one tile.
    pub fn tile_world_envelope(&self, col: u32, row: u32) -> BoundingBox {
        self.geo_reference
            .world_envelope_for(&self.addressing().tile_envelope(col, row))
    }

    /// Geo-reference with its origin moved to the tile's upper-left pixel.
    pub fn tile_geo_reference(&self, col: u32, row: u32) -> RasterGeoReference {
        let rect: RasterRect = self.addressing().tile_envelope(col, row);
        self.geo_reference.relocated(rect.x, rect.y)
    }

    /// Copy of this description with a different number of rows, used when
    /// the blob size disagrees with the recorded tile count.
    pub(crate) fn with_rows(&self, rows: u32) -> Result<Self> {
        Self::new(
            rows,
            self.columns,
            self.tile_width,
            self.tile_height,
            self.geo_reference,
            self.layout,
        )
    }

    /// `<dir>/<name>.info`
    pub fn sidecar_path(dir: impl AsRef<Path>, name: &str) -> PathBuf {
        dir.as_ref().join(format!("{name}.{METADATA_EXTENSION}"))
    }

    /// Render the sidecar text.
    pub fn to_sidecar_string(&self) -> String {
        let geo = &self.geo_reference;
        let mut out = String::new();
        for value in [geo.res_x, geo.rot_y, geo.rot_x, geo.res_y, geo.origin_x, geo.origin_y] {
            let _ = writeln!(out, "{value}");
        }
        for value in [
            self.rows,
            self.columns,
            self.tile_width,
            self.tile_height,
            self.layout.bands,
            self.layout.bytes_per_sample,
        ] {
            let _ = writeln!(out, "{value}");
        }
        let _ = writeln!(out, "{}", self.layout.interleave);
        out
    }

    /// Parse sidecar text. Blank lines are ignored.
    pub fn parse_sidecar(text: &str) -> Result<Self> {
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        let mut next = |field: &str| {
            lines
                .next()
                .ok_or_else(|| GridBlobError::invalid_metadata(format!("missing {field}")))
        };

        let mut world = [0f64; 6];
        for (value, field) in world
            .iter_mut()
            .zip(["res_x", "rot_y", "rot_x", "res_y", "origin_x", "origin_y"])
        {
            *value = parse_field(next(field)?, field)?;
        }
        let rows = parse_field(next("rows")?, "rows")?;
        let columns = parse_field(next("columns")?, "columns")?;
        let tile_width = parse_field(next("tile_width")?, "tile_width")?;
        let tile_height = parse_field(next("tile_height")?, "tile_height")?;
        let bands = parse_field(next("bands")?, "bands")?;
        let bytes_per_sample = parse_field(next("bytes_per_sample")?, "bytes_per_sample")?;
        let interleave = match next("interleave") {
            Ok(line) => Interleave::parse(line)
                .ok_or_else(|| GridBlobError::invalid_metadata(format!("unknown interleave {line:?}")))?,
            Err(_) => Interleave::default(),
        };

        let geo_reference = RasterGeoReference {
            res_x: world[0],
            rot_y: world[1],
            rot_x: world[2],
            res_y: world[3],
            origin_x: world[4],
            origin_y: world[5],
        };
        Self::new(
            rows,
            columns,
            tile_width,
            tile_height,
            geo_reference,
            SampleLayout::new(bands, bytes_per_sample, interleave),
        )
        .map_err(|e| match e {
            GridBlobError::InvalidArgument(msg) => GridBlobError::InvalidMetadata(msg),
            other => other,
        })
    }

    /// Read `<dir>/<name>.info`.
    pub fn read_from_file(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        let path = Self::sidecar_path(dir, name);
        let text = std::fs::read_to_string(&path).map_err(|e| GridBlobError::io(&path, e))?;
        let meta = Self::parse_sidecar(&text)?;
        tracing::debug!(
            path = %path.display(),
            rows = meta.rows,
            columns = meta.columns,
            "Read grid metadata"
        );
        Ok(meta)
    }

    /// Write `<dir>/<name>.info`, replacing any existing file.
    pub fn write_to_file(&self, dir: impl AsRef<Path>, name: &str) -> Result<PathBuf> {
        let path = Self::sidecar_path(dir, name);
        std::fs::write(&path, self.to_sidecar_string()).map_err(|e| GridBlobError::io(&path, e))?;
        tracing::debug!(path = %path.display(), "Wrote grid metadata");
        Ok(path)
    }
}

fn parse_field<T: std::str::FromStr>(line: &str, field: &str) -> Result<T> {
    line.parse()
        .map_err(|_| GridBlobError::invalid_metadata(format!("{field}: cannot parse {line:?}")))
}
