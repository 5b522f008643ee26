use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use grid_blob::{GridBlobConfig, GridMetaInfo, GridReader, RasterRect, SingleBlobReader, SplitBlobReader};

/// Open the grid at `<dir>/<name>` with the reader matching its layout.
pub fn open_reader(dir: &Path, name: &str, split: bool, config: GridBlobConfig) -> Result<Box<dyn GridReader>> {
    let reader: Box<dyn GridReader> = if split {
        Box::new(
            SplitBlobReader::open(dir, name, config)
                .with_context(|| format!("Failed to open split grid {name} in {}", dir.display()))?,
        )
    } else {
        Box::new(
            SingleBlobReader::open(dir, name, config)
                .with_context(|| format!("Failed to open grid {name} in {}", dir.display()))?,
        )
    };
    Ok(reader)
}

/// Render the sidecar metadata as text or JSON.
pub fn info(dir: &Path, name: &str, json: bool) -> Result<String> {
    let meta = GridMetaInfo::read_from_file(dir, name)
        .with_context(|| format!("Failed to read metadata of {name} in {}", dir.display()))?;
    if json {
        return Ok(serde_json::to_string_pretty(&meta)?);
    }

    let geo = meta.geo_reference();
    let layout = meta.layout();
    let envelope = meta.envelope();
    Ok(format!(
        "grid:        {}\n\
         tiles:       {} columns x {} rows ({} tiles)\n\
         tile size:   {}x{} pixels, {} bytes\n\
         layout:      {} band(s), {} byte(s) per sample, {} interleave\n\
         resolution:  {} x {}\n\
         origin:      ({}, {})\n\
         envelope:    [{}, {}, {}, {}]",
        GridMetaInfo::sidecar_path(dir, name).display(),
        meta.columns(),
        meta.rows(),
        meta.tile_count(),
        meta.tile_width(),
        meta.tile_height(),
        meta.bytes_per_tile(),
        layout.bands,
        layout.bytes_per_sample,
        layout.interleave,
        geo.res_x,
        geo.res_y,
        geo.origin_x,
        geo.origin_y,
        envelope.min_x,
        envelope.min_y,
        envelope.max_x,
        envelope.max_y,
    ))
}

/// Outcome of reading every tile of a grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub rows: u32,
    pub columns: u32,
    pub tile_count: u64,
    pub bytes_per_tile: usize,
    pub missing_tiles: u64,
}

impl ValidationReport {
    pub fn is_complete(&self) -> bool {
        self.missing_tiles == 0
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} columns x {} rows, {} tiles of {} bytes, {} readable, {} missing",
            self.columns,
            self.rows,
            self.tile_count,
            self.bytes_per_tile,
            self.tile_count - self.missing_tiles,
            self.missing_tiles
        )
    }
}

/// Open the grid and read every tile once.
pub fn validate(dir: &Path, name: &str, split: bool, config: GridBlobConfig) -> Result<ValidationReport> {
    let reader = open_reader(dir, name, split, config)?;
    let meta = reader.meta();
    let addressing = meta.addressing();

    let mut buf = vec![0; meta.bytes_per_tile()];
    let mut missing_tiles = 0;
    for tile_id in 0..meta.tile_count() {
        let (col, row) = addressing.col_row(tile_id)?;
        if !reader.read_tile_bytes(col, row, &mut buf)? {
            tracing::warn!(col, row, "Tile has no data");
            missing_tiles += 1;
        }
    }

    Ok(ValidationReport {
        rows: meta.rows(),
        columns: meta.columns(),
        tile_count: meta.tile_count(),
        bytes_per_tile: meta.bytes_per_tile(),
        missing_tiles,
    })
}

/// Write the pixels of `rect`, clipped to the grid, to `out`. Returns the
/// clipped rectangle.
pub fn read(
    dir: &Path,
    name: &str,
    split: bool,
    config: GridBlobConfig,
    rect: &RasterRect,
    out: &Path,
) -> Result<RasterRect> {
    let reader = open_reader(dir, name, split, config)?;
    let Some(region) = reader.read_region(rect, None)? else {
        bail!("rectangle {rect:?} lies outside the grid");
    };
    std::fs::write(out, region.raster.data().as_bytes())
        .with_context(|| format!("Failed to write {}", out.display()))?;
    Ok(region.rect)
}

/// Write the bytes of tile `(col, row)` to `out`. Returns the byte count.
pub fn tile(
    dir: &Path,
    name: &str,
    split: bool,
    config: GridBlobConfig,
    col: u32,
    row: u32,
    out: &Path,
) -> Result<usize> {
    let reader = open_reader(dir, name, split, config)?;
    let tile = reader.get_tile(col, row)?;
    let bytes = tile.data().as_bytes();
    std::fs::write(out, bytes).with_context(|| format!("Failed to write {}", out.display()))?;
    Ok(bytes.len())
}
