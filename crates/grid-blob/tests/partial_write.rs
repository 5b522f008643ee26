//! Integration test: merging rasters into existing tiles.
//!
//! Partial writes must leave every pixel outside the source raster (or the
//! requested rectangle) untouched, and a loaded grid must be writable into
//! a grid with a different tiling.

use std::path::Path;

use grid_blob::{
    GridBlobConfig, GridBlobError, GridMetaInfo, GridReader, GridWriter, Interleave, Raster, RasterData,
    RasterGeoReference, RasterRect, SampleLayout, SingleBlobReader, WriterOptions,
};
use test_utils::{
    assert_all_bytes, checksum, create_constant_raster, grid_pattern, temp_grid_dir, tile_pattern, GRID_NAME,
    GRID_TINY,
};

fn grid_geo() -> RasterGeoReference {
    RasterGeoReference::new(0.0, 20.0, 1.0, -1.0)
}

fn tiny_meta() -> GridMetaInfo {
    GridMetaInfo::new(
        GRID_TINY.rows,
        GRID_TINY.columns,
        GRID_TINY.tile_width,
        GRID_TINY.tile_height,
        grid_geo(),
        SampleLayout::gray8(),
    )
    .unwrap()
}

fn filled_writer(dir: &Path) -> GridWriter {
    let writer = GridWriter::with_meta(
        dir,
        GRID_NAME,
        tiny_meta(),
        WriterOptions::default(),
        GridBlobConfig::default(),
    )
    .unwrap();
    writer
        .write_entire_file(&grid_pattern(GRID_TINY.tile_count(), GRID_TINY.bytes_per_tile()))
        .unwrap();
    writer.write_metadata_file().unwrap();
    writer
}

/// Gray raster of `value` whose upper-left pixel sits at grid pixel `(px, py)`.
fn patch(px: i64, py: i64, width: u32, height: u32, value: u8) -> Raster {
    let data = RasterData::from_bytes(
        width,
        height,
        SampleLayout::gray8(),
        create_constant_raster(width as usize, height as usize, 1, value),
    )
    .unwrap();
    Raster::new(grid_geo().relocated(px, py), data)
}

fn full_grid(dir: &Path) -> Vec<u8> {
    let reader = SingleBlobReader::open(dir, GRID_NAME, GridBlobConfig::default()).unwrap();
    reader
        .read_region(&RasterRect::new(0, 0, 16, 20), None)
        .unwrap()
        .unwrap()
        .raster
        .into_data()
        .into_bytes()
}

#[test]
fn test_quadrant_write_keeps_other_quadrants() {
    let dir = temp_grid_dir();
    let writer = filled_writer(dir.path());
    let original = tile_pattern(0, 16);

    let written = writer.write(&mut patch(0, 0, 2, 2, 0xaa), None).unwrap();
    assert_eq!(written, 1);

    let reader = SingleBlobReader::open(dir.path(), GRID_NAME, GridBlobConfig::default()).unwrap();
    let tile = reader.get_tile(0, 0).unwrap();
    let bytes = tile.data().as_bytes();
    for y in 0..4 {
        for x in 0..4 {
            let i = y * 4 + x;
            if x < 2 && y < 2 {
                assert_eq!(bytes[i], 0xaa, "pixel ({x}, {y})");
            } else {
                assert_eq!(bytes[i], original[i], "pixel ({x}, {y})");
            }
        }
    }
    assert_eq!(reader.get_tile(1, 0).unwrap().data().as_bytes(), tile_pattern(1, 16).as_slice());
}

#[test]
fn test_write_spanning_four_tiles() {
    let dir = temp_grid_dir();
    let writer = filled_writer(dir.path());
    let before = full_grid(dir.path());

    let written = writer.write(&mut patch(2, 2, 4, 4, 0x11), None).unwrap();
    assert_eq!(written, 4);

    let after = full_grid(dir.path());
    for y in 0..20usize {
        for x in 0..16usize {
            let i = y * 16 + x;
            if (2..6).contains(&x) && (2..6).contains(&y) {
                assert_eq!(after[i], 0x11, "pixel ({x}, {y})");
            } else {
                assert_eq!(after[i], before[i], "pixel ({x}, {y})");
            }
        }
    }
}

#[test]
fn test_write_restricted_to_rectangle() {
    let dir = temp_grid_dir();
    let writer = filled_writer(dir.path());
    let before = full_grid(dir.path());

    let written = writer
        .write(&mut patch(0, 0, 8, 8, 0x5a), Some(RasterRect::new(3, 3, 2, 2)))
        .unwrap();
    assert_eq!(written, 4);

    let after = full_grid(dir.path());
    for y in 0..20usize {
        for x in 0..16usize {
            let i = y * 16 + x;
            let expected = if (3..5).contains(&x) && (3..5).contains(&y) { 0x5a } else { before[i] };
            assert_eq!(after[i], expected, "pixel ({x}, {y})");
        }
    }

    // a rectangle the raster does not reach writes nothing
    let written = writer
        .write(&mut patch(0, 0, 4, 4, 0x01), Some(RasterRect::new(10, 10, 2, 2)))
        .unwrap();
    assert_eq!(written, 0);
    assert_eq!(checksum(&full_grid(dir.path())), checksum(&after));
}

#[test]
fn test_raster_partially_outside_is_clipped() {
    let dir = temp_grid_dir();
    let writer = filled_writer(dir.path());
    assert_eq!(writer.write(&mut patch(-2, -2, 4, 4, 0x77), None).unwrap(), 1);

    let after = full_grid(dir.path());
    assert_eq!(&after[0..2], &[0x77, 0x77]);
    assert_eq!(&after[16..18], &[0x77, 0x77]);
    assert_ne!(after[2], 0x77);
    assert_ne!(after[32], 0x77);
}

#[test]
fn test_raster_outside_grid_is_rejected() {
    let dir = temp_grid_dir();
    let writer = filled_writer(dir.path());
    assert!(matches!(
        writer.write(&mut patch(100, 100, 4, 4, 1), None),
        Err(GridBlobError::CorruptGrid(_))
    ));
}

#[test]
fn test_layout_mismatch_is_rejected() {
    let dir = temp_grid_dir();
    let writer = filled_writer(dir.path());
    let rgb = SampleLayout::new(3, 1, Interleave::Pixel);
    let data = RasterData::from_bytes(2, 2, rgb, vec![0; 12]).unwrap();
    let mut raster = Raster::new(grid_geo(), data);
    assert!(matches!(
        writer.write(&mut raster, None),
        Err(GridBlobError::InvalidArgument(_))
    ));
}

#[test]
fn test_load_and_retile() {
    let source_dir = temp_grid_dir();
    filled_writer(source_dir.path());
    let source = SingleBlobReader::open(source_dir.path(), GRID_NAME, GridBlobConfig::default()).unwrap();
    let mut tiles = source.load().unwrap();
    assert_eq!(tiles.len() as u64, GRID_TINY.tile_count());

    let target_dir = temp_grid_dir();
    let writer = GridWriter::new(
        target_dir.path(),
        GRID_NAME,
        WriterOptions::default().with_grid(2, 2),
        GridBlobConfig::default(),
    );
    let written = writer.write(&mut tiles, None).unwrap();
    assert_eq!(written, 4);
    assert!(tiles.is_empty(), "every merged source tile is released");
    writer.write_metadata_file().unwrap();

    let meta = writer.meta().unwrap();
    assert_eq!((meta.columns(), meta.rows()), (2, 2));
    assert_eq!((meta.tile_width(), meta.tile_height()), (8, 10));
    assert_eq!(full_grid(target_dir.path()), full_grid(source_dir.path()));
}

#[test]
fn test_sequential_load_matches_parallel() {
    let dir = temp_grid_dir();
    filled_writer(dir.path());
    let parallel = SingleBlobReader::open(dir.path(), GRID_NAME, GridBlobConfig::default())
        .unwrap()
        .load()
        .unwrap();
    let config = GridBlobConfig {
        parallel_load: false,
        ..GridBlobConfig::default()
    };
    let sequential = SingleBlobReader::open(dir.path(), GRID_NAME, config)
        .unwrap()
        .load()
        .unwrap();

    assert_eq!(parallel.len(), sequential.len());
    for (a, b) in parallel.tiles().iter().zip(sequential.tiles()) {
        assert_eq!(a, b);
    }
}

#[test]
fn test_pinned_writer_buffers_are_reused() {
    let dir = temp_grid_dir();
    let writer = filled_writer(dir.path());
    let _pin = writer.pin().unwrap();
    for i in 0..4 {
        writer.write(&mut patch(i, i, 1, 1, 0xee), None).unwrap();
    }
    let stats = writer.pool_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 3);
    let grid = full_grid(dir.path());
    assert_all_bytes!(&grid[0..1], 0xee);
}
