//! Integration test: write a grid into one blob and read it back.
//!
//! Covers the 3x3 scenario grid, tile round trips, boundary exclusion,
//! clipping of out-of-grid requests and sidecar-driven self-healing.

use grid_blob::{
    GridAddressing, GridBlobConfig, GridBlobError, GridMetaInfo, GridReader, GridWriter, Interleave,
    RasterGeoReference, RasterRect, SampleLayout, SingleBlobReader, TileRange, WriterOptions,
};
use test_utils::{
    assert_all_bytes, checksum, grid_pattern, temp_grid_dir, tile_pattern, GridSpec, GRID_3X3, GRID_4X4_256,
    GRID_NAME, GRID_RGB_SMALL, GRID_TINY,
};

fn meta_for(spec: &GridSpec) -> GridMetaInfo {
    let (_, height) = spec.pixel_size();
    GridMetaInfo::new(
        spec.rows,
        spec.columns,
        spec.tile_width,
        spec.tile_height,
        RasterGeoReference::new(500_000.0, 4_000_000.0 + height as f64, 1.0, -1.0),
        SampleLayout::new(spec.bands, spec.bytes_per_sample, Interleave::Pixel),
    )
    .unwrap()
}

fn writer_for(dir: &std::path::Path, spec: &GridSpec) -> GridWriter {
    GridWriter::with_meta(
        dir,
        GRID_NAME,
        meta_for(spec),
        WriterOptions::default(),
        GridBlobConfig::default(),
    )
    .unwrap()
}

#[test]
fn test_scenario_center_tile() {
    let dir = temp_grid_dir();
    let writer = writer_for(dir.path(), &GRID_3X3);
    writer.write_tile(1, 1, &vec![0x42; GRID_3X3.bytes_per_tile()]).unwrap();
    writer.write_metadata_file().unwrap();

    let reader = SingleBlobReader::open(dir.path(), GRID_NAME, GridBlobConfig::default()).unwrap();
    assert_eq!(reader.meta().bytes_per_tile(), 16384);
    assert_eq!(reader.meta().tile_count(), 9);

    let center = reader
        .read_region(&RasterRect::new(128, 128, 128, 128), None)
        .unwrap()
        .expect("center tile intersects the grid");
    assert_eq!(center.rect, RasterRect::new(128, 128, 128, 128));
    assert_all_bytes!(center.raster.data().as_bytes(), 0x42);

    let full = reader
        .read_region(&RasterRect::new(0, 0, 384, 384), None)
        .unwrap()
        .expect("whole grid");
    let bytes = full.raster.data().as_bytes();
    assert_eq!(bytes.len(), 384 * 384);
    for y in 0..384usize {
        for x in 0..384usize {
            let inside = (128..256).contains(&x) && (128..256).contains(&y);
            let expected = if inside { 0x42 } else { 0 };
            assert_eq!(bytes[y * 384 + x], expected, "pixel ({x}, {y})");
        }
    }
}

#[test]
fn test_round_trip_every_tile() {
    let dir = temp_grid_dir();
    let writer = writer_for(dir.path(), &GRID_TINY);
    let bpt = GRID_TINY.bytes_per_tile();
    let addressing = writer.meta().unwrap().addressing();
    for id in 0..GRID_TINY.tile_count() {
        let (col, row) = addressing.col_row(id).unwrap();
        writer.write_tile(col, row, &tile_pattern(id, bpt)).unwrap();
    }
    writer.write_metadata_file().unwrap();

    let blob = std::fs::read(dir.path().join("grid.bin")).unwrap();
    assert_eq!(checksum(&blob), checksum(&grid_pattern(GRID_TINY.tile_count(), bpt)));

    let reader = SingleBlobReader::open(dir.path(), GRID_NAME, GridBlobConfig::default()).unwrap();
    for id in 0..GRID_TINY.tile_count() {
        let (col, row) = addressing.col_row(id).unwrap();
        let tile = reader.get_tile(col, row).unwrap();
        assert_eq!(tile.data().as_bytes(), tile_pattern(id, bpt).as_slice(), "tile {id}");
    }
}

#[test]
fn test_round_trip_multi_band_tile() {
    let dir = temp_grid_dir();
    let writer = writer_for(dir.path(), &GRID_RGB_SMALL);
    let all = grid_pattern(GRID_RGB_SMALL.tile_count(), GRID_RGB_SMALL.bytes_per_tile());
    writer.write_entire_file(&all).unwrap();
    writer.write_metadata_file().unwrap();

    let reader = SingleBlobReader::open(dir.path(), GRID_NAME, GridBlobConfig::default()).unwrap();
    assert_eq!(reader.meta().layout().bands, 3);
    let tile = reader.get_tile(2, 1).unwrap();
    assert_eq!(tile.data().as_bytes(), tile_pattern(5, GRID_RGB_SMALL.bytes_per_tile()).as_slice());

    // one pixel straddling tiles (0,0) and (1,0) horizontally
    let region = reader
        .read_region(&RasterRect::new(15, 0, 2, 1), None)
        .unwrap()
        .unwrap();
    let left = tile_pattern(0, GRID_RGB_SMALL.bytes_per_tile());
    let right = tile_pattern(1, GRID_RGB_SMALL.bytes_per_tile());
    assert_eq!(&region.raster.data().as_bytes()[..3], &left[15 * 3..16 * 3]);
    assert_eq!(&region.raster.data().as_bytes()[3..], &right[..3]);
}

#[test]
fn test_boundary_exclusion() {
    let meta = meta_for(&GRID_4X4_256);
    let addressing: GridAddressing = meta.addressing();

    assert_eq!(
        addressing.intersecting_tiles(&RasterRect::new(0, 0, 256, 256)),
        Some(TileRange::new(0, 0, 0, 0))
    );
    let range = addressing
        .intersecting_tiles(&RasterRect::new(0, 0, 257, 257))
        .unwrap();
    let tiles: Vec<_> = range.iter().collect();
    assert_eq!(tiles, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
}

#[test]
fn test_clipping_returns_none_or_clipped_region() {
    let dir = temp_grid_dir();
    let writer = writer_for(dir.path(), &GRID_TINY);
    writer
        .write_entire_file(&grid_pattern(GRID_TINY.tile_count(), GRID_TINY.bytes_per_tile()))
        .unwrap();
    writer.write_metadata_file().unwrap();
    let reader = SingleBlobReader::open(dir.path(), GRID_NAME, GridBlobConfig::default()).unwrap();
    let (width, height) = GRID_TINY.pixel_size();

    let outside = [
        RasterRect::new(width as i64, 0, 4, 4),
        RasterRect::new(0, height as i64, 4, 4),
        RasterRect::new(-10, -10, 5, 5),
        RasterRect::new(2, 2, 0, 3),
    ];
    for rect in outside {
        assert!(reader.read_region(&rect, None).unwrap().is_none(), "{rect:?}");
    }

    let region = reader
        .read_region(&RasterRect::new(-3, 10, 8, 100), None)
        .unwrap()
        .unwrap();
    assert_eq!(region.rect, RasterRect::new(0, 10, 5, height as i64 - 10));
    assert_eq!(
        region.raster.data().as_bytes().len(),
        region.rect.width as usize * region.rect.height as usize
    );
    let direct = reader.read_region(&region.rect, None).unwrap().unwrap();
    assert_eq!(direct.raster.data().as_bytes(), region.raster.data().as_bytes());
}

#[test]
fn test_caller_buffer_must_match_clipped_region() {
    let dir = temp_grid_dir();
    let writer = writer_for(dir.path(), &GRID_TINY);
    writer
        .write_entire_file(&grid_pattern(GRID_TINY.tile_count(), GRID_TINY.bytes_per_tile()))
        .unwrap();
    writer.write_metadata_file().unwrap();
    let reader = SingleBlobReader::open(dir.path(), GRID_NAME, GridBlobConfig::default()).unwrap();

    // clipped to 2x2 even though 4x4 was requested
    let rect = RasterRect::new(14, 18, 4, 4);
    assert!(matches!(
        reader.read_region(&rect, Some(vec![0; 16])),
        Err(GridBlobError::InvalidArgument(_))
    ));
    let region = reader.read_region(&rect, Some(vec![0xff; 4])).unwrap().unwrap();
    assert_eq!(region.rect, RasterRect::new(14, 18, 2, 2));
    let expected = reader.read_region(&region.rect, None).unwrap().unwrap();
    assert_eq!(region.raster.data().as_bytes(), expected.raster.data().as_bytes());
}

#[test]
fn test_world_region_matches_pixel_region() {
    let dir = temp_grid_dir();
    let writer = writer_for(dir.path(), &GRID_TINY);
    writer
        .write_entire_file(&grid_pattern(GRID_TINY.tile_count(), GRID_TINY.bytes_per_tile()))
        .unwrap();
    writer.write_metadata_file().unwrap();
    let reader = SingleBlobReader::open(dir.path(), GRID_NAME, GridBlobConfig::default()).unwrap();

    let rect = RasterRect::new(3, 5, 6, 7);
    let envelope = reader.meta().geo_reference().world_envelope_for(&rect);
    let by_world = reader.read_world_region(&envelope, None).unwrap().unwrap();
    let by_pixel = reader.read_region(&rect, None).unwrap().unwrap();
    assert_eq!(by_world, by_pixel);
    assert_eq!(by_world.raster.geo_reference().origin_x, 500_003.0);
}

#[test]
fn test_self_healing_from_short_blob() {
    let dir = temp_grid_dir();
    let meta = meta_for(&GRID_TINY);
    meta.write_to_file(dir.path(), GRID_NAME).unwrap();
    // only the first two rows (8 tiles) were ever written
    std::fs::write(
        dir.path().join("grid.bin"),
        grid_pattern(8, GRID_TINY.bytes_per_tile()),
    )
    .unwrap();

    let reader = SingleBlobReader::open(dir.path(), GRID_NAME, GridBlobConfig::default()).unwrap();
    assert_eq!(reader.meta().rows(), 2);
    assert_eq!(reader.meta().columns(), GRID_TINY.columns);

    let strict = GridBlobConfig::default().with_strict_tile_count(true);
    assert!(matches!(
        SingleBlobReader::open(dir.path(), GRID_NAME, strict),
        Err(GridBlobError::CorruptGrid(_))
    ));
}

#[test]
fn test_sparse_write_keeps_full_grid() {
    let dir = temp_grid_dir();
    let writer = writer_for(dir.path(), &GRID_3X3);
    writer.write_tile(0, 0, &vec![0x11; GRID_3X3.bytes_per_tile()]).unwrap();
    writer.write_metadata_file().unwrap();
    drop(writer);

    let blob_len = std::fs::metadata(dir.path().join("grid.bin")).unwrap().len();
    assert_eq!(blob_len, GRID_3X3.total_bytes());

    let strict = GridBlobConfig::default().with_strict_tile_count(true);
    let reader = SingleBlobReader::open(dir.path(), GRID_NAME, strict).unwrap();
    assert_eq!(reader.meta().rows(), 3);
    assert_eq!(reader.meta().tile_count(), 9);
    let written = reader.get_tile(0, 0).unwrap();
    assert_all_bytes!(written.data().as_bytes(), 0x11);
    let untouched = reader.get_tile(2, 2).unwrap();
    assert_all_bytes!(untouched.data().as_bytes(), 0);
}

#[test]
fn test_region_past_short_blob_reads_zeros() {
    let dir = temp_grid_dir();
    let bpt = GRID_TINY.bytes_per_tile();
    meta_for(&GRID_TINY).write_to_file(dir.path(), GRID_NAME).unwrap();
    // six tiles: row 1 ends after tile (1,1)
    std::fs::write(dir.path().join("grid.bin"), grid_pattern(6, bpt)).unwrap();

    let reader = SingleBlobReader::open(dir.path(), GRID_NAME, GridBlobConfig::default()).unwrap();
    assert_eq!(reader.meta().rows(), 2);
    assert_eq!(reader.meta().tile_count(), 8);
    assert!(matches!(reader.get_tile(2, 1), Err(GridBlobError::Io { .. })));

    // a stale caller buffer is overwritten everywhere, zeros included
    let row = reader
        .read_region(&RasterRect::new(0, 4, 16, 4), Some(vec![0xEE; 64]))
        .unwrap()
        .unwrap();
    let bytes = row.raster.data().as_bytes();
    for y in 0..4usize {
        let line = &bytes[y * 16..(y + 1) * 16];
        assert_eq!(&line[..4], &tile_pattern(4, bpt)[y * 4..(y + 1) * 4], "line {y}");
        assert_eq!(&line[4..8], &tile_pattern(5, bpt)[y * 4..(y + 1) * 4], "line {y}");
        assert_all_bytes!(&line[8..], 0);
    }
}

#[test]
fn test_missing_blob_is_io_error() {
    let dir = temp_grid_dir();
    meta_for(&GRID_TINY).write_to_file(dir.path(), GRID_NAME).unwrap();
    assert!(matches!(
        SingleBlobReader::open(dir.path(), GRID_NAME, GridBlobConfig::default()),
        Err(GridBlobError::Io { .. })
    ));
}

#[test]
fn test_leave_open_keeps_handle_between_reads() {
    let dir = temp_grid_dir();
    let writer = writer_for(dir.path(), &GRID_TINY);
    writer
        .write_entire_file(&grid_pattern(GRID_TINY.tile_count(), GRID_TINY.bytes_per_tile()))
        .unwrap();
    writer.write_metadata_file().unwrap();

    let config = GridBlobConfig::default().with_leave_open(true);
    let reader = SingleBlobReader::open(dir.path(), GRID_NAME, config).unwrap();
    reader.get_tile(0, 0).unwrap();
    assert!(reader.store().handle().is_open());

    let reader = SingleBlobReader::open(dir.path(), GRID_NAME, GridBlobConfig::default()).unwrap();
    reader.get_tile(0, 0).unwrap();
    assert!(!reader.store().handle().is_open());
}
