//! Error types for grid blob storage.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while addressing, reading or writing a grid.
#[derive(Error, Debug)]
pub enum GridBlobError {
    /// A caller supplied an unusable value (non-positive dimensions,
    /// a buffer of the wrong length, an unbound writer, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A tile coordinate or tile id outside the grid reached an
    /// addressing primitive.
    #[error("tile out of range: {0}")]
    OutOfRange(String),

    /// The blob files do not match the grid description, or a raster
    /// does not overlap the grid it is written into.
    #[error("corrupt grid: {0}")]
    CorruptGrid(String),

    /// Underlying file open/read/write/lock failure.
    #[error("I/O failure on {path:?}{}: {source}", tile_suffix(.tile))]
    Io {
        path: PathBuf,
        tile: Option<(u32, u32)>,
        #[source]
        source: std::io::Error,
    },

    /// The sidecar metadata file could not be parsed.
    #[error("invalid grid metadata: {0}")]
    InvalidMetadata(String),
}

fn tile_suffix(tile: &Option<(u32, u32)>) -> String {
    match tile {
        Some((col, row)) => format!(" (tile {col},{row})"),
        None => String::new(),
    }
}

impl GridBlobError {
    /// Create an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an OutOfRange error.
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::OutOfRange(msg.into())
    }

    /// Create a CorruptGrid error.
    pub fn corrupt_grid(msg: impl Into<String>) -> Self {
        Self::CorruptGrid(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Wrap an I/O error with the file it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            tile: None,
            source,
        }
    }

    /// Wrap an I/O error with the file and the tile being transferred.
    pub fn tile_io(path: impl AsRef<Path>, col: u32, row: u32, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            tile: Some((col, row)),
            source,
        }
    }

    /// Attach a tile coordinate to an I/O error that does not carry one yet.
    pub fn at_tile(self, col: u32, row: u32) -> Self {
        match self {
            Self::Io {
                path,
                tile: None,
                source,
            } => Self::Io {
                path,
                tile: Some((col, row)),
                source,
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for GridBlobError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidMetadata(err.to_string())
    }
}

/// Result type for grid blob operations.
pub type Result<T> = std::result::Result<T, GridBlobError>;
