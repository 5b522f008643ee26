//! Configuration for grid blob storage.

use serde::{Deserialize, Serialize};

/// Default target tile width used when a writer derives its geometry from
/// the first source raster.
pub const DEFAULT_TILE_WIDTH: u32 = 500;

/// Runtime configuration shared by readers and writers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridBlobConfig {
    /// Keep blob handles open between operations instead of closing them
    /// after each transfer.
    pub leave_open: bool,

    /// Target tile width (and height) in pixels for writers without an
    /// explicit column/row count.
    pub default_tile_width: u32,

    /// Maximum number of idle buffers retained per buffer size.
    pub pool_buffers_per_size: usize,

    /// Fail with `CorruptGrid` when the blob size disagrees with the
    /// metadata tile count instead of trusting the file.
    pub strict_tile_count: bool,

    /// Read tiles in parallel when loading a whole grid.
    pub parallel_load: bool,
}

impl Default for GridBlobConfig {
    fn default() -> Self {
        Self {
            leave_open: false,
            default_tile_width: DEFAULT_TILE_WIDTH,
            pool_buffers_per_size: 8,
            strict_tile_count: false,
            parallel_load: true,
        }
    }
}

impl GridBlobConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GRID_LEAVE_OPEN") {
            config.leave_open = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("GRID_DEFAULT_TILE_WIDTH") {
            if let Ok(width) = val.parse() {
                config.default_tile_width = width;
            }
        }

        if let Ok(val) = std::env::var("GRID_POOL_BUFFERS") {
            if let Ok(count) = val.parse() {
                config.pool_buffers_per_size = count;
            }
        }

        if let Ok(val) = std::env::var("GRID_STRICT_TILE_COUNT") {
            config.strict_tile_count = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("GRID_PARALLEL_LOAD") {
            config.parallel_load = parse_flag(&val);
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_tile_width == 0 {
            return Err("default_tile_width must be > 0".to_string());
        }

        Ok(())
    }

    pub fn with_leave_open(mut self, leave_open: bool) -> Self {
        self.leave_open = leave_open;
        self
    }

    pub fn with_strict_tile_count(mut self, strict: bool) -> Self {
        self.strict_tile_count = strict;
        self
    }
}

fn parse_flag(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}
