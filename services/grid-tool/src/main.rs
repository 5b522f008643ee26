//! Grid blob operator tool.
//!
//! Inspects grids stored as tiled blobs and extracts regions or single
//! tiles to raw files:
//! - `info` prints the sidecar metadata
//! - `validate` opens the grid and reads every tile
//! - `read` and `tile` copy pixels out of the grid

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use grid_blob::{GridBlobConfig, RasterRect};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "grid-tool")]
#[command(about = "Inspect and extract data from tiled blob grids")]
struct Args {
    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

/// Location of a grid: `<dir>/<name>.info` plus its blob(s).
#[derive(clap::Args, Debug)]
struct GridLocation {
    /// Directory holding the grid
    dir: PathBuf,

    /// Grid name (file stem of the sidecar and blobs)
    name: String,

    /// Grid is split across `<name>0.bin`, `<name>1.bin`, ...
    #[arg(long)]
    split: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the grid's metadata
    Info {
        dir: PathBuf,
        name: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Open the grid and check that every tile is readable
    Validate {
        #[command(flatten)]
        grid: GridLocation,

        /// Fail when the blob size disagrees with the metadata instead of
        /// trusting the file
        #[arg(long)]
        strict: bool,
    },

    /// Extract a pixel rectangle to a raw file
    Read {
        #[command(flatten)]
        grid: GridLocation,

        #[arg(long, allow_hyphen_values = true)]
        x: i64,

        #[arg(long, allow_hyphen_values = true)]
        y: i64,

        #[arg(long)]
        width: i64,

        #[arg(long)]
        height: i64,

        /// Output file
        #[arg(long)]
        out: PathBuf,
    },

    /// Extract one tile to a raw file
    Tile {
        #[command(flatten)]
        grid: GridLocation,

        col: u32,
        row: u32,

        /// Output file
        #[arg(long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);
    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    let config = GridBlobConfig::from_env();
    if let Err(e) = config.validate() {
        anyhow::bail!("invalid grid configuration: {e}");
    }

    match args.command {
        Command::Info { dir, name, json } => {
            println!("{}", commands::info(&dir, &name, json)?);
        }
        Command::Validate { grid, strict } => {
            let strict = strict || config.strict_tile_count;
            let config = config.with_strict_tile_count(strict);
            let report = commands::validate(&grid.dir, &grid.name, grid.split, config)?;
            println!("{report}");
            if !report.is_complete() {
                anyhow::bail!("{} of {} tiles have no data", report.missing_tiles, report.tile_count);
            }
        }
        Command::Read {
            grid,
            x,
            y,
            width,
            height,
            out,
        } => {
            let rect = RasterRect::new(x, y, width, height);
            let clipped = commands::read(&grid.dir, &grid.name, grid.split, config, &rect, &out)?;
            info!(
                x = clipped.x,
                y = clipped.y,
                width = clipped.width,
                height = clipped.height,
                out = %out.display(),
                "Wrote region"
            );
        }
        Command::Tile { grid, col, row, out } => {
            let bytes = commands::tile(&grid.dir, &grid.name, grid.split, config, col, row, &out)?;
            info!(col, row, bytes, out = %out.display(), "Wrote tile");
        }
    }

    Ok(())
}
