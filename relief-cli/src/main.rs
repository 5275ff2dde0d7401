use anyhow::Result;
use clap::{Parser, Subcommand};
use relief::GradientPreset;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::RenderOptions;

/// Shaded elevation tiles from ArcInfo ASCII grids
#[derive(Parser)]
#[command(name = "relief")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing .asc / .grd files
    #[arg(short, long, env = "RELIEF_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Maximum grids kept in memory
    #[arg(
        short,
        long,
        env = "RELIEF_CACHE_SIZE",
        default_value = "64",
        global = true
    )]
    cache_size: u64,

    /// Color gradient: simple, natural or natural-dark
    #[arg(
        short,
        long,
        env = "RELIEF_GRADIENT",
        default_value = "natural",
        global = true
    )]
    gradient: GradientPreset,

    /// Elevation in meters drawn with the last gradient color
    #[arg(long, env = "RELIEF_MAX_HEIGHT", default_value = "3000", global = true)]
    max_height: i32,

    /// Edge length of rendered tiles in pixels
    #[arg(long, env = "RELIEF_TILE_SIZE", default_value = "256", global = true)]
    tile_size: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query elevation for a single coordinate
    Query {
        /// Latitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Display information about a grid file
    Info {
        /// Path to an .asc / .grd file
        file: PathBuf,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List grid files in the data directory
    List,

    /// Render one map tile to a PNG file
    Render {
        /// Zoom level
        #[arg(short, long)]
        zoom: u8,

        /// Tile column
        #[arg(short, long, requires = "y", conflicts_with_all = ["lat", "lon"])]
        x: Option<u32>,

        /// Tile row
        #[arg(short, long, requires = "x")]
        y: Option<u32>,

        /// Render the tile containing this latitude
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Render the tile containing this longitude
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Output file (defaults to <z>_<x>_<y>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render every tile covering a bounding box
    Tiles {
        /// Bounding box as min_lat,min_lon,max_lat,max_lon
        #[arg(short, long, allow_hyphen_values = true)]
        bbox: String,

        /// Zoom level
        #[arg(short, long)]
        zoom: u8,

        /// Output directory; tiles are written as <z>/<x>/<y>.png
        #[arg(short, long, default_value = "tiles")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let options = RenderOptions {
        cache_size: cli.cache_size,
        gradient: cli.gradient,
        max_height: cli.max_height,
        tile_size: cli.tile_size,
    };

    match cli.command {
        Commands::Query { lat, lon, json } => {
            commands::query::run(cli.data_dir, cli.cache_size, lat, lon, json)
        }
        Commands::Info { file, json } => commands::info::run(file, json),
        Commands::List => commands::list::run(cli.data_dir),
        Commands::Render {
            zoom,
            x,
            y,
            lat,
            lon,
            output,
        } => {
            let target = match (x, y, lat, lon) {
                (Some(x), Some(y), _, _) => commands::render::Target::Tile { x, y },
                (_, _, Some(lat), Some(lon)) => commands::render::Target::Point { lat, lon },
                _ => anyhow::bail!("Specify either --x and --y or --lat and --lon"),
            };
            commands::render::run(cli.data_dir, &options, zoom, target, output)
        }
        Commands::Tiles { bbox, zoom, output } => {
            commands::tiles::run(cli.data_dir, &options, &bbox, zoom, output)
        }
    }
}
