pub mod info;
pub mod list;
pub mod query;
pub mod render;
pub mod tiles;

use anyhow::{Context, Result};
use relief::{GradientPreset, TileSource};
use std::path::PathBuf;

/// Settings shared by the commands that render tiles.
pub struct RenderOptions {
    pub cache_size: u64,
    pub gradient: GradientPreset,
    pub max_height: i32,
    pub tile_size: u32,
}

/// Resolve the data directory from the flag or `RELIEF_DATA_DIR`.
pub fn data_dir(data_dir: Option<PathBuf>) -> Result<PathBuf> {
    match data_dir {
        Some(dir) => Ok(dir),
        None => {
            let dir = std::env::var("RELIEF_DATA_DIR").context(
                "RELIEF_DATA_DIR environment variable not set. Use --data-dir or set RELIEF_DATA_DIR",
            )?;
            Ok(PathBuf::from(dir))
        }
    }
}

/// Build a tile source with all headers read.
pub fn open_source(data_dir: Option<PathBuf>, options: &RenderOptions) -> Result<TileSource> {
    let dir = self::data_dir(data_dir)?;
    TileSource::builder(&dir)
        .cache_size(options.cache_size)
        .gradient(options.gradient)
        .max_height(options.max_height)
        .tile_size(options.tile_size)
        .background_scan(false)
        .build()
        .with_context(|| format!("Failed to open data directory {}", dir.display()))
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Human-readable extent, e.g. `46.0000°N to 47.0000°N, 7.0000°E to 8.0000°E`.
pub fn format_coverage(bounds: &relief::BoundingBox) -> String {
    let lat = |v: f64| format!("{:.4}°{}", v.abs(), if v >= 0.0 { "N" } else { "S" });
    let lon = |v: f64| format!("{:.4}°{}", v.abs(), if v >= 0.0 { "E" } else { "W" });
    format!(
        "{} to {}, {} to {}",
        lat(bounds.min_lat),
        lat(bounds.max_lat),
        lon(bounds.min_lon),
        lon(bounds.max_lon)
    )
}
