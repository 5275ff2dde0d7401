use anyhow::{Context, Result};
use relief::TileId;
use std::path::PathBuf;

use super::RenderOptions;

/// Which tile to render.
pub enum Target {
    Tile { x: u32, y: u32 },
    Point { lat: f64, lon: f64 },
}

pub fn run(
    data_dir: Option<PathBuf>,
    options: &RenderOptions,
    zoom: u8,
    target: Target,
    output: Option<PathBuf>,
) -> Result<()> {
    let tile = match target {
        Target::Tile { x, y } => TileId::new(zoom, x, y)?,
        Target::Point { lat, lon } => TileId::from_lat_lon(lat, lon, zoom)?,
    };

    let source = super::open_source(data_dir, options)?;
    let output =
        output.unwrap_or_else(|| PathBuf::from(format!("{}_{}_{}.png", tile.zoom, tile.x, tile.y)));

    match source
        .render_tile(tile)
        .with_context(|| format!("Failed to render tile {}", tile))?
    {
        Some(image) => {
            image
                .save_png(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Tile {} written to {}", tile, output.display());
        }
        None => println!("No grid covers tile {}", tile),
    }

    Ok(())
}
