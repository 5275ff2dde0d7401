//! Render one map tile from a directory of ASCII grids.
//!
//! Run with: cargo run --example render_tile --features png -- /path/to/grids 46.948 7.447 10

use relief::{ReliefError, TileId, TileSource};
use std::env;

fn main() -> Result<(), ReliefError> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() != 4 {
        eprintln!("Usage: cargo run --example render_tile --features png -- <dir> <lat> <lon> <zoom>");
        std::process::exit(1);
    }

    let parse = |value: &str| -> Result<f64, ReliefError> {
        value
            .parse()
            .map_err(|_| ReliefError::InvalidRequest(format!("not a number: {}", value)))
    };
    let lat = parse(&args[1])?;
    let lon = parse(&args[2])?;
    let zoom = parse(&args[3])? as u8;

    let source = TileSource::configure(&args[0])?;
    let headers = source.wait_for_headers()?;
    println!("Indexed {} grid files", headers);

    let tile = TileId::from_lat_lon(lat, lon, zoom)?;
    match source.render_tile(tile)? {
        Some(image) => {
            let path = format!("{}_{}_{}.png", tile.zoom, tile.x, tile.y);
            image.save_png(&path)?;
            println!("Tile {} written to {}", tile, path);
        }
        None => println!("No grid covers tile {}", tile),
    }

    let stats = source.index().stats();
    println!("\nIndex statistics:");
    println!("  Headers: {}", stats.header_count);
    println!("  Loaded grids: {}", stats.loaded_count);
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    Ok(())
}
