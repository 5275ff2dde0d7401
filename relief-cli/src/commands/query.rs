use anyhow::{Context, Result};
use relief::TileIndex;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct ElevationResponse {
    lat: f64,
    lon: f64,
    elevation: Option<i16>,
}

pub fn run(data_dir: Option<PathBuf>, cache_size: u64, lat: f64, lon: f64, json: bool) -> Result<()> {
    let dir = super::data_dir(data_dir)?;

    let index = TileIndex::new(cache_size);
    index
        .load_headers(&dir)
        .with_context(|| format!("Failed to index {}", dir.display()))?;

    let elevation = index
        .elevation_at(lon, lat)
        .context("Failed to get elevation")?;

    if json {
        let response = ElevationResponse {
            lat,
            lon,
            elevation,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        match elevation {
            Some(elev) => println!("{}", elev),
            None => println!("no data"),
        }
    }

    Ok(())
}
