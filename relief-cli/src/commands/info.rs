use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use relief::AsciiGridReader;
use serde::Serialize;
use std::path::PathBuf;

use super::{format_coverage, format_size};

#[derive(Serialize)]
struct GridInfo {
    path: String,
    columns: usize,
    rows: usize,
    cell_size: f64,
    min_lat: f64,
    min_lon: f64,
    max_lat: f64,
    max_lon: f64,
    no_data: Option<i16>,
    min_elevation: Option<i16>,
    max_elevation: Option<i16>,
    no_data_samples: usize,
    file_size: u64,
}

pub fn run(path: PathBuf, json: bool) -> Result<()> {
    if !path.exists() {
        bail!("Grid file not found: {}", path.display());
    }
    let file_size = std::fs::metadata(&path)?.len();

    let progress = if json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}%")?
                .progress_chars("#>-"),
        );
        pb
    };

    let bar = progress.clone();
    let tile = AsciiGridReader::new()
        .with_progress(move |percent| bar.set_position(u64::from(percent)))
        .read_tile(&path)
        .with_context(|| format!("Failed to read grid {}", path.display()))?;
    progress.finish_and_clear();

    let header = tile.header();
    let bounds = header.bounds();

    if json {
        let info = GridInfo {
            path: path.display().to_string(),
            columns: header.columns,
            rows: header.rows,
            cell_size: header.cell_size,
            min_lat: bounds.min_lat,
            min_lon: bounds.min_lon,
            max_lat: bounds.max_lat,
            max_lon: bounds.max_lon,
            no_data: header.no_data,
            min_elevation: tile.min(),
            max_elevation: tile.max(),
            no_data_samples: tile.no_data_count(),
            file_size,
        };
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Grid: {}", path.display());
    println!();
    println!(
        "Size: {}x{} samples, cell size {}°",
        header.columns, header.rows, header.cell_size
    );
    println!("Coverage: {}", format_coverage(&bounds));
    match header.no_data {
        Some(value) => println!("No-data value: {}", value),
        None => println!("No-data value: none"),
    }
    println!("File size: {}", format_size(file_size));
    println!();

    if let (Some(min), Some(max)) = (tile.min(), tile.max()) {
        println!("Min elevation: {}m", min);
        println!("Max elevation: {}m", max);
    }

    let no_data = tile.no_data_count();
    if no_data > 0 {
        let pct = (no_data as f64 / header.sample_count() as f64) * 100.0;
        println!("No-data samples: {} ({:.1}%)", no_data, pct);
    }

    Ok(())
}
