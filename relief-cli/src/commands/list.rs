use anyhow::{Context, Result};
use relief::grid::read_header;
use relief::index::scan_grid_files;
use std::fs;
use std::path::PathBuf;

use super::{format_coverage, format_size};

pub fn run(data_dir: Option<PathBuf>) -> Result<()> {
    let dir = super::data_dir(data_dir)?;

    if !dir.exists() {
        anyhow::bail!("Data directory does not exist: {}", dir.display());
    }

    let files = scan_grid_files(&dir).context("Failed to read data directory")?;

    if files.is_empty() {
        println!("No .asc or .grd files found in: {}", dir.display());
        return Ok(());
    }

    let mut unreadable = 0;
    let mut total_size: u64 = 0;

    println!("{:<24} {:>11} {:>10}  {}", "GRID", "SAMPLES", "CELL", "COVERAGE");
    println!("{}", "-".repeat(96));

    for path in &files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        total_size += fs::metadata(path).map(|m| m.len()).unwrap_or(0);

        match read_header(path) {
            Ok(header) => {
                println!(
                    "{:<24} {:>11} {:>10.6}  {}",
                    name,
                    format!("{}x{}", header.columns, header.rows),
                    header.cell_size,
                    format_coverage(&header.bounds())
                );
            }
            Err(e) => {
                unreadable += 1;
                tracing::debug!("Skipping {}: {}", path.display(), e);
                println!("{:<24} {:>11} {:>10}  {}", name, "???", "???", "Unreadable header");
            }
        }
    }

    println!();
    println!("Summary:");
    println!("  Total grids: {}", files.len());
    if unreadable > 0 {
        println!("  Unreadable: {}", unreadable);
    }
    println!("  Total size: {}", format_size(total_size));
    println!("  Data directory: {}", dir.display());

    Ok(())
}
