use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, RecvTimeoutError};
use indicatif::{ProgressBar, ProgressStyle};
use relief::tiles::tiles_covering;
use relief::{BoundingBox, LoaderConfig, RenderedTile};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use super::RenderOptions;

pub fn run(
    data_dir: Option<PathBuf>,
    options: &RenderOptions,
    bbox: &str,
    zoom: u8,
    output: PathBuf,
) -> Result<()> {
    let bounds = BoundingBox::parse(bbox).with_context(|| {
        format!(
            "Invalid bounding box '{}'. Expected min_lat,min_lon,max_lat,max_lon",
            bbox
        )
    })?;
    let tiles = tiles_covering(&bounds, zoom)?;

    let source = super::open_source(data_dir, options)?;
    println!(
        "Rendering {} tiles at zoom {} from {} grids",
        tiles.len(),
        zoom,
        source.index().header_count()
    );

    let start = Instant::now();
    let (tx, rx) = unbounded::<RenderedTile>();
    let loader = source.spawn_loader(tx, LoaderConfig::default())?;
    loader.submit(tiles.iter().map(|&tile| source.request_for(tile)));

    let pb = ProgressBar::new(tiles.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let total = tiles.len() as u64;
    let mut written = 0u64;
    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(rendered) => {
                save(&output, &rendered)?;
                written += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        let stats = loader.stats();
        let processed = stats.delivered + stats.no_data + stats.failed;
        pb.set_position(processed);
        if processed >= total && written >= stats.delivered {
            break;
        }
    }
    let stats = loader.stats();
    loader.shutdown();
    pb.finish_and_clear();

    println!();
    println!("Summary:");
    println!("  Written: {}", written);
    if stats.no_data > 0 {
        println!("  No data: {}", stats.no_data);
    }
    if stats.failed > 0 {
        println!("  Failed: {}", stats.failed);
    }
    println!("  Output directory: {}", output.display());
    println!("  Elapsed: {:.2}s", start.elapsed().as_secs_f64());

    let index = source.index().stats();
    println!("  Grid cache hit rate: {:.1}%", index.hit_rate() * 100.0);

    Ok(())
}

/// Write a tile as `<output>/<z>/<x>/<y>.png`.
fn save(output: &Path, rendered: &RenderedTile) -> Result<()> {
    let tile = rendered.tile;
    let dir = output.join(tile.zoom.to_string()).join(tile.x.to_string());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(format!("{}.png", tile.y));
    rendered
        .image
        .save_png(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
