//! Relief Service - HTTP tile server for shaded elevation maps.
//!
//! Serves slippy-map tiles rendered from a directory of ArcInfo ASCII Grid
//! files.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RELIEF_DATA_DIR` | Directory containing .asc / .grd files | Required |
//! | `RELIEF_CACHE_SIZE` | Maximum grids in memory | 64 |
//! | `RELIEF_TILE_SIZE` | Tile edge length in pixels | 256 |
//! | `RELIEF_MAX_HEIGHT` | Elevation drawn with the last gradient color | 3000 |
//! | `RELIEF_GRADIENT` | `simple`, `natural` or `natural-dark` | natural |
//! | `RELIEF_PORT` | HTTP server port | 8080 |
//! | `RELIEF_PRELOAD` | `all` or `min_lat,min_lon,max_lat,max_lon[;...]` | None |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `GET /tiles/{z}/{x}/{y}.png` - Rendered map tile
//! - `GET /elevation?lat=X&lon=Y` - Elevation at coordinates
//! - `GET /colors`, `PUT /colors` - Inspect or change the color mapping
//! - `GET /health` - Health check
//! - `GET /stats` - Cache statistics
//! - `GET /docs` - OpenAPI documentation (Swagger UI)

use std::net::SocketAddr;
use std::sync::Arc;

use relief::TileSourceBuilder;
use relief_service::{parse_preload_bounds, router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relief_service=info,relief=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var("RELIEF_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);

    // The library handles RELIEF_DATA_DIR, RELIEF_CACHE_SIZE, RELIEF_TILE_SIZE,
    // RELIEF_MAX_HEIGHT and RELIEF_GRADIENT
    let builder = match TileSourceBuilder::from_env() {
        Ok(builder) => builder,
        Err(e) => {
            tracing::warn!(error = %e, "Using current directory as data directory");
            TileSourceBuilder::new(".")
        }
    };
    let source = Arc::new(builder.build()?);

    tracing::info!(
        data_dir = %source.data_dir().display(),
        cache_capacity = source.index().cache_capacity(),
        tile_size = source.tile_size(),
        port = port,
        "Starting relief service"
    );

    if let Ok(preload_val) = std::env::var("RELIEF_PRELOAD") {
        let source = Arc::clone(&source);
        tokio::task::spawn_blocking(move || {
            if let Err(e) = source.wait_for_headers() {
                tracing::error!(error = %e, "Header scan failed, skipping preload");
                return;
            }
            let bounds = parse_preload_bounds(&preload_val);
            let bounds_ref = bounds.as_deref();
            tracing::info!(
                bounds = ?bounds_ref.map(|b| b.len()),
                "Preloading grids into cache"
            );
            let stats = source.index().preload(bounds_ref);
            tracing::info!(
                tiles_loaded = stats.tiles_loaded,
                tiles_already_cached = stats.tiles_already_cached,
                tiles_failed = stats.tiles_failed,
                tiles_matched = stats.tiles_matched,
                elapsed_ms = stats.elapsed_ms,
                "Preload complete"
            );
        });
    }

    let app = router(Arc::new(AppState { source }));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
