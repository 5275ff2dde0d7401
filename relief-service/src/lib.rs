//! Relief Service Library
//!
//! HTTP handlers, router and OpenAPI document for the shaded tile server.
//! This library is used by both the relief-service binary and integration tests.

pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use relief::{BoundingBox, TileSource};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across handlers.
pub struct AppState {
    /// Grid index, color mapping and renderer.
    pub source: Arc<TileSource>,
}

// Re-export commonly used types for convenience
pub use handlers::{
    ColorStop, ColorsResponse, ColorsUpdate, ElevationQuery, ElevationResponse, ErrorResponse,
    HealthResponse, StatsResponse,
};

/// OpenAPI documentation for the relief service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Relief Tile Service",
        version = "0.1.0",
        description = "Shaded, elevation-colored map tiles rendered from ASCII grid elevation data.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    paths(
        handlers::get_tile,
        handlers::get_elevation,
        handlers::get_colors,
        handlers::put_colors,
        handlers::health_check,
        handlers::get_stats,
    ),
    components(
        schemas(
            handlers::ElevationQuery,
            handlers::ElevationResponse,
            handlers::ErrorResponse,
            handlers::HealthResponse,
            handlers::StatsResponse,
            handlers::ColorStop,
            handlers::ColorsResponse,
            handlers::ColorsUpdate,
        )
    ),
    tags(
        (name = "tiles", description = "Tile rendering endpoints"),
        (name = "elevation", description = "Elevation query endpoints"),
        (name = "system", description = "System and health endpoints")
    )
)]
pub struct ApiDoc;

/// Build the service router with tracing, CORS and Swagger UI.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/tiles/:z/:x/:y", get(handlers::get_tile))
        .route("/elevation", get(handlers::get_elevation))
        .route(
            "/colors",
            get(handlers::get_colors).put(handlers::put_colors),
        )
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}

/// Parse the `RELIEF_PRELOAD` environment variable value into bounding boxes.
///
/// Supported formats:
/// - `true`, `all`, `1`: preload every grid (returns `None`)
/// - `min_lat,min_lon,max_lat,max_lon`: single bounding box
/// - `min_lat,min_lon,max_lat,max_lon;min_lat,min_lon,max_lat,max_lon`: several boxes
///
/// Invalid boxes are skipped. If none parse, every grid is preloaded.
pub fn parse_preload_bounds(value: &str) -> Option<Vec<BoundingBox>> {
    let trimmed = value.trim();

    match trimmed.to_lowercase().as_str() {
        "true" | "all" | "1" => return None,
        _ => {}
    }

    let boxes: Vec<BoundingBox> = trimmed
        .split(';')
        .filter_map(|bbox_str| {
            let parsed = BoundingBox::parse(bbox_str);
            if parsed.is_none() {
                tracing::warn!(
                    bbox = bbox_str,
                    "Invalid bounding box format, expected min_lat,min_lon,max_lat,max_lon"
                );
            }
            parsed
        })
        .collect();

    if boxes.is_empty() {
        tracing::warn!(
            value = trimmed,
            "Could not parse RELIEF_PRELOAD value, preloading all grids"
        );
        None
    } else {
        Some(boxes)
    }
}
