//! HTTP request handlers for the tile service.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use relief::{ReliefError, TileId, TileSource};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::AppState;

/// Query parameters for the elevation endpoint.
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ElevationQuery {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

/// Successful elevation response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ElevationResponse {
    /// Elevation in meters of the nearest sample.
    pub elevation: i16,
    /// Latitude queried.
    pub lat: f64,
    /// Longitude queried.
    pub lon: f64,
}

/// Error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Grid index and color cache statistics.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Number of indexed grid headers.
    pub indexed_grids: usize,
    /// Number of grids currently held in memory.
    pub cached_grids: u64,
    /// Maximum number of grids held in memory.
    pub cache_capacity: u64,
    /// Lookups served by a loaded grid.
    pub cache_hits: u64,
    /// Lookups that had to load a grid.
    pub cache_misses: u64,
    /// Cache hit rate (0.0 to 1.0).
    pub hit_rate: f64,
    /// Number of grid files parsed since startup.
    pub grids_parsed: u64,
    /// Distinct elevations with a memoized color.
    pub cached_colors: usize,
}

/// One gradient control point.
#[derive(Debug, Serialize, ToSchema)]
pub struct ColorStop {
    /// Color as `#rrggbb` or `#rrggbbaa`.
    pub color: String,
    /// Position in the gradient (0.0 to 1.0).
    pub offset: f64,
}

/// Current elevation color mapping.
#[derive(Debug, Serialize, ToSchema)]
pub struct ColorsResponse {
    /// Gradient control points in offset order.
    pub points: Vec<ColorStop>,
    /// Elevation in meters drawn with the last gradient color.
    pub max_height: i32,
    /// Gradient position of sea level.
    pub sea_level_offset: f64,
}

/// Changes to the elevation color mapping. Absent fields stay as they are.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ColorsUpdate {
    /// New maximum elevation in meters (clamped to 1..=9000).
    pub max_height: Option<i32>,
    /// New sea level offset (clamped to 0.0..=1.0).
    pub sea_level_offset: Option<f64>,
}

/// Render a map tile as PNG.
///
/// # Returns
///
/// - `200 OK` with the PNG image
/// - `204 No Content` if no grid covers the tile
/// - `400 Bad Request` if the tile coordinates are invalid
/// - `500 Internal Server Error` if the covering grid could not be read
#[utoipa::path(
    get,
    path = "/tiles/{z}/{x}/{y}.png",
    tag = "tiles",
    params(
        ("z" = u8, Path, description = "Zoom level (0 to 24)"),
        ("x" = u32, Path, description = "Tile column"),
        ("y" = u32, Path, description = "Tile row"),
    ),
    responses(
        (status = 200, description = "Rendered tile", content_type = "image/png", body = Vec<u8>),
        (status = 204, description = "No grid covers the tile"),
        (status = 400, description = "Invalid tile coordinates", body = ErrorResponse),
        (status = 500, description = "Grid could not be read", body = ErrorResponse),
    )
)]
pub async fn get_tile(
    State(state): State<Arc<AppState>>,
    Path((z, x, y)): Path<(u8, u32, String)>,
) -> Response {
    let Some(y) = y.strip_suffix(".png").and_then(|s| s.parse::<u32>().ok()) else {
        return bad_request(format!("Invalid tile row '{}', expected <y>.png", y));
    };
    let tile = match TileId::new(z, x, y) {
        Ok(tile) => tile,
        Err(e) => return error_response(e),
    };

    tracing::debug!(%tile, "Tile request");

    let source = Arc::clone(&state.source);
    let rendered = tokio::task::spawn_blocking(move || -> relief::Result<Option<Vec<u8>>> {
        match source.render_tile(tile)? {
            Some(image) => image.encode_png().map(Some),
            None => Ok(None),
        }
    })
    .await;

    match rendered {
        Ok(Ok(Some(png))) => {
            tracing::debug!(%tile, bytes = png.len(), "Tile rendered");
            (
                [
                    (header::CONTENT_TYPE, "image/png"),
                    (header::CACHE_CONTROL, "public, max-age=3600"),
                ],
                png,
            )
                .into_response()
        }
        Ok(Ok(None)) => StatusCode::NO_CONTENT.into_response(),
        Ok(Err(e)) => {
            tracing::warn!(%tile, error = %e, "Tile rendering failed");
            error_response(e)
        }
        Err(e) => {
            tracing::error!(%tile, error = %e, "Render task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Render task failed".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Get the elevation of the sample nearest to a coordinate.
///
/// # Returns
///
/// - `200 OK` with elevation data
/// - `404 Not Found` if no grid covers the point or the sample is no-data
/// - `500 Internal Server Error` if the grid could not be read
#[utoipa::path(
    get,
    path = "/elevation",
    tag = "elevation",
    params(ElevationQuery),
    responses(
        (status = 200, description = "Elevation found", body = ElevationResponse),
        (status = 404, description = "No data at this point", body = ErrorResponse),
        (status = 500, description = "Grid could not be read", body = ErrorResponse),
    )
)]
pub async fn get_elevation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ElevationQuery>,
) -> Response {
    tracing::debug!(lat = query.lat, lon = query.lon, "Elevation query");

    let index = Arc::clone(state.source.index());
    let (lat, lon) = (query.lat, query.lon);
    let result = tokio::task::spawn_blocking(move || index.elevation_at(lon, lat)).await;

    match result {
        Ok(Ok(Some(elevation))) => (
            StatusCode::OK,
            Json(ElevationResponse {
                elevation,
                lat,
                lon,
            }),
        )
            .into_response(),
        Ok(Ok(None)) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("No elevation data at lat={}, lon={}", lat, lon),
            }),
        )
            .into_response(),
        Ok(Err(e)) => {
            tracing::warn!(lat, lon, error = %e, "Elevation query failed");
            error_response(e)
        }
        Err(e) => {
            tracing::error!(error = %e, "Elevation task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Get the current elevation color mapping.
#[utoipa::path(
    get,
    path = "/colors",
    tag = "tiles",
    responses((status = 200, description = "Current color mapping", body = ColorsResponse))
)]
pub async fn get_colors(State(state): State<Arc<AppState>>) -> Json<ColorsResponse> {
    Json(colors_response(&state.source))
}

/// Change the elevation color mapping.
///
/// Tiles rendered afterwards use the new mapping.
#[utoipa::path(
    put,
    path = "/colors",
    tag = "tiles",
    request_body = ColorsUpdate,
    responses(
        (status = 200, description = "Updated color mapping", body = ColorsResponse),
        (status = 500, description = "Update task failed", body = ErrorResponse),
    )
)]
pub async fn put_colors(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ColorsUpdate>,
) -> Response {
    tracing::debug!(?update, "Color mapping update");

    // The write lock waits for renders reading the color cache
    let source = Arc::clone(&state.source);
    let result = tokio::task::spawn_blocking(move || {
        source.update_colors(|mapping| {
            if let Some(max_height) = update.max_height {
                mapping.set_max_height(max_height);
            }
            if let Some(offset) = update.sea_level_offset {
                mapping.set_sea_level_offset(offset);
            }
        });
        colors_response(&source)
    })
    .await;

    match result {
        Ok(colors) => {
            tracing::info!(
                max_height = colors.max_height,
                sea_level_offset = colors.sea_level_offset,
                "Color mapping updated"
            );
            Json(colors).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Color update task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Color update task failed".to_string(),
                }),
            )
                .into_response()
        }
    }
}

fn colors_response(source: &TileSource) -> ColorsResponse {
    source.colors().with_source(|mapping| ColorsResponse {
        points: mapping
            .gradient()
            .points()
            .iter()
            .map(|point| ColorStop {
                color: point.color().to_string(),
                offset: point.offset(),
            })
            .collect(),
        max_height: mapping.max_height(),
        sea_level_offset: mapping.sea_level_offset(),
    })
}

/// Health check endpoint.
///
/// Returns service status and version.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get grid index and color cache statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "system",
    responses((status = 200, description = "Cache statistics", body = StatsResponse))
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let stats = state.source.index().stats();
    let colors = state.source.colors().stats();

    Json(StatsResponse {
        indexed_grids: stats.header_count,
        cached_grids: stats.loaded_count,
        cache_capacity: stats.cache_capacity,
        cache_hits: stats.hit_count,
        cache_misses: stats.miss_count,
        hit_rate: stats.hit_rate(),
        grids_parsed: stats.load_count,
        cached_colors: colors.entries,
    })
}

fn bad_request(message: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message })).into_response()
}

/// Map a library error to a status code and JSON body.
fn error_response(e: ReliefError) -> Response {
    let status = match &e {
        ReliefError::InvalidTile { .. } | ReliefError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}
