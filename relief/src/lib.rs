//! # Relief - Shaded Elevation Map Tiles
//!
//! Renders slippy-map tiles from ArcInfo ASCII Grid elevation files: every
//! tile is colored by elevation through a configurable gradient and overlaid
//! with relief shading.
//!
//! ## Features
//!
//! - **Streaming parser**: Grid bodies are tokenized from a fixed-size buffer
//! - **Lazy loading**: Only headers are read up front, grids load on first use
//! - **Bounded memory**: Loaded grids live in an LRU-style cache
//! - **Non-blocking**: A background loader renders the newest requests first
//!
//! ## Quick Start
//!
//! ```ignore
//! use relief::{TileId, TileSource};
//!
//! let source = TileSource::configure("/data/dem")?;
//! source.wait_for_headers()?;
//!
//! // Bern, Switzerland
//! let tile = TileId::from_lat_lon(46.948, 7.447, 10)?;
//! if let Some(image) = source.render_tile(tile)? {
//!     println!("{}x{} BGRA, stride {}", image.width(), image.height(), image.stride());
//! }
//! ```
//!
//! ## Grid Data Format
//!
//! ```text
//! ncols        4
//! nrows        3
//! xllcorner    7.0
//! yllcorner    46.0
//! cellsize     0.25
//! NODATA_value -9999
//! 512 530 561 590
//! 498 505 540 575
//! 470 489 -9999 560
//! ```
//!
//! The first data row is the northern edge of the grid.
//!
//! ## Optional Features
//!
//! - `png`: encode rendered tiles as PNG
//! - `serde`: serialize colors, gradients and statistics

pub mod colors;
pub mod error;
pub mod gradient;
pub mod grid;
pub mod height;
pub mod index;
pub mod loader;
pub mod render;
pub mod source;
pub mod tiles;

// Re-export main types at crate root for convenience
pub use colors::{ElevationColorCache, ElevationColorMapping, HeightColors};
pub use error::{ReliefError, Result};
pub use gradient::{Color, ElevationGradient, GradientColorPoint, GradientPreset};
pub use grid::{AsciiGridReader, GridHeader, GridSource};
pub use height::HeightTile;
pub use index::{IndexStats, PreloadStats, TileIndex};
pub use loader::{CallbackSink, LoaderConfig, LoaderStats, RenderedTile, TileLoader, TileSink};
pub use render::{RasterImage, TileRenderer};
pub use source::{TileSource, TileSourceBuilder};
pub use tiles::{BoundingBox, RenderRequest, TileId};
