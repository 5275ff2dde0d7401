//! Error types for the relief library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when reading grid data or rendering tiles.
#[derive(Error, Debug)]
pub enum ReliefError {
    /// IO error when reading files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A header line or body token could not be parsed.
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The grid body ended before `columns × rows` values were read.
    #[error("Truncated grid body: expected {expected} values, found {found}")]
    TruncatedBody { expected: usize, found: usize },

    /// A gradient needs control points at offsets 0.0 and 1.0.
    #[error("Invalid gradient: {0}")]
    InvalidGradient(String),

    /// Endpoint control points cannot be removed or moved.
    #[error("Gradient point at offset {offset} is fixed")]
    FixedPoint { offset: f64 },

    /// A render request with an empty raster or an inverted bounding box.
    #[error("Invalid render request: {0}")]
    InvalidRequest(String),

    /// Tile indices outside the range valid for the zoom level.
    #[error("Invalid tile: z={zoom}, x={x}, y={y}")]
    InvalidTile { zoom: u8, x: u32, y: u32 },

    /// The configured grid directory does not exist.
    #[error("Data directory not found: {path}")]
    DataDirNotFound { path: PathBuf },

    /// Rendering a tile panicked; the tile was abandoned.
    #[error("Rendering panicked: {0}")]
    RenderPanicked(String),

    /// PNG encoding failed.
    #[cfg(feature = "png")]
    #[error("Image encoding error: {0}")]
    Encode(#[from] image::ImageError),
}

impl ReliefError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        ReliefError::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Result type alias using [`ReliefError`].
pub type Result<T> = std::result::Result<T, ReliefError>;
