//! Configured tile source.
//!
//! [`TileSource`] bundles everything needed to turn a directory of grid files
//! into map tiles: the [`TileIndex`], the shared [`ElevationColorCache`] and a
//! [`TileRenderer`] using it. Reconfiguring means building a new source and
//! dropping the old one.
//!
//! ```ignore
//! use relief::{TileId, TileSourceBuilder};
//!
//! let source = TileSourceBuilder::new("/data/dem")
//!     .cache_size(32)
//!     .max_height(4500)
//!     .build()?;
//!
//! if let Some(image) = source.render_tile(TileId::new(10, 533, 360)?)? {
//!     image.save_png("533_360.png")?;
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::colors::{ElevationColorCache, ElevationColorMapping, DEFAULT_MAX_HEIGHT};
use crate::error::{ReliefError, Result};
use crate::gradient::GradientPreset;
use crate::index::{TileIndex, DEFAULT_CACHE_SIZE};
use crate::loader::{LoaderConfig, TileLoader, TileSink};
use crate::render::{RasterImage, TileRenderer};
use crate::tiles::{RenderRequest, TileId, DEFAULT_TILE_SIZE};

/// Grid index, color cache and renderer for one data directory.
pub struct TileSource {
    data_dir: PathBuf,
    index: Arc<TileIndex>,
    colors: Arc<ElevationColorCache>,
    renderer: TileRenderer,
    tile_size: u32,
    header_scan: Mutex<Option<JoinHandle<Result<usize>>>>,
}

impl TileSource {
    /// Build a source for `data_dir` with default settings.
    ///
    /// The header scan runs in the background; tiles become available as
    /// their headers are read.
    pub fn configure<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        TileSourceBuilder::new(data_dir).build()
    }

    /// Create a builder for more configuration options.
    pub fn builder<P: AsRef<Path>>(data_dir: P) -> TileSourceBuilder {
        TileSourceBuilder::new(data_dir)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn index(&self) -> &Arc<TileIndex> {
        &self.index
    }

    pub fn colors(&self) -> &Arc<ElevationColorCache> {
        &self.colors
    }

    pub fn renderer(&self) -> &TileRenderer {
        &self.renderer
    }

    /// Edge length of rendered map tiles in pixels.
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Wait for the background header scan, if one is still running.
    ///
    /// Returns the number of headers it added, or 0 if there was no scan to
    /// wait for.
    pub fn wait_for_headers(&self) -> Result<usize> {
        let handle = self.header_scan.lock().take();
        match handle {
            Some(handle) => handle.join().map_err(|_| {
                ReliefError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "header scan thread panicked",
                ))
            })?,
            None => Ok(0),
        }
    }

    /// Square render request for `tile` at the configured tile size.
    pub fn request_for(&self, tile: TileId) -> RenderRequest {
        RenderRequest::for_tile(tile, self.tile_size)
    }

    /// Render one map tile.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(image))` - a grid covers the whole tile
    /// - `Ok(None)` - no indexed grid covers the tile
    /// - `Err(...)` - the covering grid could not be read
    pub fn render_tile(&self, tile: TileId) -> Result<Option<RasterImage>> {
        self.render(&self.request_for(tile))
    }

    /// Render an arbitrary request.
    pub fn render(&self, request: &RenderRequest) -> Result<Option<RasterImage>> {
        request.validate()?;
        match self.index.get(&request.bounds)? {
            Some(height_tile) => self.renderer.render(&height_tile, request).map(Some),
            None => Ok(None),
        }
    }

    /// Start a background loader rendering through this source.
    pub fn spawn_loader<S: TileSink>(&self, sink: S, config: LoaderConfig) -> Result<TileLoader> {
        TileLoader::spawn(Arc::clone(&self.index), self.renderer.clone(), sink, config)
    }

    /// Edit the color mapping. Memoized colors are discarded afterwards.
    pub fn update_colors<R>(&self, edit: impl FnOnce(&mut ElevationColorMapping) -> R) -> R {
        self.colors.update(edit)
    }
}

impl std::fmt::Debug for TileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileSource")
            .field("data_dir", &self.data_dir)
            .field("tile_size", &self.tile_size)
            .field("index", &self.index)
            .finish()
    }
}

/// Builder for creating [`TileSource`] with custom configuration.
///
/// # Example
///
/// ```ignore
/// use relief::{GradientPreset, TileSourceBuilder};
///
/// let source = TileSourceBuilder::new("/data/dem")
///     .cache_size(100)
///     .gradient(GradientPreset::NaturalDark)
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct TileSourceBuilder {
    data_dir: PathBuf,
    cache_size: u64,
    tile_size: u32,
    max_height: i32,
    gradient: GradientPreset,
    background_scan: bool,
}

impl TileSourceBuilder {
    /// Create a new builder with the specified data directory.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            cache_size: DEFAULT_CACHE_SIZE,
            tile_size: DEFAULT_TILE_SIZE,
            max_height: DEFAULT_MAX_HEIGHT,
            gradient: GradientPreset::default(),
            background_scan: true,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `RELIEF_DATA_DIR` | Directory containing grid files | Required |
    /// | `RELIEF_CACHE_SIZE` | Maximum loaded grids in cache | 64 |
    /// | `RELIEF_TILE_SIZE` | Map tile edge length in pixels | 256 |
    /// | `RELIEF_MAX_HEIGHT` | Elevation drawn with the last gradient color | 3000 |
    /// | `RELIEF_GRADIENT` | `simple`, `natural` or `natural-dark` | natural |
    ///
    /// Unparsable numbers fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `RELIEF_DATA_DIR` is not set or `RELIEF_GRADIENT`
    /// names an unknown preset.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = var("RELIEF_DATA_DIR").ok_or_else(|| {
            ReliefError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "RELIEF_DATA_DIR environment variable not set",
            ))
        })?;

        let mut builder = Self::new(data_dir);
        if let Some(size) = var("RELIEF_CACHE_SIZE").and_then(|s| s.parse().ok()) {
            builder.cache_size = size;
        }
        if let Some(size) = var("RELIEF_TILE_SIZE").and_then(|s| s.parse().ok()) {
            builder.tile_size = size;
        }
        if let Some(height) = var("RELIEF_MAX_HEIGHT").and_then(|s| s.parse().ok()) {
            builder.max_height = height;
        }
        if let Some(name) = var("RELIEF_GRADIENT") {
            builder.gradient = name.parse()?;
        }
        Ok(builder)
    }

    /// Set the data directory.
    ///
    /// Overrides the directory set in the constructor or from environment.
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the maximum number of loaded grids to keep in cache.
    ///
    /// Default is 64 grids.
    pub fn cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    /// Set the map tile edge length in pixels. Default is 256.
    pub fn tile_size(mut self, size: u32) -> Self {
        self.tile_size = size;
        self
    }

    /// Set the elevation mapped to the top of the gradient. Default is 3000 m.
    pub fn max_height(mut self, max_height: i32) -> Self {
        self.max_height = max_height;
        self
    }

    pub fn gradient(mut self, preset: GradientPreset) -> Self {
        self.gradient = preset;
        self
    }

    /// Read headers on a background thread (default) or before `build` returns.
    pub fn background_scan(mut self, enabled: bool) -> Self {
        self.background_scan = enabled;
        self
    }

    /// Build the [`TileSource`].
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::DataDirNotFound`] if the data directory does not
    /// exist, and [`ReliefError::InvalidRequest`] for a zero tile size.
    pub fn build(self) -> Result<TileSource> {
        if !self.data_dir.is_dir() {
            return Err(ReliefError::DataDirNotFound {
                path: self.data_dir,
            });
        }
        if self.tile_size == 0 {
            return Err(ReliefError::InvalidRequest(
                "tile size must be positive".to_string(),
            ));
        }

        let mapping = ElevationColorMapping::from_preset(self.gradient).with_max_height(self.max_height);
        let colors = Arc::new(ElevationColorCache::new(mapping));
        let renderer = TileRenderer::new(Arc::clone(&colors));
        let index = Arc::new(TileIndex::new(self.cache_size));

        let header_scan = if self.background_scan {
            Some(index.spawn_header_scan(&self.data_dir)?)
        } else {
            index.load_headers(&self.data_dir)?;
            None
        };

        tracing::info!(
            data_dir = %self.data_dir.display(),
            cache_size = self.cache_size,
            tile_size = self.tile_size,
            gradient = %self.gradient,
            "Tile source configured"
        );

        Ok(TileSource {
            data_dir: self.data_dir,
            index,
            colors,
            renderer,
            tile_size: self.tile_size,
            header_scan: Mutex::new(header_scan),
        })
    }
}
