//! Coverage index over a directory of grid files.
//!
//! [`TileIndex`] keeps the header of every grid file it has seen (cheap, read
//! eagerly) and a bounded cache of fully loaded [`HeightTile`]s (expensive,
//! read on first use).
//!
//! # Example
//!
//! ```ignore
//! use relief::{BoundingBox, TileIndex};
//!
//! let index = TileIndex::new(64);
//! index.load_headers("/data/dem")?;
//!
//! let bbox = BoundingBox::new(46.5, 7.5, 46.6, 7.6);
//! if let Some(tile) = index.get(&bbox)? {
//!     println!("{} covers the box", tile.filename().display());
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use moka::sync::Cache;
use parking_lot::{Mutex, RwLock};

use crate::error::{ReliefError, Result};
use crate::grid::{AsciiGridReader, GridHeader, GridSource};
use crate::height::HeightTile;
use crate::tiles::BoundingBox;

const HEADER_SCAN_THREAD: &str = "relief-header-scan";

/// Default number of loaded grids kept in memory.
pub const DEFAULT_CACHE_SIZE: u64 = 64;

/// File extensions recognized as grid files (compared case-insensitively).
pub const GRID_EXTENSIONS: [&str; 2] = ["asc", "grd"];

/// Statistics about the index and its tile cache.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IndexStats {
    /// Number of known grid headers.
    pub header_count: usize,
    /// Number of grids currently loaded in the cache.
    pub loaded_count: u64,
    /// Maximum number of loaded grids.
    pub cache_capacity: u64,
    /// Number of requests served from the cache.
    pub hit_count: u64,
    /// Number of requests that had to load a grid.
    pub miss_count: u64,
    /// Number of grid files actually parsed.
    pub load_count: u64,
}

impl IndexStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Statistics from a preload operation.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PreloadStats {
    /// Number of grids successfully loaded into cache.
    pub tiles_loaded: u64,
    /// Number of grids that were already in cache.
    pub tiles_already_cached: u64,
    /// Number of grids that failed to load.
    pub tiles_failed: u64,
    /// Number of grids that matched the bounding box filter.
    pub tiles_matched: u64,
    /// Total elapsed time in milliseconds.
    pub elapsed_ms: u64,
}

/// Maps bounding boxes to grid files and loaded height tiles.
pub struct TileIndex {
    source: Arc<dyn GridSource>,
    /// Directory of the last header scan, used by [`rescan`](Self::rescan).
    data_dir: RwLock<Option<PathBuf>>,
    headers: RwLock<Vec<GridHeader>>,
    tile_cache: Cache<PathBuf, Arc<HeightTile>>,
    /// Coarse lock held across "check cache, load, insert". Serializes all
    /// loads so no file is parsed twice at the same time.
    load_lock: Mutex<()>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    load_count: AtomicU64,
}

impl TileIndex {
    /// Create an empty index reading ASCII grids.
    ///
    /// # Arguments
    ///
    /// * `cache_size` - Maximum number of loaded grids to keep in memory
    pub fn new(cache_size: u64) -> Self {
        Self::with_source(Arc::new(AsciiGridReader::new()), cache_size)
    }

    /// Create an empty index reading grids through `source`.
    pub fn with_source(source: Arc<dyn GridSource>, cache_size: u64) -> Self {
        Self {
            source,
            data_dir: RwLock::new(None),
            headers: RwLock::new(Vec::new()),
            tile_cache: Cache::builder().max_capacity(cache_size).build(),
            load_lock: Mutex::new(()),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            load_count: AtomicU64::new(0),
        }
    }

    /// Read the header of every grid file in `directory`.
    ///
    /// Headers are added one at a time, so queries running concurrently see a
    /// partially populated index. Files whose header cannot be read are logged
    /// and skipped. Files already known are skipped too.
    ///
    /// # Returns
    ///
    /// The number of headers added.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::DataDirNotFound`] if `directory` is not a
    /// directory, or an I/O error if it cannot be listed.
    pub fn load_headers<P: AsRef<Path>>(&self, directory: P) -> Result<usize> {
        let directory = directory.as_ref();
        let files = scan_grid_files(directory)?;
        *self.data_dir.write() = Some(directory.to_path_buf());

        let start = Instant::now();
        let mut added = 0;
        for path in files {
            if self.is_known(&path) {
                continue;
            }
            match self.source.read_header(&path) {
                Ok(header) => {
                    if self.add_header(header) {
                        added += 1;
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable grid header");
                }
            }
        }

        tracing::info!(
            directory = %directory.display(),
            added,
            total = self.header_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Grid headers loaded"
        );
        Ok(added)
    }

    /// Run [`load_headers`](Self::load_headers) on a background thread named
    /// `relief-header-scan`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the thread cannot be spawned.
    pub fn spawn_header_scan<P: AsRef<Path>>(
        self: &Arc<Self>,
        directory: P,
    ) -> Result<JoinHandle<Result<usize>>> {
        let index = Arc::clone(self);
        let directory = directory.as_ref().to_path_buf();
        let handle = thread::Builder::new()
            .name(HEADER_SCAN_THREAD.to_string())
            .spawn(move || index.load_headers(directory))?;
        Ok(handle)
    }

    /// Scan the last loaded directory again, picking up new files only.
    ///
    /// Returns 0 if no directory has been loaded yet.
    pub fn rescan(&self) -> Result<usize> {
        let directory = self.data_dir.read().clone();
        match directory {
            Some(directory) => self.load_headers(directory),
            None => Ok(0),
        }
    }

    /// Register a header directly. Returns `false` if its file is already known.
    pub fn add_header(&self, header: GridHeader) -> bool {
        let mut headers = self.headers.write();
        if headers.iter().any(|h| h.filename == header.filename) {
            return false;
        }
        headers.push(header);
        true
    }

    fn is_known(&self, path: &Path) -> bool {
        self.headers.read().iter().any(|h| h.filename == path)
    }

    /// Header of the first grid covering both corners of `bbox`.
    pub fn header_for(&self, bbox: &BoundingBox) -> Option<GridHeader> {
        self.headers.read().iter().find(|h| h.covers(bbox)).cloned()
    }

    /// Loaded grid covering `bbox`, reading it on first use.
    ///
    /// Grids already in memory are checked first, so where grids overlap a
    /// loaded one wins over an earlier header that is not loaded.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(tile))` - a grid covers both corners of the box
    /// - `Ok(None)` - no indexed grid covers the box
    /// - `Err(...)` - the covering grid could not be read
    pub fn get(&self, bbox: &BoundingBox) -> Result<Option<Arc<HeightTile>>> {
        if let Some(tile) = self.loaded_covering(bbox) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(tile));
        }
        match self.header_for(bbox) {
            Some(header) => self.load(&header).map(Some),
            None => Ok(None),
        }
    }

    fn loaded_covering(&self, bbox: &BoundingBox) -> Option<Arc<HeightTile>> {
        self.tile_cache
            .iter()
            .find(|(_, tile)| tile.header().covers(bbox))
            .map(|(_, tile)| tile)
    }

    /// Elevation at `(lon, lat)`, or `None` without coverage or on no-data.
    pub fn elevation_at(&self, lon: f64, lat: f64) -> Result<Option<i16>> {
        let point = BoundingBox::new(lat, lon, lat, lon);
        match self.get(&point)? {
            Some(tile) => Ok(tile.elevation_at(lon, lat)),
            None => Ok(None),
        }
    }

    /// Load a grid from cache or disk.
    fn load(&self, header: &GridHeader) -> Result<Arc<HeightTile>> {
        if let Some(tile) = self.tile_cache.get(&header.filename) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(tile);
        }

        let _guard = self.load_lock.lock();

        // Another caller may have loaded it while we waited for the lock.
        if let Some(tile) = self.tile_cache.get(&header.filename) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(tile);
        }
        self.miss_count.fetch_add(1, Ordering::Relaxed);

        let start = Instant::now();
        let tile = Arc::new(self.source.read_tile(&header.filename)?);
        self.load_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            path = %header.filename.display(),
            columns = tile.columns(),
            rows = tile.rows(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Grid loaded"
        );

        self.tile_cache.insert(header.filename.clone(), tile.clone());
        Ok(tile)
    }

    /// Load grids into the cache ahead of use.
    ///
    /// # Arguments
    ///
    /// * `bounds` - Optional slice of bounding boxes to filter grids. If `None`,
    ///   every indexed grid is loaded. If `Some`, only grids that overlap at
    ///   least one bounding box are loaded.
    pub fn preload(&self, bounds: Option<&[BoundingBox]>) -> PreloadStats {
        let start = Instant::now();
        let mut stats = PreloadStats::default();

        for header in self.headers() {
            if let Some(boxes) = bounds {
                let extent = header.bounds();
                if !boxes.iter().any(|b| b.intersects(&extent)) {
                    continue;
                }
            }

            stats.tiles_matched += 1;

            if self.tile_cache.contains_key(&header.filename) {
                stats.tiles_already_cached += 1;
                continue;
            }

            match self.load(&header) {
                Ok(_) => stats.tiles_loaded += 1,
                Err(e) => {
                    tracing::warn!(path = %header.filename.display(), error = %e, "Preload failed");
                    stats.tiles_failed += 1;
                }
            }
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        stats
    }

    /// Snapshot of all known headers.
    pub fn headers(&self) -> Vec<GridHeader> {
        self.headers.read().clone()
    }

    pub fn header_count(&self) -> usize {
        self.headers.read().len()
    }

    /// Directory of the last header scan.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data_dir.read().clone()
    }

    /// Check whether the grid read from `path` is currently loaded.
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.tile_cache.contains_key(path)
    }

    /// Get the maximum cache size.
    pub fn cache_capacity(&self) -> u64 {
        self.tile_cache.policy().max_capacity().unwrap_or(0)
    }

    /// Drop every loaded grid. Headers are kept.
    pub fn clear_cache(&self) {
        self.tile_cache.invalidate_all();
    }

    pub fn stats(&self) -> IndexStats {
        self.tile_cache.run_pending_tasks();
        IndexStats {
            header_count: self.header_count(),
            loaded_count: self.tile_cache.entry_count(),
            cache_capacity: self.cache_capacity(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            load_count: self.load_count.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for TileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileIndex")
            .field("data_dir", &*self.data_dir.read())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Check whether `path` has a grid file extension.
pub fn is_grid_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| {
            GRID_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// List the grid files in `directory`, sorted by path.
///
/// # Errors
///
/// Returns [`ReliefError::DataDirNotFound`] if `directory` is not a directory.
pub fn scan_grid_files(directory: &Path) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(ReliefError::DataDirNotFound {
            path: directory.to_path_buf(),
        });
    }

    let mut files: Vec<PathBuf> = fs::read_dir(directory)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_grid_file(path))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// In-memory grid source that counts tile loads.
    ///
    /// Every grid is flat at 100 m. Paths containing "broken" fail to load and
    /// paths containing "panics" panic while loading.
    pub(crate) struct CountingSource {
        headers: HashMap<PathBuf, GridHeader>,
        loads: AtomicUsize,
        delay: Duration,
    }

    impl CountingSource {
        /// One 4×4 grid of 1° cells per `(name, lon, lat)` entry.
        pub(crate) fn new(grids: &[(&str, f64, f64)], delay: Duration) -> Self {
            let headers = grids
                .iter()
                .map(|&(name, lon, lat)| {
                    let header = GridHeader {
                        filename: PathBuf::from(name),
                        columns: 4,
                        rows: 4,
                        lower_left_x: lon,
                        lower_left_y: lat,
                        cell_size: 1.0,
                        no_data: None,
                    };
                    (header.filename.clone(), header)
                })
                .collect();
            Self {
                headers,
                loads: AtomicUsize::new(0),
                delay,
            }
        }

        pub(crate) fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }

        pub(crate) fn headers(&self) -> Vec<GridHeader> {
            let mut headers: Vec<GridHeader> = self.headers.values().cloned().collect();
            headers.sort_by(|a, b| a.filename.cmp(&b.filename));
            headers
        }
    }

    impl GridSource for CountingSource {
        fn read_header(&self, path: &Path) -> Result<GridHeader> {
            self.headers.get(path).cloned().ok_or_else(|| {
                ReliefError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    path.display().to_string(),
                ))
            })
        }

        fn read_tile(&self, path: &Path) -> Result<HeightTile> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            if path.to_string_lossy().contains("panics") {
                panic!("unreadable grid {}", path.display());
            }
            if path.to_string_lossy().contains("broken") {
                return Err(ReliefError::TruncatedBody {
                    expected: 16,
                    found: 3,
                });
            }
            let header = self.read_header(path)?;
            HeightTile::new(header, vec![100; 16])
        }
    }

    /// Index over a [`CountingSource`] with every header registered.
    pub(crate) fn counting_index(
        grids: &[(&str, f64, f64)],
        delay: Duration,
    ) -> (Arc<TileIndex>, Arc<CountingSource>) {
        let source = Arc::new(CountingSource::new(grids, delay));
        let index = Arc::new(TileIndex::with_source(source.clone(), DEFAULT_CACHE_SIZE));
        for header in source.headers() {
            index.add_header(header);
        }
        (index, source)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::counting_index;
    use super::*;
    use crossbeam_channel::{Receiver, Sender};
    use std::time::Duration;
    use tempfile::TempDir;

    fn write_grid_file(dir: &Path, name: &str, lon: f64, lat: f64, value: i16) -> PathBuf {
        let path = dir.join(name);
        let mut text = format!(
            "ncols 4\nnrows 4\nxllcorner {}\nyllcorner {}\ncellsize 0.25\n",
            lon, lat
        );
        for _ in 0..4 {
            text.push_str(&format!("{v} {v} {v} {v}\n", v = value));
        }
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_load_headers_and_get() {
        let temp_dir = TempDir::new().unwrap();
        write_grid_file(temp_dir.path(), "a.asc", 7.0, 46.0, 500);
        write_grid_file(temp_dir.path(), "b.GRD", 8.0, 46.0, 900);
        fs::write(temp_dir.path().join("readme.txt"), "not a grid").unwrap();

        let index = TileIndex::new(10);
        assert_eq!(index.load_headers(temp_dir.path()).unwrap(), 2);
        assert_eq!(index.header_count(), 2);

        let bbox = BoundingBox::new(46.1, 8.1, 46.2, 8.2);
        let header = index.header_for(&bbox).unwrap();
        assert!(header.filename.ends_with("b.GRD"));

        let tile = index.get(&bbox).unwrap().unwrap();
        assert_eq!(tile.max(), Some(900));
        assert!(index.is_loaded(tile.filename()));
    }

    #[test]
    fn test_no_coverage_is_none() {
        let temp_dir = TempDir::new().unwrap();
        write_grid_file(temp_dir.path(), "a.asc", 7.0, 46.0, 500);

        let index = TileIndex::new(10);
        index.load_headers(temp_dir.path()).unwrap();

        let outside = BoundingBox::new(10.0, 10.0, 10.5, 10.5);
        assert!(index.get(&outside).unwrap().is_none());

        // Straddling the eastern edge: only one corner is covered
        let straddling = BoundingBox::new(46.1, 7.9, 46.2, 8.1);
        assert!(index.get(&straddling).unwrap().is_none());

        assert_eq!(index.elevation_at(7.5, 46.5).unwrap(), Some(500));
        assert_eq!(index.elevation_at(0.0, 0.0).unwrap(), None);
    }

    #[test]
    fn test_cache_hit() {
        let temp_dir = TempDir::new().unwrap();
        write_grid_file(temp_dir.path(), "a.asc", 7.0, 46.0, 500);

        let index = TileIndex::new(10);
        index.load_headers(temp_dir.path()).unwrap();
        let bbox = BoundingBox::new(46.1, 7.1, 46.2, 7.2);

        let first = index.get(&bbox).unwrap().unwrap();
        let second = index.get(&bbox).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = index.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.load_count, 1);
        assert_eq!(stats.loaded_count, 1);
        assert_eq!(stats.cache_capacity, 10);
        assert_eq!(stats.hit_rate(), 0.5);

        index.clear_cache();
        assert!(!index.is_loaded(first.filename()));
        assert_eq!(index.header_count(), 1);
    }

    #[test]
    fn test_unreadable_header_skipped() {
        let temp_dir = TempDir::new().unwrap();
        write_grid_file(temp_dir.path(), "good.asc", 7.0, 46.0, 500);
        fs::write(temp_dir.path().join("bad.asc"), "ncols four\n").unwrap();

        let index = TileIndex::new(10);
        assert_eq!(index.load_headers(temp_dir.path()).unwrap(), 1);
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let index = TileIndex::new(10);
        let result = index.load_headers(temp_dir.path().join("missing"));
        assert!(matches!(result, Err(ReliefError::DataDirNotFound { .. })));
    }

    #[test]
    fn test_rescan_picks_up_new_files() {
        let temp_dir = TempDir::new().unwrap();
        write_grid_file(temp_dir.path(), "a.asc", 7.0, 46.0, 500);

        let index = TileIndex::new(10);
        assert_eq!(index.rescan().unwrap(), 0);
        assert_eq!(index.load_headers(temp_dir.path()).unwrap(), 1);

        write_grid_file(temp_dir.path(), "b.asc", 8.0, 46.0, 900);
        assert_eq!(index.rescan().unwrap(), 1);
        assert_eq!(index.rescan().unwrap(), 0);
        assert_eq!(index.header_count(), 2);
    }

    #[test]
    fn test_spawn_header_scan() {
        let temp_dir = TempDir::new().unwrap();
        write_grid_file(temp_dir.path(), "a.asc", 7.0, 46.0, 500);
        write_grid_file(temp_dir.path(), "b.asc", 8.0, 46.0, 900);

        let index = Arc::new(TileIndex::new(10));
        let handle = index.spawn_header_scan(temp_dir.path()).unwrap();
        assert_eq!(handle.thread().name(), Some("relief-header-scan"));
        assert_eq!(handle.join().unwrap().unwrap(), 2);
        assert_eq!(index.data_dir().as_deref(), Some(temp_dir.path()));
    }

    /// Reads real files, but holds back the header of `b.asc` until released.
    struct GatedSource {
        reader: AsciiGridReader,
        reached: Sender<()>,
        release: Receiver<()>,
    }

    impl GridSource for GatedSource {
        fn read_header(&self, path: &Path) -> Result<GridHeader> {
            if path.ends_with("b.asc") {
                self.reached.send(()).unwrap();
                self.release.recv().unwrap();
            }
            self.reader.read_header(path)
        }

        fn read_tile(&self, path: &Path) -> Result<HeightTile> {
            self.reader.read_tile(path)
        }
    }

    #[test]
    fn test_queries_during_header_scan() {
        let temp_dir = TempDir::new().unwrap();
        write_grid_file(temp_dir.path(), "a.asc", 7.0, 46.0, 500);
        write_grid_file(temp_dir.path(), "b.asc", 8.0, 46.0, 900);

        let (reached_tx, reached_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded(1);
        let source = Arc::new(GatedSource {
            reader: AsciiGridReader::new(),
            reached: reached_tx,
            release: release_rx,
        });
        let index = Arc::new(TileIndex::with_source(source, 10));
        let handle = index.spawn_header_scan(temp_dir.path()).unwrap();

        // The scan holds at b.asc; a.asc is already indexed
        reached_rx.recv_timeout(Duration::from_secs(10)).unwrap();
        let in_a = BoundingBox::new(46.1, 7.1, 46.2, 7.2);
        let in_b = BoundingBox::new(46.1, 8.1, 46.2, 8.2);
        assert_eq!(index.header_count(), 1);
        assert_eq!(index.get(&in_a).unwrap().unwrap().max(), Some(500));
        assert!(index.get(&in_b).unwrap().is_none());

        release_tx.send(()).unwrap();
        assert_eq!(handle.join().unwrap().unwrap(), 2);
        assert_eq!(index.get(&in_b).unwrap().unwrap().max(), Some(900));
    }

    #[test]
    fn test_loaded_grid_wins_over_earlier_header() {
        let (index, source) = counting_index(
            &[("a.asc", 0.0, 0.0), ("b.asc", 2.0, 0.0)],
            Duration::ZERO,
        );

        // Only b.asc covers this box
        let only_b = BoundingBox::new(1.0, 5.0, 2.0, 5.5);
        let b = index.get(&only_b).unwrap().unwrap();
        assert!(b.filename().ends_with("b.asc"));

        // Both cover the overlap; a.asc is the first header but b.asc is loaded
        let overlap = BoundingBox::new(1.0, 2.5, 2.0, 3.5);
        assert!(index.header_for(&overlap).unwrap().filename.ends_with("a.asc"));
        let tile = index.get(&overlap).unwrap().unwrap();
        assert!(Arc::ptr_eq(&tile, &b));
        assert_eq!(source.loads(), 1);
        assert_eq!(index.stats().hit_count, 1);
    }

    #[test]
    fn test_preload() {
        let (index, source) = counting_index(
            &[("a.asc", 0.0, 0.0), ("b.asc", 10.0, 0.0), ("broken.asc", 20.0, 0.0)],
            Duration::ZERO,
        );

        let stats = index.preload(Some(&[BoundingBox::new(1.0, 1.0, 2.0, 2.0)]));
        assert_eq!(stats.tiles_matched, 1);
        assert_eq!(stats.tiles_loaded, 1);

        let stats = index.preload(None);
        assert_eq!(stats.tiles_matched, 3);
        assert_eq!(stats.tiles_already_cached, 1);
        assert_eq!(stats.tiles_loaded, 1);
        assert_eq!(stats.tiles_failed, 1);
        assert_eq!(source.loads(), 3);
    }

    #[test]
    fn test_load_error_propagates() {
        let (index, _source) = counting_index(&[("broken.asc", 0.0, 0.0)], Duration::ZERO);
        let bbox = BoundingBox::new(1.0, 1.0, 2.0, 2.0);
        assert!(matches!(
            index.get(&bbox),
            Err(ReliefError::TruncatedBody { .. })
        ));
    }

    #[test]
    fn test_concurrent_gets_load_each_file_once() {
        let grids = [("a.asc", 0.0, 0.0), ("b.asc", 4.0, 0.0), ("c.asc", 8.0, 0.0)];
        let (index, source) = counting_index(&grids, Duration::from_millis(20));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let index = Arc::clone(&index);
                thread::spawn(move || {
                    for i in 0..9 {
                        let lon = ((i + t) % 3) as f64 * 4.0 + 1.0;
                        let bbox = BoundingBox::new(1.0, lon, 2.0, lon + 1.0);
                        assert!(index.get(&bbox).unwrap().is_some());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(source.loads(), grids.len());
        assert_eq!(index.stats().load_count, grids.len() as u64);
    }

    #[test]
    fn test_is_grid_file() {
        assert!(is_grid_file(Path::new("/data/n46_e007.asc")));
        assert!(is_grid_file(Path::new("DEM.ASC")));
        assert!(is_grid_file(Path::new("dem.grd")));
        assert!(!is_grid_file(Path::new("dem.asc.zip")));
        assert!(!is_grid_file(Path::new("asc")));
    }
}
