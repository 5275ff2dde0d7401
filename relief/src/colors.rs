//! Elevation to color mapping with height-indexed memoization.
//!
//! [`ElevationColorMapping`] places sea level on a gradient and scales
//! elevations above it up to a configured maximum:
//!
//! ```text
//! |------------------------------------------|
//! 0    (= sea level offset)                 1.0
//! |----|-------------------------------------|
//!      0 m                          max height
//! ```
//!
//! [`ElevationColorCache`] wraps any [`HeightColors`] implementation and
//! remembers every color it has computed until the mapping is edited.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::gradient::{Color, ElevationGradient, GradientPreset};

/// Default elevation mapped to the top of the gradient, in meters.
pub const DEFAULT_MAX_HEIGHT: i32 = 3000;

/// Largest accepted maximum height, in meters.
pub const MAX_HEIGHT_LIMIT: i32 = 9000;

/// Anything that assigns a color to an integer elevation.
pub trait HeightColors: Send + Sync {
    fn color(&self, height: i32) -> Color;
}

/// Maps elevations in meters onto an [`ElevationGradient`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElevationColorMapping {
    gradient: ElevationGradient,
    max_height: i32,
    sea_level_offset: f64,
}

impl ElevationColorMapping {
    /// Create a mapping with the default maximum height.
    pub fn new(gradient: ElevationGradient, sea_level_offset: f64) -> Self {
        let mut mapping = Self {
            gradient,
            max_height: DEFAULT_MAX_HEIGHT,
            sea_level_offset: 0.0,
        };
        mapping.set_sea_level_offset(sea_level_offset);
        mapping
    }

    /// Create a mapping from one of the built-in gradients.
    pub fn from_preset(preset: GradientPreset) -> Self {
        Self::new(preset.gradient(), preset.sea_level_offset())
    }

    /// Set the maximum height (builder style).
    pub fn with_max_height(mut self, max_height: i32) -> Self {
        self.set_max_height(max_height);
        self
    }

    pub fn gradient(&self) -> &ElevationGradient {
        &self.gradient
    }

    pub fn gradient_mut(&mut self) -> &mut ElevationGradient {
        &mut self.gradient
    }

    pub fn max_height(&self) -> i32 {
        self.max_height
    }

    /// Set the elevation drawn with the last gradient color.
    ///
    /// Clamped to `1..=9000`.
    pub fn set_max_height(&mut self, max_height: i32) {
        self.max_height = max_height.clamp(1, MAX_HEIGHT_LIMIT);
    }

    pub fn sea_level_offset(&self) -> f64 {
        self.sea_level_offset
    }

    /// Set the gradient offset of elevation 0. Clamped to `[0, 1]`.
    pub fn set_sea_level_offset(&mut self, offset: f64) {
        self.sea_level_offset = if offset.is_nan() {
            0.0
        } else {
            offset.clamp(0.0, 1.0)
        };
    }

    /// Gradient offset of `height`, clamped to `[0, 1]`.
    pub fn offset(&self, height: i32) -> f64 {
        let s = self.sea_level_offset;
        let x = f64::from(height) * (1.0 - s) / f64::from(self.max_height) + s;
        x.clamp(0.0, 1.0)
    }
}

impl Default for ElevationColorMapping {
    fn default() -> Self {
        Self::from_preset(GradientPreset::default())
    }
}

impl HeightColors for ElevationColorMapping {
    fn color(&self, height: i32) -> Color {
        self.gradient.sample(self.offset(height))
    }
}

impl fmt::Display for ElevationColorMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "points =")?;
        for point in self.gradient.points() {
            writeln!(f, "    {} @ {}", point.color(), point.offset())?;
        }
        writeln!(f, "sea_level_offset = {}", self.sea_level_offset)?;
        write!(f, "max_height = {}", self.max_height)
    }
}

/// Memoization statistics for an [`ElevationColorCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorCacheStats {
    /// Distinct heights currently memoized.
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Thread-safe memo table in front of a [`HeightColors`] source.
///
/// The first lookup of a height computes and stores its color; later lookups
/// are plain reads. Editing the source through [`update`](Self::update) clears
/// the table.
pub struct ElevationColorCache<S: HeightColors = ElevationColorMapping> {
    source: RwLock<S>,
    memo: RwLock<HashMap<i32, Color>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<S: HeightColors> ElevationColorCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: RwLock::new(source),
            memo: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Color of `height`.
    pub fn color(&self, height: i32) -> Color {
        if let Some(&color) = self.memo.read().get(&height) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return color;
        }

        // Holding the source read lock keeps `update` from clearing the memo
        // between computing and inserting.
        let source = self.source.read();
        let mut memo = self.memo.write();
        if let Some(&color) = memo.get(&height) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return color;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let color = source.color(height);
        memo.insert(height, color);
        color
    }

    /// Apply a batch of edits to the source and drop every memoized color.
    pub fn update<R>(&self, edit: impl FnOnce(&mut S) -> R) -> R {
        let mut source = self.source.write();
        let result = edit(&mut source);
        self.memo.write().clear();
        tracing::debug!("Color mapping updated, memo table cleared");
        result
    }

    /// Run `f` against the current source without invalidating anything.
    pub fn with_source<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.source.read())
    }

    /// Number of memoized heights.
    pub fn len(&self) -> usize {
        self.memo.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.read().is_empty()
    }

    pub fn stats(&self) -> ColorCacheStats {
        ColorCacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl<S: HeightColors + Default> Default for ElevationColorCache<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S: HeightColors> HeightColors for ElevationColorCache<S> {
    fn color(&self, height: i32) -> Color {
        ElevationColorCache::color(self, height)
    }
}

impl<S: HeightColors> fmt::Debug for ElevationColorCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElevationColorCache")
            .field("stats", &self.stats())
            .finish()
    }
}
