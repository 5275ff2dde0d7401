//! In-memory elevation grids.
//!
//! A [`HeightTile`] owns the samples of one parsed grid file together with its
//! [`GridHeader`], and answers coordinate lookups against it.

use std::path::Path;

use crate::error::{ReliefError, Result};
use crate::grid::GridHeader;
use crate::tiles::BoundingBox;

/// One grid file loaded into memory.
///
/// Samples are stored row-major: index `row * columns + col`, where row 0 is
/// the northern edge and column 0 the western edge.
#[derive(Debug, Clone)]
pub struct HeightTile {
    header: GridHeader,
    values: Vec<i16>,
    /// Lowest sample that is not the no-data sentinel.
    min: Option<i16>,
    /// Highest sample that is not the no-data sentinel.
    max: Option<i16>,
}

impl HeightTile {
    /// Create a tile from a header and its samples.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::TruncatedBody`] if `values` does not hold exactly
    /// `columns × rows` samples.
    pub fn new(header: GridHeader, values: Vec<i16>) -> Result<Self> {
        let expected = header.sample_count();
        if values.len() != expected {
            return Err(ReliefError::TruncatedBody {
                expected,
                found: values.len(),
            });
        }

        let mut valid = values
            .iter()
            .copied()
            .filter(|&v| Some(v) != header.no_data)
            .peekable();
        let (min, max) = match valid.peek() {
            None => (None, None),
            Some(&first) => {
                let (lo, hi) = valid.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
                (Some(lo), Some(hi))
            }
        };

        Ok(Self {
            header,
            values,
            min,
            max,
        })
    }

    /// Returns the header this tile was read with.
    pub fn header(&self) -> &GridHeader {
        &self.header
    }

    /// Returns the path of the source file.
    pub fn filename(&self) -> &Path {
        &self.header.filename
    }

    /// Returns the number of columns.
    pub fn columns(&self) -> usize {
        self.header.columns
    }

    /// Returns the number of rows.
    pub fn rows(&self) -> usize {
        self.header.rows
    }

    /// Returns all samples in row-major order.
    pub fn values(&self) -> &[i16] {
        &self.values
    }

    /// Returns the no-data sentinel, if the file declared one.
    pub fn no_data(&self) -> Option<i16> {
        self.header.no_data
    }

    /// Check whether `value` is the no-data sentinel.
    pub fn is_no_data(&self, value: i16) -> bool {
        self.header.no_data == Some(value)
    }

    /// Number of samples holding the no-data sentinel.
    pub fn no_data_count(&self) -> usize {
        match self.header.no_data {
            Some(sentinel) => self.values.iter().filter(|&&v| v == sentinel).count(),
            None => 0,
        }
    }

    /// Sample at `(col, row)`.
    ///
    /// # Panics
    ///
    /// Panics if the position is outside the grid.
    pub fn value(&self, col: usize, row: usize) -> i16 {
        assert!(col < self.columns() && row < self.rows());
        self.values[row * self.columns() + col]
    }

    /// Sample at `(col, row)`, or `None` outside the grid.
    pub fn get(&self, col: usize, row: usize) -> Option<i16> {
        if col < self.columns() && row < self.rows() {
            Some(self.values[row * self.columns() + col])
        } else {
            None
        }
    }

    /// Lowest elevation, ignoring no-data samples.
    pub fn min(&self) -> Option<i16> {
        self.min
    }

    /// Highest elevation, ignoring no-data samples.
    pub fn max(&self) -> Option<i16> {
        self.max
    }

    /// Sample at `(col, row)` divided by the tile maximum.
    ///
    /// Values lie in `[0, 1]` for non-negative terrain and go below 0 for
    /// elevations under sea level. Returns 0.0 when the maximum is not positive.
    pub fn normalized(&self, col: usize, row: usize) -> f64 {
        match self.max {
            Some(max) if max > 0 => f64::from(self.value(col, row)) / f64::from(max),
            _ => 0.0,
        }
    }

    /// Western edge in degrees.
    pub fn lower_left_x(&self) -> f64 {
        self.header.lower_left_x
    }

    /// Southern edge in degrees.
    pub fn lower_left_y(&self) -> f64 {
        self.header.lower_left_y
    }

    /// Eastern edge in degrees.
    pub fn upper_right_x(&self) -> f64 {
        self.header.upper_right_x()
    }

    /// Northern edge in degrees.
    pub fn upper_right_y(&self) -> f64 {
        self.header.upper_right_y()
    }

    /// Check whether the point lies inside the tile (half-open box).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.header.contains(x, y)
    }

    /// Check whether both corners of `bbox` lie inside the tile.
    pub fn covers(&self, bbox: &BoundingBox) -> bool {
        self.header.covers(bbox)
    }

    /// Grid position `(col, row)` of the sample nearest to `(lon, lat)`.
    ///
    /// Coordinates outside the tile are clamped to the closest edge sample.
    pub fn nearest_sample(&self, lon: f64, lat: f64) -> (usize, usize) {
        let columns = self.columns();
        let rows = self.rows();

        let fx = (lon - self.lower_left_x()) / (self.upper_right_x() - self.lower_left_x());
        let fy = (lat - self.lower_left_y()) / (self.upper_right_y() - self.lower_left_y());

        let col = clamp_index(fx * columns as f64, columns);
        // Rows are stored north to south, latitude grows northwards.
        let j = clamp_index(fy * rows as f64, rows);

        (col, rows - 1 - j)
    }

    /// Grid position `(col, row)` of `(lon, lat)`, or `None` outside the tile.
    pub fn sample_index(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        if self.contains(lon, lat) {
            Some(self.nearest_sample(lon, lat))
        } else {
            None
        }
    }

    /// Elevation at `(lon, lat)`.
    ///
    /// Returns `None` outside the tile or where the sample is no-data.
    pub fn elevation_at(&self, lon: f64, lat: f64) -> Option<i16> {
        let (col, row) = self.sample_index(lon, lat)?;
        let value = self.value(col, row);
        if self.is_no_data(value) {
            None
        } else {
            Some(value)
        }
    }
}

fn clamp_index(position: f64, len: usize) -> usize {
    if position.is_nan() || position < 0.0 {
        0
    } else {
        (position.floor() as usize).min(len - 1)
    }
}
