//! ArcInfo ASCII Grid parsing.
//!
//! This module provides [`AsciiGridReader`] for reading `.asc` elevation grids
//! into a [`HeightTile`], and [`write_grid`] for writing one back out.
//!
//! # File Format
//!
//! ```text
//! ncols 157
//! nrows 171
//! xllcorner -156.08749650000
//! yllcorner 18.870890200000
//! cellsize 0.00833300
//! NODATA_value -9999
//! 0 0 1 1 1 2 3 3 5 6 8 9 12 14 18 21 25 30 35 41 47 53
//! 59 66 73 79 86 92 97 102 106 109 112 113 113 113 111 109 106
//! ...
//! ```
//!
//! - The five header lines are required and must appear in this order. Field
//!   names are matched case-insensitively.
//! - `NODATA_value` is optional.
//! - Values follow in row-major order, column varying fastest. Row 0 is the
//!   northern edge of the grid.
//! - Numbers always use `.` as the decimal separator.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ReliefError, Result};
use crate::height::HeightTile;
use crate::tiles::BoundingBox;

/// Default read buffer size for grid bodies.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

const NODATA_FIELD: &str = "NODATA_value";

/// Largest sample count whose `i16` buffer can be addressed.
const MAX_SAMPLES: usize = isize::MAX as usize / std::mem::size_of::<i16>();

/// Samples reserved up front; larger bodies grow as values arrive.
const INITIAL_SAMPLE_CAPACITY: usize = 1 << 20;

/// Header of an ArcInfo ASCII Grid file.
#[derive(Debug, Clone, PartialEq)]
pub struct GridHeader {
    /// Path of the file the header was read from.
    pub filename: PathBuf,
    /// Number of columns (`ncols`).
    pub columns: usize,
    /// Number of rows (`nrows`).
    pub rows: usize,
    /// Western edge in degrees (`xllcorner`).
    pub lower_left_x: f64,
    /// Southern edge in degrees (`yllcorner`).
    pub lower_left_y: f64,
    /// Size of one cell in degrees (`cellsize`).
    pub cell_size: f64,
    /// Sentinel meaning "no measurement" (`NODATA_value`).
    pub no_data: Option<i16>,
}

impl GridHeader {
    /// Eastern edge in degrees.
    pub fn upper_right_x(&self) -> f64 {
        self.lower_left_x + self.cell_size * self.columns as f64
    }

    /// Northern edge in degrees.
    pub fn upper_right_y(&self) -> f64 {
        self.lower_left_y + self.cell_size * self.rows as f64
    }

    /// Geographic extent of the grid.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(
            self.lower_left_y,
            self.lower_left_x,
            self.upper_right_y(),
            self.upper_right_x(),
        )
    }

    /// Check whether the point lies inside the half-open box
    /// `[lower_left_x, upper_right_x) × [lower_left_y, upper_right_y)`.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.lower_left_x <= x && x < self.upper_right_x())
            && (self.lower_left_y <= y && y < self.upper_right_y())
    }

    /// Check whether both corners of `bbox` lie inside the grid.
    pub fn covers(&self, bbox: &BoundingBox) -> bool {
        self.contains(bbox.min_lon, bbox.min_lat) && self.contains(bbox.max_lon, bbox.max_lat)
    }

    /// Total number of samples (`columns × rows`), saturating at `usize::MAX`.
    pub fn sample_count(&self) -> usize {
        self.columns.saturating_mul(self.rows)
    }
}

/// Callback receiving the percentage (0–100) of grid rows read so far.
pub type ReadProgress = Arc<dyn Fn(u8) + Send + Sync>;

/// Anything that can produce grid headers and tiles from a path.
///
/// [`crate::TileIndex`] reads all of its data through this trait, so loading
/// can be observed or replaced.
pub trait GridSource: Send + Sync {
    /// Read only the header of the grid at `path`.
    fn read_header(&self, path: &Path) -> Result<GridHeader>;

    /// Read the full grid at `path`.
    fn read_tile(&self, path: &Path) -> Result<HeightTile>;
}

/// Reader for ArcInfo ASCII Grid files.
///
/// # Example
///
/// ```ignore
/// use relief::AsciiGridReader;
///
/// let reader = AsciiGridReader::new();
/// let header = reader.read_header("dem/N46E007.asc")?;
/// let tile = reader.read_tile("dem/N46E007.asc")?;
/// assert_eq!(tile.header(), &header);
/// ```
#[derive(Clone)]
pub struct AsciiGridReader {
    buffer_size: usize,
    progress: Option<ReadProgress>,
}

impl Default for AsciiGridReader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AsciiGridReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsciiGridReader")
            .field("buffer_size", &self.buffer_size)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl AsciiGridReader {
    /// Create a reader with the default buffer size and no progress reporting.
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            progress: None,
        }
    }

    /// Set the size of the buffer the body is streamed through.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Report read progress (percentage of rows consumed) to `progress`.
    pub fn with_progress(mut self, progress: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Read only the header of a grid file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or a header line is
    /// malformed.
    pub fn read_header<P: AsRef<Path>>(&self, path: P) -> Result<GridHeader> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let (header, _) = parse_header(&mut reader, path)?;
        Ok(header)
    }

    /// Read a grid file into a [`HeightTile`].
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened or read
    /// - A header line is malformed
    /// - A value is not an integer in the `i16` range
    /// - The body holds fewer than `columns × rows` values
    pub fn read_tile<P: AsRef<Path>>(&self, path: P) -> Result<HeightTile> {
        let path = path.as_ref();
        let reader = BufReader::with_capacity(self.buffer_size, File::open(path)?);
        self.parse(reader, path)
    }

    /// Parse a grid from any buffered reader.
    ///
    /// `filename` is only recorded in the resulting header.
    pub fn parse<R: BufRead>(&self, mut reader: R, filename: &Path) -> Result<HeightTile> {
        let (header, first_body_line) = parse_header(&mut reader, filename)?;

        let mut body = BodyParser::new(&header, self.progress.as_deref());
        if let Some(line) = first_body_line {
            body.feed(line.as_bytes())?;
        }

        loop {
            let chunk = reader.fill_buf()?;
            if chunk.is_empty() {
                break;
            }
            let len = chunk.len();
            body.feed(chunk)?;
            reader.consume(len);
        }

        let values = body.finish()?;
        HeightTile::new(header, values)
    }
}

impl GridSource for AsciiGridReader {
    fn read_header(&self, path: &Path) -> Result<GridHeader> {
        AsciiGridReader::read_header(self, path)
    }

    fn read_tile(&self, path: &Path) -> Result<HeightTile> {
        AsciiGridReader::read_tile(self, path)
    }
}

/// Read a grid header with a default [`AsciiGridReader`].
pub fn read_header<P: AsRef<Path>>(path: P) -> Result<GridHeader> {
    AsciiGridReader::new().read_header(path)
}

/// Read a grid file with a default [`AsciiGridReader`].
pub fn read_tile<P: AsRef<Path>>(path: P) -> Result<HeightTile> {
    AsciiGridReader::new().read_tile(path)
}

/// Write a tile in canonical ASCII Grid form, one grid row per line.
pub fn write_grid<W: Write>(tile: &HeightTile, mut writer: W) -> Result<()> {
    let header = tile.header();
    writeln!(writer, "ncols {}", header.columns)?;
    writeln!(writer, "nrows {}", header.rows)?;
    writeln!(writer, "xllcorner {}", header.lower_left_x)?;
    writeln!(writer, "yllcorner {}", header.lower_left_y)?;
    writeln!(writer, "cellsize {}", header.cell_size)?;
    if let Some(no_data) = header.no_data {
        writeln!(writer, "{} {}", NODATA_FIELD, no_data)?;
    }

    let mut line = String::new();
    for row in tile.values().chunks(header.columns) {
        line.clear();
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                line.push(' ');
            }
            line.push_str(&value.to_string());
        }
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}

/// Parse the five required header lines and the optional `NODATA_value` line.
///
/// If the sixth line is not a `NODATA_value` line it already belongs to the
/// body and is returned as well.
fn parse_header<R: BufRead>(
    reader: &mut R,
    filename: &Path,
) -> Result<(GridHeader, Option<String>)> {
    let mut line = String::new();

    let columns: usize = parse_field(reader, &mut line, 1, "ncols")?;
    let rows: usize = parse_field(reader, &mut line, 2, "nrows")?;
    let lower_left_x: f64 = parse_field(reader, &mut line, 3, "xllcorner")?;
    let lower_left_y: f64 = parse_field(reader, &mut line, 4, "yllcorner")?;
    let cell_size: f64 = parse_field(reader, &mut line, 5, "cellsize")?;

    if columns == 0 {
        return Err(ReliefError::parse(1, "ncols must be greater than 0"));
    }
    if rows == 0 {
        return Err(ReliefError::parse(2, "nrows must be greater than 0"));
    }
    if columns.checked_mul(rows).map_or(true, |n| n > MAX_SAMPLES) {
        return Err(ReliefError::parse(
            2,
            format!("{} × {} samples exceed the addressable size", columns, rows),
        ));
    }
    if !lower_left_x.is_finite() {
        return Err(ReliefError::parse(3, "xllcorner must be finite"));
    }
    if !lower_left_y.is_finite() {
        return Err(ReliefError::parse(4, "yllcorner must be finite"));
    }
    if !(cell_size.is_finite() && cell_size > 0.0) {
        return Err(ReliefError::parse(5, "cellsize must be greater than 0"));
    }

    line.clear();
    let mut no_data = None;
    let mut first_body_line = None;
    if reader.read_line(&mut line)? > 0 {
        let is_no_data = line
            .split_whitespace()
            .next()
            .map_or(false, |name| name.eq_ignore_ascii_case(NODATA_FIELD));
        if is_no_data {
            let value = header_value(&line, 6, NODATA_FIELD)?;
            no_data = Some(parse_sample(value.as_bytes()).ok_or_else(|| {
                ReliefError::parse(6, format!("{} is not an i16: {}", NODATA_FIELD, value))
            })?);
        } else {
            first_body_line = Some(std::mem::take(&mut line));
        }
    }

    let header = GridHeader {
        filename: filename.to_path_buf(),
        columns,
        rows,
        lower_left_x,
        lower_left_y,
        cell_size,
        no_data,
    };
    Ok((header, first_body_line))
}

fn parse_field<R: BufRead, T: FromStr>(
    reader: &mut R,
    line: &mut String,
    line_no: usize,
    expected: &str,
) -> Result<T> {
    line.clear();
    if reader.read_line(line)? == 0 {
        return Err(ReliefError::parse(
            line_no,
            format!("expected {}, found end of file", expected),
        ));
    }
    let value = header_value(line, line_no, expected)?;
    value.parse().map_err(|_| {
        ReliefError::parse(
            line_no,
            format!("{} is not a valid number: {}", expected, value),
        )
    })
}

/// Split a `<name> <value>` line and check the name.
fn header_value<'a>(line: &'a str, line_no: usize, expected: &str) -> Result<&'a str> {
    let mut parts = line.split_whitespace();
    let (name, value) = match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(value), None) => (name, value),
        _ => {
            return Err(ReliefError::parse(
                line_no,
                format!(
                    "expected `{} <value>`, found {:?}",
                    expected,
                    line.trim_end()
                ),
            ))
        }
    };
    if !name.eq_ignore_ascii_case(expected) {
        return Err(ReliefError::parse(
            line_no,
            format!("expected {}, found {}", expected, name),
        ));
    }
    Ok(value)
}

/// Parse one elevation token.
///
/// Integers take a fast path; anything else is parsed as a float and
/// rounded. Returns `None` for garbage or values outside the `i16` range.
fn parse_sample(token: &[u8]) -> Option<i16> {
    let (negative, digits) = match token.first()? {
        b'-' => (true, &token[1..]),
        b'+' => (false, &token[1..]),
        _ => (false, token),
    };

    if !digits.is_empty() && digits.len() <= 6 && digits.iter().all(u8::is_ascii_digit) {
        let magnitude = digits
            .iter()
            .fold(0i32, |acc, d| acc * 10 + i32::from(d - b'0'));
        let value = if negative { -magnitude } else { magnitude };
        return i16::try_from(value).ok();
    }

    let value: f64 = std::str::from_utf8(token).ok()?.parse().ok()?;
    let rounded = value.round();
    if rounded.is_finite() && rounded >= f64::from(i16::MIN) && rounded <= f64::from(i16::MAX) {
        Some(rounded as i16)
    } else {
        None
    }
}

/// Incremental tokenizer for the grid body.
///
/// Bytes can be fed in arbitrary chunks; a token split across two chunks is
/// kept in `token` until its delimiter arrives.
struct BodyParser<'a> {
    values: Vec<i16>,
    expected: usize,
    columns: usize,
    rows: usize,
    token: Vec<u8>,
    line: usize,
    extra: usize,
    last_percent: Option<u8>,
    progress: Option<&'a (dyn Fn(u8) + Send + Sync)>,
}

impl<'a> BodyParser<'a> {
    fn new(header: &GridHeader, progress: Option<&'a (dyn Fn(u8) + Send + Sync)>) -> Self {
        let expected = header.sample_count();
        Self {
            values: Vec::with_capacity(expected.min(INITIAL_SAMPLE_CAPACITY)),
            expected,
            columns: header.columns,
            rows: header.rows,
            token: Vec::with_capacity(16),
            line: if header.no_data.is_some() { 7 } else { 6 },
            extra: 0,
            last_percent: None,
            progress,
        }
    }

    fn feed(&mut self, bytes: &[u8]) -> Result<()> {
        for &b in bytes {
            if b == b'\n' {
                self.flush_token()?;
                self.line += 1;
            } else if b.is_ascii_whitespace() {
                self.flush_token()?;
            } else {
                self.token.push(b);
            }
        }
        Ok(())
    }

    fn flush_token(&mut self) -> Result<()> {
        if self.token.is_empty() {
            return Ok(());
        }
        let value = parse_sample(&self.token).ok_or_else(|| {
            ReliefError::parse(
                self.line,
                format!(
                    "invalid elevation value: {}",
                    String::from_utf8_lossy(&self.token)
                ),
            )
        })?;
        self.token.clear();

        if self.values.len() < self.expected {
            self.values.push(value);
            if self.values.len() % self.columns == 0 {
                self.report_row(self.values.len() / self.columns);
            }
        } else {
            self.extra += 1;
        }
        Ok(())
    }

    fn report_row(&mut self, rows_read: usize) {
        if let Some(progress) = self.progress {
            let percent = ((100 * rows_read) / self.rows) as u8;
            if self.last_percent != Some(percent) {
                self.last_percent = Some(percent);
                progress(percent);
            }
        }
    }

    fn finish(mut self) -> Result<Vec<i16>> {
        self.flush_token()?;
        if self.values.len() < self.expected {
            return Err(ReliefError::TruncatedBody {
                expected: self.expected,
                found: self.values.len(),
            });
        }
        if self.extra > 0 {
            tracing::debug!(extra = self.extra, "Ignoring values after the last grid row");
        }
        Ok(self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    const SMALL_GRID: &str = "ncols 3\n\
                              nrows 2\n\
                              xllcorner 7.5\n\
                              yllcorner 46.25\n\
                              cellsize 0.5\n\
                              NODATA_value -9999\n\
                              1 2 3\n\
                              -4 5 -9999\n";

    fn parse_str(text: &str) -> Result<HeightTile> {
        AsciiGridReader::new().parse(Cursor::new(text.as_bytes()), Path::new("test.asc"))
    }

    fn write_temp(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parse_small_grid() {
        let tile = parse_str(SMALL_GRID).unwrap();
        let header = tile.header();

        assert_eq!(header.columns, 3);
        assert_eq!(header.rows, 2);
        assert_eq!(header.lower_left_x, 7.5);
        assert_eq!(header.lower_left_y, 46.25);
        assert_eq!(header.cell_size, 0.5);
        assert_eq!(header.no_data, Some(-9999));
        assert_eq!(tile.values(), &[1, 2, 3, -4, 5, -9999]);
        assert_eq!(tile.value(2, 1), -9999);
    }

    #[test]
    fn test_header_without_nodata() {
        let text = "NCOLS 2\nNROWS 1\nXLLCORNER 0\nYLLCORNER 0\nCELLSIZE 1\n10 20\n";
        let tile = parse_str(text).unwrap();

        assert_eq!(tile.header().no_data, None);
        assert_eq!(tile.values(), &[10, 20]);
    }

    #[test]
    fn test_header_errors_name_the_field() {
        let wrong_name = "ncols 2\nnrows 1\nxcorner 0\nyllcorner 0\ncellsize 1\n1 2\n";
        let err = parse_str(wrong_name).unwrap_err();
        assert!(matches!(err, ReliefError::Parse { line: 3, .. }));
        assert!(err.to_string().contains("xllcorner"));

        let extra_token = "ncols 2 3\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n";
        let err = parse_str(extra_token).unwrap_err();
        assert!(matches!(err, ReliefError::Parse { line: 1, .. }));
        assert!(err.to_string().contains("ncols"));

        let not_a_number = "ncols 2\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 0,5\n";
        let err = parse_str(not_a_number).unwrap_err();
        assert!(matches!(err, ReliefError::Parse { line: 5, .. }));
        assert!(err.to_string().contains("cellsize"));

        let short = "ncols 2\nnrows 1\n";
        let err = parse_str(short).unwrap_err();
        assert!(err.to_string().contains("xllcorner"));
    }

    #[test]
    fn test_header_rejects_empty_dimensions() {
        let zero_cols = "ncols 0\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n";
        assert!(parse_str(zero_cols).is_err());

        let zero_cell = "ncols 1\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 0\n5\n";
        assert!(parse_str(zero_cell).is_err());
    }

    #[test]
    fn test_decimal_separator_is_always_dot() {
        let text = "ncols 1\nnrows 1\nxllcorner -156.08749650000\nyllcorner 18.870890200000\ncellsize 0.00833300\n7\n";
        let tile = parse_str(text).unwrap();

        assert_eq!(tile.header().lower_left_x, -156.0874965);
        assert_eq!(tile.header().lower_left_y, 18.8708902);
        assert_eq!(tile.header().cell_size, 0.008333);
    }

    #[test]
    fn test_tokens_straddling_buffer_boundaries() {
        let mut text = String::from("ncols 4\nnrows 3\nxllcorner 0\nyllcorner 0\ncellsize 1\n");
        text.push_str("1234 -5678 9 10\r\n");
        text.push_str("32767 -32768 0 12\r\n");
        text.push_str("  7   8\t9 \r\n10");

        let expected = [1234, -5678, 9, 10, 32767, -32768, 0, 12, 7, 8, 9, 10];

        for capacity in [1, 2, 3, 5, 7, 64] {
            let reader = BufReader::with_capacity(capacity, Cursor::new(text.clone().into_bytes()));
            let tile = AsciiGridReader::new()
                .parse(reader, Path::new("chunks.asc"))
                .unwrap();
            assert_eq!(tile.values(), &expected, "buffer capacity {}", capacity);
        }
    }

    #[test]
    fn test_truncated_body_is_fatal() {
        let text = "ncols 3\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n4\n";
        match parse_str(text) {
            Err(ReliefError::TruncatedBody { expected, found }) => {
                assert_eq!(expected, 6);
                assert_eq!(found, 4);
            }
            other => panic!("Expected TruncatedBody, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_oversized_header_is_rejected() {
        let text = "ncols 4000000000\nnrows 4000000000\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n";
        let err = parse_str(text).unwrap_err();
        assert!(matches!(err, ReliefError::Parse { line: 2, .. }), "{:?}", err);

        let text = format!(
            "ncols {}\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n",
            usize::MAX
        );
        let err = parse_str(&text).unwrap_err();
        assert!(matches!(err, ReliefError::Parse { line: 2, .. }), "{:?}", err);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_large_header_with_short_body_is_truncated() {
        let text = "ncols 100000\nnrows 100000\nxllcorner 0\nyllcorner 0\ncellsize 0.0001\n1 2 3\n";
        match parse_str(text) {
            Err(ReliefError::TruncatedBody { expected, found }) => {
                assert_eq!(expected, 10_000_000_000);
                assert_eq!(found, 3);
            }
            other => panic!("Expected TruncatedBody, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_extra_values_are_ignored() {
        let text = "ncols 2\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3 4\n";
        let tile = parse_str(text).unwrap();
        assert_eq!(tile.values(), &[1, 2]);
    }

    #[test]
    fn test_invalid_values() {
        let garbage = "ncols 2\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 x2\n";
        let err = parse_str(garbage).unwrap_err();
        assert!(matches!(err, ReliefError::Parse { line: 6, .. }));

        let overflow = "ncols 2\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n1\n40000\n";
        let err = parse_str(overflow).unwrap_err();
        assert!(matches!(err, ReliefError::Parse { line: 7, .. }));
    }

    #[test]
    fn test_decimal_values_are_rounded() {
        let text = "ncols 3\nnrows 1\nxllcorner 0\nyllcorner 0\ncellsize 1\n12.0 -3.6 1e2\n";
        let tile = parse_str(text).unwrap();
        assert_eq!(tile.values(), &[12, -4, 100]);
    }

    #[test]
    fn test_read_header_matches_read_tile() {
        let file = write_temp(SMALL_GRID);
        let reader = AsciiGridReader::new();

        let header = reader.read_header(file.path()).unwrap();
        let tile = reader.read_tile(file.path()).unwrap();

        assert_eq!(tile.header(), &header);
        assert_eq!(header.filename, file.path());
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let text = "ncols 4\nnrows 2\nxllcorner -0.123456789\nyllcorner 51.5\ncellsize 0.000833333333\n\
                    -32768 0 32767 12\n1 2 3 4\n";
        let original = parse_str(text).unwrap();

        let mut out = Vec::new();
        write_grid(&original, &mut out).unwrap();
        let reparsed = parse_str(std::str::from_utf8(&out).unwrap()).unwrap();

        assert_eq!(reparsed.values(), original.values());
        assert_eq!(reparsed.header().columns, 4);
        assert_eq!(reparsed.header().rows, 2);
        assert_eq!(reparsed.header().lower_left_x, -0.123456789);
        assert_eq!(reparsed.header().lower_left_y, 51.5);
        assert_eq!(reparsed.header().cell_size, 0.000833333333);
        assert_eq!(reparsed.header().no_data, None);

        let with_nodata = parse_str(SMALL_GRID).unwrap();
        let mut out = Vec::new();
        write_grid(&with_nodata, &mut out).unwrap();
        let reparsed = parse_str(std::str::from_utf8(&out).unwrap()).unwrap();
        assert_eq!(reparsed.header().no_data, Some(-9999));
        assert_eq!(reparsed.values(), with_nodata.values());
    }

    #[test]
    fn test_progress_reports_rows() {
        let mut text = String::from("ncols 2\nnrows 4\nxllcorner 0\nyllcorner 0\ncellsize 1\n");
        for row in 0..4 {
            text.push_str(&format!("{} {}\n", row, row));
        }
        let file = write_temp(&text);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reader = AsciiGridReader::new()
            .buffer_size(4)
            .with_progress(move |percent| sink.lock().unwrap().push(percent));
        reader.read_tile(file.path()).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![25, 50, 75, 100]);
    }

    #[test]
    fn test_missing_file() {
        let err = read_tile("/nonexistent/grid.asc").unwrap_err();
        assert!(matches!(err, ReliefError::Io(_)));
    }

    #[test]
    fn test_header_contains_is_half_open() {
        let header = GridHeader {
            filename: PathBuf::from("a.asc"),
            columns: 10,
            rows: 10,
            lower_left_x: 0.0,
            lower_left_y: 0.0,
            cell_size: 1.0,
            no_data: None,
        };

        assert!(header.contains(0.0, 0.0));
        assert!(header.contains(9.999, 9.999));
        assert!(!header.contains(10.0, 0.0));
        assert!(!header.contains(0.0, 10.0));
        assert!(header.covers(&BoundingBox::new(1.0, 1.0, 2.0, 2.0)));
        assert!(!header.covers(&BoundingBox::new(1.0, 1.0, 10.0, 2.0)));
    }
}
