//! Raster rendering of height tiles.
//!
//! Every output tile is composed of two layers:
//!
//! 1. a color layer, one gradient color per elevation sample;
//! 2. a semi-transparent grayscale relief shading layer computed from local
//!    elevation differences, drawn over the color layer.
//!
//! Output pixels are stored as premultiplied BGRA, four bytes per pixel.

use std::sync::Arc;

use crate::colors::ElevationColorCache;
use crate::error::Result;
use crate::gradient::Color;
use crate::height::HeightTile;
use crate::tiles::RenderRequest;

/// Bytes per BGRA pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Luminance of a flat shading pixel.
const SHADING_BIAS: i32 = 64;

/// A premultiplied BGRA raster.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl RasterImage {
    /// Create a fully transparent raster.
    pub fn new(width: u32, height: u32) -> Self {
        // Rows are aligned on 32-bit boundaries.
        let stride = (width as usize * BYTES_PER_PIXEL + 3) & !3;
        Self {
            width,
            height,
            stride,
            data: vec![0; stride * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw premultiplied BGRA bytes, `stride` bytes per row.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        assert!(x < self.width && y < self.height, "pixel ({}, {}) out of range", x, y);
        y as usize * self.stride + x as usize * BYTES_PER_PIXEL
    }

    /// Premultiplied `[b, g, r, a]` bytes of one pixel.
    pub fn bgra(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    /// Straight-alpha color of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Color {
        let [b, g, r, a] = self.bgra(x, y);
        Color::rgba(unpremultiply(r, a), unpremultiply(g, a), unpremultiply(b, a), a)
    }

    /// Store a straight-alpha color.
    pub fn put_pixel(&mut self, x: u32, y: u32, color: Color) {
        let i = self.offset(x, y);
        let a = color.a;
        self.data[i] = premultiply(color.b, a);
        self.data[i + 1] = premultiply(color.g, a);
        self.data[i + 2] = premultiply(color.r, a);
        self.data[i + 3] = a;
    }

    /// Draw `top` over this raster (source-over).
    ///
    /// # Panics
    ///
    /// Panics if the rasters differ in size.
    pub fn draw_over(&mut self, top: &RasterImage) {
        assert_eq!(
            (self.width, self.height),
            (top.width, top.height),
            "layer size mismatch"
        );
        let row_bytes = self.width as usize * BYTES_PER_PIXEL;
        for (dst_row, src_row) in self
            .data
            .chunks_exact_mut(self.stride)
            .zip(top.data.chunks_exact(top.stride))
        {
            for (dst, src) in dst_row[..row_bytes]
                .chunks_exact_mut(BYTES_PER_PIXEL)
                .zip(src_row[..row_bytes].chunks_exact(BYTES_PER_PIXEL))
            {
                let inverse = 255 - u32::from(src[3]);
                for channel in 0..BYTES_PER_PIXEL {
                    let blended = u32::from(src[channel]) + mul_div_255(u32::from(dst[channel]), inverse);
                    dst[channel] = blended.min(255) as u8;
                }
            }
        }
    }

    /// Tightly packed straight-alpha RGBA bytes.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                let color = self.pixel(x, y);
                out.extend_from_slice(&[color.r, color.g, color.b, color.a]);
            }
        }
        out
    }

    /// Encode as PNG.
    #[cfg(feature = "png")]
    pub fn encode_png(&self) -> Result<Vec<u8>> {
        use crate::error::ReliefError;

        let rgba = image::RgbaImage::from_raw(self.width, self.height, self.to_rgba8())
            .ok_or_else(|| {
                ReliefError::InvalidRequest(format!(
                    "raster {}x{} does not fit its buffer",
                    self.width, self.height
                ))
            })?;
        let mut buffer = std::io::Cursor::new(Vec::new());
        rgba.write_to(&mut buffer, image::ImageOutputFormat::Png)?;
        Ok(buffer.into_inner())
    }

    /// Encode as PNG and write to `path`.
    #[cfg(feature = "png")]
    pub fn save_png<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.encode_png()?)?;
        Ok(())
    }
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .finish()
    }
}

fn mul_div_255(value: u32, factor: u32) -> u32 {
    (value * factor + 127) / 255
}

fn premultiply(channel: u8, alpha: u8) -> u8 {
    mul_div_255(u32::from(channel), u32::from(alpha)) as u8
}

fn unpremultiply(channel: u8, alpha: u8) -> u8 {
    if alpha == 0 {
        return 0;
    }
    let alpha = u32::from(alpha);
    ((u32::from(channel) * 255 + alpha / 2) / alpha).min(255) as u8
}

/// Renders map tiles from height tiles.
///
/// The color cache is shared, so several renderers (or several loader
/// threads) reuse the same memoized colors.
#[derive(Debug, Clone)]
pub struct TileRenderer {
    colors: Arc<ElevationColorCache>,
}

impl TileRenderer {
    pub fn new(colors: Arc<ElevationColorCache>) -> Self {
        Self { colors }
    }

    /// The color cache used for the color layer.
    pub fn colors(&self) -> &Arc<ElevationColorCache> {
        &self.colors
    }

    /// Render the composited tile: color layer with relief shading on top.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::InvalidRequest`](crate::ReliefError::InvalidRequest)
    /// for an empty raster or an inverted bounding box.
    pub fn render(&self, tile: &HeightTile, request: &RenderRequest) -> Result<RasterImage> {
        let mut image = self.color_layer(tile, request)?;
        let shading = self.shading_layer(tile, request)?;
        composite(&mut image, &shading);
        Ok(image)
    }

    /// Elevation colors only.
    pub fn color_layer(&self, tile: &HeightTile, request: &RenderRequest) -> Result<RasterImage> {
        self.layer(tile, request, |tile, col, row| {
            let value = tile.value(col, row);
            if tile.is_no_data(value) {
                Color::TRANSPARENT
            } else {
                self.colors.color(i32::from(value))
            }
        })
    }

    /// Relief shading only.
    pub fn shading_layer(&self, tile: &HeightTile, request: &RenderRequest) -> Result<RasterImage> {
        self.layer(tile, request, shade)
    }

    fn layer<F>(&self, tile: &HeightTile, request: &RenderRequest, color_at: F) -> Result<RasterImage>
    where
        F: Fn(&HeightTile, usize, usize) -> Color,
    {
        request.validate()?;

        let (columns, rows) = sample_lookup(tile, request);
        let mut image = RasterImage::new(request.width, request.height);

        for (y, row) in rows.iter().enumerate() {
            let Some(row) = *row else { continue };
            for (x, col) in columns.iter().enumerate() {
                let Some(col) = *col else { continue };
                image.put_pixel(x as u32, y as u32, color_at(tile, col, row));
            }
        }
        Ok(image)
    }
}

/// Draw the shading layer over the color layer.
pub fn composite(color: &mut RasterImage, shading: &RasterImage) {
    color.draw_over(shading);
}

/// Grid column of every output pixel column and grid row of every output
/// pixel row. `None` where the pixel center falls outside the tile.
fn sample_lookup(tile: &HeightTile, request: &RenderRequest) -> (Vec<Option<usize>>, Vec<Option<usize>>) {
    let bounds = &request.bounds;
    let width = f64::from(request.width);
    let height = f64::from(request.height);

    let columns = (0..request.width)
        .map(|x| {
            let lon = bounds.min_lon + (f64::from(x) + 0.5) / width * bounds.width();
            tile.contains(lon, tile.lower_left_y())
                .then(|| tile.nearest_sample(lon, tile.lower_left_y()).0)
        })
        .collect();

    // Pixel row 0 is the northern edge.
    let rows = (0..request.height)
        .map(|y| {
            let lat = bounds.max_lat - (f64::from(y) + 0.5) / height * bounds.height();
            tile.contains(tile.lower_left_x(), lat)
                .then(|| tile.nearest_sample(tile.lower_left_x(), lat).1)
        })
        .collect();

    (columns, rows)
}

/// Relief shading pixel for the sample at `(col, row)`.
///
/// Differences are taken towards the two western neighbors and the two
/// southern neighbors. Terms that would leave the grid or touch a no-data
/// sample contribute nothing.
pub fn shade(tile: &HeightTile, col: usize, row: usize) -> Color {
    let center = tile.value(col, row);
    if tile.is_no_data(center) {
        return Color::TRANSPARENT;
    }
    let c = i32::from(center);

    let term = |near: i16, far: i16| -> i32 {
        if tile.is_no_data(near) || tile.is_no_data(far) {
            0
        } else {
            2 * (c - i32::from(near)) + (c - i32::from(far))
        }
    };

    let mut diff = 0;
    if col >= 2 {
        diff += term(tile.value(col - 1, row), tile.value(col - 2, row));
    }
    if row + 2 < tile.rows() {
        diff -= term(tile.value(col, row + 1), tile.value(col, row + 2));
    }

    let diff = (f64::from(diff.unsigned_abs()).sqrt() as i32) * diff.signum() * 4;
    let v = (diff + SHADING_BIAS).clamp(0, 255);
    let a = (64 + (v - 128).abs() / 2).clamp(0, 255);

    Color::rgba(v as u8, v as u8, v as u8, a as u8)
}
