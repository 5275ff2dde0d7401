//! Piecewise-linear color gradients.
//!
//! An [`ElevationGradient`] is an ordered list of [`GradientColorPoint`]s over
//! the unit interval. It always has a point at offset 0.0 and one at 1.0; these
//! endpoints are fixed and cannot be removed or moved.

use std::fmt;
use std::str::FromStr;

use crate::error::{ReliefError, Result};

/// Straight (non-premultiplied) RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    /// Opaque color from its channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from `0xRRGGBB`.
    pub const fn from_hex(rgb: u32) -> Self {
        Self::rgb((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    /// Linear interpolation towards `other`; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Color, t: f64) -> Color {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// A control point of a gradient.
///
/// The offset is clamped to `[0, 1]` whenever it is written.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GradientColorPoint {
    color: Color,
    offset: f64,
}

impl GradientColorPoint {
    pub fn new(color: Color, offset: f64) -> Self {
        Self {
            color,
            offset: clamp_offset(offset),
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = clamp_offset(offset);
    }

    /// Endpoints at exactly 0.0 or 1.0 are fixed.
    pub fn is_fixed(&self) -> bool {
        self.offset == 0.0 || self.offset == 1.0
    }
}

fn clamp_offset(offset: f64) -> f64 {
    if offset.is_nan() {
        0.0
    } else {
        offset.clamp(0.0, 1.0)
    }
}

/// Gradient over the unit interval, sampled by linear interpolation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElevationGradient {
    points: Vec<GradientColorPoint>,
}

impl ElevationGradient {
    /// Create a gradient from control points.
    ///
    /// Points are sorted by offset.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::InvalidGradient`] unless there is a point at
    /// offset 0.0 and one at 1.0.
    pub fn new(points: impl IntoIterator<Item = GradientColorPoint>) -> Result<Self> {
        let mut gradient = Self {
            points: points.into_iter().collect(),
        };
        gradient.sort_by_offset();

        let has_start = gradient.points.first().map_or(false, |p| p.offset == 0.0);
        let has_end = gradient.points.last().map_or(false, |p| p.offset == 1.0);
        if !has_start || !has_end {
            return Err(ReliefError::InvalidGradient(
                "gradient needs control points at offsets 0.0 and 1.0".to_string(),
            ));
        }
        Ok(gradient)
    }

    /// Create a gradient from `(color, offset)` pairs.
    pub fn from_stops(stops: &[(Color, f64)]) -> Result<Self> {
        Self::new(
            stops
                .iter()
                .map(|&(color, offset)| GradientColorPoint::new(color, offset)),
        )
    }

    /// Control points in ascending offset order.
    pub fn points(&self) -> &[GradientColorPoint] {
        &self.points
    }

    /// Color at `offset`.
    ///
    /// Offsets outside `[0, 1]` return the endpoint colors.
    pub fn sample(&self, offset: f64) -> Color {
        let offset = clamp_offset(offset);
        if self.points.is_empty() {
            return Color::TRANSPARENT;
        }

        // First point at or past the offset; the last point has offset 1.0.
        let upper = self
            .points
            .iter()
            .position(|p| p.offset >= offset)
            .unwrap_or(self.points.len() - 1);
        let hi = &self.points[upper];
        if hi.offset == offset || upper == 0 {
            return hi.color;
        }

        let lo = &self.points[upper - 1];
        let span = hi.offset - lo.offset;
        if span <= 0.0 {
            return hi.color;
        }
        lo.color.lerp(hi.color, (offset - lo.offset) / span)
    }

    /// Insert a point, keeping the list sorted. Returns its index.
    pub fn add(&mut self, color: Color, offset: f64) -> usize {
        let point = GradientColorPoint::new(color, offset);
        let index = self.points.partition_point(|p| p.offset <= point.offset);
        self.points.insert(index, point);
        index
    }

    /// Remove the point at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::FixedPoint`] for the endpoints and
    /// [`ReliefError::InvalidGradient`] for an index out of range.
    pub fn remove(&mut self, index: usize) -> Result<GradientColorPoint> {
        let point = self.point(index)?;
        if point.is_fixed() && self.is_endpoint(index) {
            return Err(ReliefError::FixedPoint {
                offset: point.offset,
            });
        }
        Ok(self.points.remove(index))
    }

    /// Move the point at `index`, re-sorting afterwards. Returns its new index.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::FixedPoint`] when `index` is an endpoint.
    pub fn set_offset(&mut self, index: usize, offset: f64) -> Result<usize> {
        let point = self.point(index)?;
        if point.is_fixed() && self.is_endpoint(index) {
            return Err(ReliefError::FixedPoint {
                offset: point.offset,
            });
        }
        let mut point = self.points.remove(index);
        point.set_offset(offset);
        let index = self.points.partition_point(|p| p.offset <= point.offset);
        // Never slide past the 1.0 endpoint.
        let index = index.min(self.points.len() - 1).max(1);
        self.points.insert(index, point);
        Ok(index)
    }

    /// Recolor the point at `index`.
    pub fn set_color(&mut self, index: usize, color: Color) -> Result<()> {
        self.point(index)?;
        self.points[index].set_color(color);
        Ok(())
    }

    /// Restore ascending offset order (stable for equal offsets).
    pub fn sort_by_offset(&mut self) {
        self.points.sort_by(|a, b| a.offset.total_cmp(&b.offset));
    }

    fn point(&self, index: usize) -> Result<GradientColorPoint> {
        self.points.get(index).copied().ok_or_else(|| {
            ReliefError::InvalidGradient(format!(
                "no control point at index {} (gradient has {})",
                index,
                self.points.len()
            ))
        })
    }

    fn is_endpoint(&self, index: usize) -> bool {
        index == 0 || index + 1 == self.points.len()
    }

    /// Blue, green, gold, brown.
    pub fn simple() -> Self {
        Self::preset(&[
            (Color::rgb(0, 0, 255), 0.0),
            (Color::rgb(0, 128, 0), 0.1),
            (Color::rgb(255, 215, 0), 0.5),
            (Color::rgb(165, 42, 42), 1.0),
        ])
    }

    /// Hypsometric tints from deep blue through greens and browns to white.
    pub fn natural() -> Self {
        Self::preset(&[
            (Color::rgb(64, 70, 208), 0.0),
            (Color::rgb(2, 99, 68), 0.001),
            (Color::rgb(14, 122, 47), 0.016_666_666_666_67),
            (Color::rgb(229, 208, 119), 0.083_333_333_333_33),
            (Color::rgb(195, 138, 59), 0.166_666_666_666_66),
            (Color::rgb(165, 72, 2), 0.25),
            (Color::rgb(152, 56, 8), 0.333_333_333_333_333),
            (Color::rgb(129, 33, 33), 0.5),
            (Color::rgb(120, 72, 72), 0.583_333_333_333_333),
            (Color::rgb(125, 125, 125), 0.666_666_666_666_666),
            (Color::rgb(255, 255, 255), 1.0),
        ])
    }

    pub fn natural_dark() -> Self {
        Self::preset(&[
            (Color::from_hex(0x58c6ff), 0.0),
            (Color::from_hex(0x58c6ff), 0.113_475_177_304_965),
            (Color::from_hex(0x35832d), 0.125),
            (Color::from_hex(0x35832d), 0.184_397_163_120_567),
            (Color::from_hex(0x4f9942), 0.283_687_943_262_411),
            (Color::from_hex(0xdeca5a), 0.457_446_808_510_638),
            (Color::from_hex(0x6b4500), 0.723_988_439_306_358),
            (Color::from_hex(0xdccda4), 0.868_497_109_826_59),
            (Color::from_hex(0xfafdff), 1.0),
        ])
    }

    fn preset(stops: &[(Color, f64)]) -> Self {
        let mut points: Vec<GradientColorPoint> = stops
            .iter()
            .map(|&(color, offset)| GradientColorPoint::new(color, offset))
            .collect();
        points.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        Self { points }
    }
}

impl Default for ElevationGradient {
    fn default() -> Self {
        Self::natural()
    }
}

/// Built-in gradients with their sea-level offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum GradientPreset {
    Simple,
    #[default]
    Natural,
    NaturalDark,
}

impl GradientPreset {
    pub fn gradient(self) -> ElevationGradient {
        match self {
            GradientPreset::Simple => ElevationGradient::simple(),
            GradientPreset::Natural => ElevationGradient::natural(),
            GradientPreset::NaturalDark => ElevationGradient::natural_dark(),
        }
    }

    /// Offset of elevation 0 on the gradient.
    pub fn sea_level_offset(self) -> f64 {
        match self {
            GradientPreset::Simple => 0.11,
            GradientPreset::Natural => 0.01,
            GradientPreset::NaturalDark => 0.125,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            GradientPreset::Simple => "simple",
            GradientPreset::Natural => "natural",
            GradientPreset::NaturalDark => "natural-dark",
        }
    }
}

impl FromStr for GradientPreset {
    type Err = ReliefError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "simple" => Ok(GradientPreset::Simple),
            "natural" => Ok(GradientPreset::Natural),
            "natural-dark" | "naturaldark" => Ok(GradientPreset::NaturalDark),
            other => Err(ReliefError::InvalidGradient(format!(
                "unknown gradient preset '{}' (expected simple, natural or natural-dark)",
                other
            ))),
        }
    }
}

impl fmt::Display for GradientPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLUE: Color = Color::rgb(0, 0, 255);
    const GREEN: Color = Color::rgb(0, 255, 0);
    const RED: Color = Color::rgb(255, 0, 0);

    fn three_stops() -> ElevationGradient {
        ElevationGradient::from_stops(&[(BLUE, 0.0), (GREEN, 0.5), (RED, 1.0)]).unwrap()
    }

    #[test]
    fn test_endpoints_required() {
        assert!(ElevationGradient::from_stops(&[(BLUE, 0.0), (RED, 0.9)]).is_err());
        assert!(ElevationGradient::from_stops(&[(BLUE, 0.1), (RED, 1.0)]).is_err());
        assert!(ElevationGradient::from_stops(&[]).is_err());

        // Out-of-range offsets are clamped onto the endpoints.
        let gradient = ElevationGradient::from_stops(&[(RED, 2.0), (BLUE, -1.0)]).unwrap();
        assert_eq!(gradient.points()[0].color(), BLUE);
        assert_eq!(gradient.points()[1].offset(), 1.0);
    }

    #[test]
    fn test_sample_endpoints_exact() {
        let gradient = three_stops();
        assert_eq!(gradient.sample(0.0), BLUE);
        assert_eq!(gradient.sample(0.5), GREEN);
        assert_eq!(gradient.sample(1.0), RED);
        assert_eq!(gradient.sample(-3.0), BLUE);
        assert_eq!(gradient.sample(7.0), RED);
        assert_eq!(gradient.sample(f64::NAN), BLUE);
    }

    #[test]
    fn test_sample_midpoint() {
        let gradient = three_stops();
        assert_eq!(gradient.sample(0.25), Color::rgb(0, 128, 128));
        assert_eq!(gradient.sample(0.75), Color::rgb(128, 128, 0));
        assert_eq!(gradient.sample(0.1), Color::rgb(0, 51, 204));
    }

    #[test]
    fn test_sample_with_duplicate_offsets() {
        let gradient =
            ElevationGradient::from_stops(&[(BLUE, 0.0), (BLUE, 0.5), (RED, 0.5), (RED, 1.0)])
                .unwrap();
        assert_eq!(gradient.sample(0.5), BLUE);
        assert_eq!(gradient.sample(0.50001), RED);
    }

    #[test]
    fn test_point_offset_clamped() {
        let mut point = GradientColorPoint::new(BLUE, 1.5);
        assert_eq!(point.offset(), 1.0);
        assert!(point.is_fixed());

        point.set_offset(-0.2);
        assert_eq!(point.offset(), 0.0);
        assert!(point.is_fixed());

        point.set_offset(0.3);
        assert!(!point.is_fixed());
    }

    #[test]
    fn test_remove_fixed_point() {
        let mut gradient = three_stops();
        assert!(matches!(
            gradient.remove(0),
            Err(ReliefError::FixedPoint { offset }) if offset == 0.0
        ));
        assert!(matches!(
            gradient.remove(2),
            Err(ReliefError::FixedPoint { .. })
        ));
        assert!(gradient.remove(9).is_err());

        let removed = gradient.remove(1).unwrap();
        assert_eq!(removed.color(), GREEN);
        assert_eq!(gradient.points().len(), 2);
        assert_eq!(gradient.sample(0.5), Color::rgb(128, 0, 128));
    }

    #[test]
    fn test_add_keeps_order() {
        let mut gradient = three_stops();
        let index = gradient.add(Color::WHITE, 0.75);
        assert_eq!(index, 2);
        assert_eq!(gradient.sample(0.75), Color::WHITE);

        let offsets: Vec<f64> = gradient.points().iter().map(|p| p.offset()).collect();
        assert_eq!(offsets, vec![0.0, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_set_offset_resorts() {
        let mut gradient = three_stops();
        gradient.add(Color::WHITE, 0.75);

        // Move green past white
        let index = gradient.set_offset(1, 0.9).unwrap();
        assert_eq!(index, 2);
        assert_eq!(gradient.points()[1].color(), Color::WHITE);
        assert_eq!(gradient.points()[2].color(), GREEN);

        // Endpoints stay put
        assert!(gradient.set_offset(0, 0.3).is_err());
        assert!(gradient.set_offset(3, 0.3).is_err());

        // Dragging an inner point onto 1.0 keeps the real endpoint last
        let index = gradient.set_offset(1, 1.0).unwrap();
        assert_eq!(index, 2);
        assert_eq!(gradient.points()[3].color(), RED);
    }

    #[test]
    fn test_set_color() {
        let mut gradient = three_stops();
        gradient.set_color(1, Color::WHITE).unwrap();
        assert_eq!(gradient.sample(0.5), Color::WHITE);
        assert!(gradient.set_color(5, Color::WHITE).is_err());
    }

    #[test]
    fn test_presets_are_valid() {
        for preset in [
            GradientPreset::Simple,
            GradientPreset::Natural,
            GradientPreset::NaturalDark,
        ] {
            let gradient = preset.gradient();
            let rebuilt = ElevationGradient::new(gradient.points().iter().copied()).unwrap();
            assert_eq!(rebuilt, gradient);
            assert!((0.0..=1.0).contains(&preset.sea_level_offset()));
            assert_eq!(preset.name().parse::<GradientPreset>().unwrap(), preset);
        }
        assert_eq!(ElevationGradient::default(), ElevationGradient::natural());
        assert_eq!(ElevationGradient::natural().sample(1.0), Color::WHITE);
        assert!("rainbow".parse::<GradientPreset>().is_err());
        assert_eq!(
            "Natural_Dark".parse::<GradientPreset>().unwrap(),
            GradientPreset::NaturalDark
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde() {
        let gradient = ElevationGradient::natural_dark();
        let json = serde_json::to_string(&gradient).unwrap();
        let parsed: ElevationGradient = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, gradient);

        let preset: GradientPreset = serde_json::from_str("\"natural-dark\"").unwrap();
        assert_eq!(preset, GradientPreset::NaturalDark);
    }

    #[test]
    fn test_color_display() {
        assert_eq!(Color::from_hex(0x58c6ff).to_string(), "#58c6ff");
        assert_eq!(Color::rgba(1, 2, 3, 4).to_string(), "#01020304");
    }
}
