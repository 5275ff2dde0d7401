//! Slippy-map tile math.
//!
//! Converts between Web-Mercator tile indices (`z/x/y`, as used by
//! OpenStreetMap-style map widgets) and geographic bounding boxes.
//!
//! Based on <https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames>.

use std::f64::consts::PI;
use std::fmt;

use crate::error::{ReliefError, Result};

/// Highest zoom level accepted by [`TileId::new`].
pub const MAX_ZOOM: u8 = 24;

/// Latitude limit of the Web-Mercator projection.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Default edge length of a rendered map tile in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// A geographic bounding box.
///
/// Coordinates are in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    /// Minimum latitude (southern boundary).
    pub min_lat: f64,
    /// Minimum longitude (western boundary).
    pub min_lon: f64,
    /// Maximum latitude (northern boundary).
    pub max_lat: f64,
    /// Maximum longitude (eastern boundary).
    pub max_lon: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    ///
    /// # Arguments
    ///
    /// * `min_lat` - Southern boundary latitude
    /// * `min_lon` - Western boundary longitude
    /// * `max_lat` - Northern boundary latitude
    /// * `max_lon` - Eastern boundary longitude
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Check that all edges are finite and the box is not inverted or empty.
    pub fn is_valid(&self) -> bool {
        [self.min_lat, self.min_lon, self.max_lat, self.max_lon]
            .iter()
            .all(|v| v.is_finite())
            && self.max_lat > self.min_lat
            && self.max_lon > self.min_lon
    }

    /// Check if this bounding box overlaps another one.
    ///
    /// Boxes that only touch along an edge do not overlap.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lat < other.max_lat
            && self.max_lat > other.min_lat
            && self.min_lon < other.max_lon
            && self.max_lon > other.min_lon
    }

    /// Parse `min_lat,min_lon,max_lat,max_lon`.
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<f64> = value
            .split(',')
            .map(|s| s.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            &[min_lat, min_lon, max_lat, max_lon] => {
                Some(Self::new(min_lat, min_lon, max_lat, max_lon))
            }
            _ => None,
        }
    }
}

/// Index of one map tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileId {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    /// Create a tile id, checking that `x` and `y` exist at `zoom`.
    pub fn new(zoom: u8, x: u32, y: u32) -> Result<Self> {
        if zoom > MAX_ZOOM || u64::from(x) >= tiles_at_zoom(zoom) || u64::from(y) >= tiles_at_zoom(zoom)
        {
            return Err(ReliefError::InvalidTile { zoom, x, y });
        }
        Ok(Self { zoom, x, y })
    }

    /// The tile containing `(lat, lon)` at `zoom`.
    ///
    /// Latitudes beyond the Mercator limit are clamped.
    pub fn from_lat_lon(lat: f64, lon: f64, zoom: u8) -> Result<Self> {
        let zoom = zoom.min(MAX_ZOOM);
        let n = tiles_at_zoom(zoom) as f64;
        let max = tiles_at_zoom(zoom) - 1;

        let x = (lon_to_tile_x(lon, zoom).floor().max(0.0) as u64).min(max);
        let y = (lat_to_tile_y(lat, zoom).floor().clamp(0.0, n) as u64).min(max);

        Self::new(zoom, x as u32, y as u32)
    }

    /// Geographic extent of this tile.
    pub fn bounds(&self) -> BoundingBox {
        let x = f64::from(self.x);
        let y = f64::from(self.y);
        BoundingBox::new(
            tile_y_to_lat(y + 1.0, self.zoom),
            tile_x_to_lon(x, self.zoom),
            tile_y_to_lat(y, self.zoom),
            tile_x_to_lon(x + 1.0, self.zoom),
        )
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Number of tiles along one axis at `zoom`.
pub fn tiles_at_zoom(zoom: u8) -> u64 {
    1u64 << zoom
}

/// Longitude of the western edge of tile column `x`.
pub fn tile_x_to_lon(x: f64, zoom: u8) -> f64 {
    x / tiles_at_zoom(zoom) as f64 * 360.0 - 180.0
}

/// Latitude of the northern edge of tile row `y`.
pub fn tile_y_to_lat(y: f64, zoom: u8) -> f64 {
    let n = PI - 2.0 * PI * y / tiles_at_zoom(zoom) as f64;
    n.sinh().atan().to_degrees()
}

/// Fractional tile column of `lon`.
pub fn lon_to_tile_x(lon: f64, zoom: u8) -> f64 {
    (lon + 180.0) / 360.0 * tiles_at_zoom(zoom) as f64
}

/// Fractional tile row of `lat`.
pub fn lat_to_tile_y(lat: f64, zoom: u8) -> f64 {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * tiles_at_zoom(zoom) as f64
}

/// All tiles at `zoom` that intersect `bbox`, row by row from the north-west.
pub fn tiles_covering(bbox: &BoundingBox, zoom: u8) -> Result<Vec<TileId>> {
    if !bbox.is_valid() {
        return Err(ReliefError::InvalidRequest(format!(
            "inverted or empty bounding box: {:?}",
            bbox
        )));
    }
    let north_west = TileId::from_lat_lon(bbox.max_lat, bbox.min_lon, zoom)?;
    let south_east = TileId::from_lat_lon(bbox.min_lat, bbox.max_lon, zoom)?;

    let mut tiles = Vec::new();
    for y in north_west.y..=south_east.y {
        for x in north_west.x..=south_east.x {
            tiles.push(TileId::new(north_west.zoom, x, y)?);
        }
    }
    Ok(tiles)
}

/// Everything needed to render one map tile.
///
/// Produced by the map widget and never modified after submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    /// Geographic extent of the output raster.
    pub bounds: BoundingBox,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Map tile the raster is rendered for.
    pub tile: TileId,
}

impl RenderRequest {
    /// Create a request for an arbitrary extent.
    pub fn new(bounds: BoundingBox, width: u32, height: u32, tile: TileId) -> Self {
        Self {
            bounds,
            width,
            height,
            tile,
        }
    }

    /// Create a square request covering `tile`.
    pub fn for_tile(tile: TileId, size: u32) -> Self {
        Self::new(tile.bounds(), size, size, tile)
    }

    /// Check that the request describes a non-empty raster over a valid box.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReliefError::InvalidRequest(format!(
                "empty raster {}x{} for tile {}",
                self.width, self.height, self.tile
            )));
        }
        if !self.bounds.is_valid() {
            return Err(ReliefError::InvalidRequest(format!(
                "inverted or empty bounding box for tile {}",
                self.tile
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_zoom_zero_covers_world() {
        let bounds = TileId::new(0, 0, 0).unwrap().bounds();
        assert!(approx_eq(bounds.min_lon, -180.0));
        assert!(approx_eq(bounds.max_lon, 180.0));
        assert!(approx_eq(bounds.max_lat, MAX_LATITUDE));
        assert!(approx_eq(bounds.min_lat, -MAX_LATITUDE));
    }

    #[test]
    fn test_tile_bounds() {
        // z=1: four quadrants, (1, 0) is the north-east one.
        let bounds = TileId::new(1, 1, 0).unwrap().bounds();
        assert!(approx_eq(bounds.min_lon, 0.0));
        assert!(approx_eq(bounds.max_lon, 180.0));
        assert!(approx_eq(bounds.min_lat, 0.0));
        assert!(approx_eq(bounds.max_lat, MAX_LATITUDE));
    }

    #[test]
    fn test_invalid_tile() {
        assert!(TileId::new(2, 4, 0).is_err());
        assert!(TileId::new(2, 0, 4).is_err());
        assert!(TileId::new(MAX_ZOOM + 1, 0, 0).is_err());
        assert!(TileId::new(2, 3, 3).is_ok());
    }

    #[test]
    fn test_from_lat_lon() {
        // Bern, Switzerland at z=10
        let tile = TileId::from_lat_lon(46.948, 7.447, 10).unwrap();
        assert_eq!(tile, TileId { zoom: 10, x: 533, y: 360 });
        let bounds = tile.bounds();
        assert!(bounds.min_lat <= 46.948 && 46.948 < bounds.max_lat);
        assert!(bounds.min_lon <= 7.447 && 7.447 < bounds.max_lon);

        // Poles and the antimeridian clamp into the grid
        let tile = TileId::from_lat_lon(90.0, 180.0, 3).unwrap();
        assert_eq!(tile, TileId { zoom: 3, x: 7, y: 0 });
        let tile = TileId::from_lat_lon(-90.0, -180.0, 3).unwrap();
        assert_eq!(tile, TileId { zoom: 3, x: 0, y: 7 });
    }

    #[test]
    fn test_tile_math_round_trip() {
        for zoom in [0u8, 5, 12] {
            for t in [0.0, 1.0, 3.0] {
                if t >= tiles_at_zoom(zoom) as f64 {
                    continue;
                }
                assert!(approx_eq(lon_to_tile_x(tile_x_to_lon(t, zoom), zoom), t));
                assert!((lat_to_tile_y(tile_y_to_lat(t + 0.5, zoom), zoom) - (t + 0.5)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_tiles_covering() {
        let bbox = BoundingBox::new(46.0, 7.0, 47.0, 8.0);
        let tiles = tiles_covering(&bbox, 8).unwrap();

        // Columns 132..=133, two rows around y=90
        assert_eq!(tiles.len(), 4);
        for tile in &tiles {
            assert!(tile.bounds().intersects(&bbox));
        }
        assert_eq!(tiles[0], TileId::from_lat_lon(47.0, 7.0, 8).unwrap());

        let inverted = BoundingBox::new(47.0, 7.0, 46.0, 8.0);
        assert!(tiles_covering(&inverted, 8).is_err());
    }

    #[test]
    fn test_bounding_box_intersects() {
        let a = BoundingBox::new(35.0, 138.0, 36.0, 139.0);
        assert!(a.intersects(&BoundingBox::new(35.5, 138.5, 36.5, 139.5)));
        assert!(!a.intersects(&BoundingBox::new(40.0, 140.0, 41.0, 141.0)));
        // Touching edge (exclusive boundary)
        assert!(!a.intersects(&BoundingBox::new(36.0, 139.0, 37.0, 140.0)));
        // Containment either way
        assert!(a.intersects(&BoundingBox::new(34.0, 137.0, 37.0, 140.0)));
        assert!(a.intersects(&BoundingBox::new(35.2, 138.2, 35.8, 138.8)));
    }

    #[test]
    fn test_bounding_box_parse() {
        assert_eq!(
            BoundingBox::parse("46, 7.5, 47,8"),
            Some(BoundingBox::new(46.0, 7.5, 47.0, 8.0))
        );
        assert_eq!(BoundingBox::parse("46,7,47"), None);
        assert_eq!(BoundingBox::parse("a,b,c,d"), None);
    }

    #[test]
    fn test_render_request_validation() {
        let tile = TileId::new(3, 1, 2).unwrap();
        assert!(RenderRequest::for_tile(tile, 256).validate().is_ok());

        let empty = RenderRequest::for_tile(tile, 0);
        assert!(matches!(empty.validate(), Err(ReliefError::InvalidRequest(_))));

        let inverted = RenderRequest::new(BoundingBox::new(1.0, 1.0, 0.0, 2.0), 4, 4, tile);
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(TileId::new(9, 266, 180).unwrap().to_string(), "9/266/180");
    }
}
