/*!
 * Geographic calculations.
 *
 * The clustering works directly in longitude/latitude space, but the size of a cluster is
 * reported in meters along the surface of the Earth.
 */

use crate::HomeResult;
use ::geo::{Contains, GeometryCollection, Point};
use std::path::Path;

/// The radius of the Earth used for all great circle distances, in meters.
pub const EARTH_RADIUS_M: f64 = 6_372_800.0;

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Coord { lat, lon }
    }
}

/**
 * The simple great circle (haversine) distance calculation.
 *
 * #Arguments
 * * lat1 - the latitude of the first point in degrees.
 * * lon1 - the longitude of the first point in degrees.
 * * lat2 - the latitude of the second point in degrees.
 * * lon2 - the longitude of the second point in degrees.
 *
 * #Returns
 * The distance between the points in meters.
 */
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let dlat2 = (lat2 - lat1).to_radians() / 2.0;
    let dlon2 = (lon2 - lon1).to_radians() / 2.0;

    let sin2_dlat = f64::powi(f64::sin(dlat2), 2);
    let sin2_dlon = f64::powi(f64::sin(dlon2), 2);

    let arc = 2.0
        * f64::asin(f64::sqrt(
            sin2_dlat + sin2_dlon * f64::cos(lat1_r) * f64::cos(lat2_r),
        ));

    arc * EARTH_RADIUS_M
}

/// An area of interest, such as a state or a city, loaded from GeoJSON.
///
/// Any geometry in the file counts as part of the region, so a FeatureCollection of several
/// polygons describes their union.
#[derive(Debug, Clone)]
pub struct Region(GeometryCollection<f64>);

impl Region {
    /// Parse a region from GeoJSON text.
    pub fn from_geojson_str(text: &str) -> HomeResult<Self> {
        let gj: geojson::GeoJson = text.parse()?;
        let collection: GeometryCollection<f64> = geojson::quick_collection(&gj)?;

        if collection.0.is_empty() {
            return Err("region contains no geometry".into());
        }

        Ok(Region(collection))
    }

    /// Load a region from a GeoJSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> HomeResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_geojson_str(&text)
    }

    /// Is this coordinate inside the region? Points on the boundary are not.
    pub fn contains(&self, coord: Coord) -> bool {
        let pt = Point::new(coord.lon, coord.lat);
        self.0.iter().any(|geometry| geometry.contains(&pt))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_great_circle_distance() {
        // One degree of latitude.
        let dist = great_circle_distance(42.0, -71.0, 43.0, -71.0);
        let expected = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        assert!((dist - expected).abs() < 1.0e-6);

        assert_eq!(great_circle_distance(42.36, -71.06, 42.36, -71.06), 0.0);

        // Symmetric
        let a = great_circle_distance(42.36, -71.06, 40.71, -74.01);
        let b = great_circle_distance(40.71, -74.01, 42.36, -71.06);
        assert!((a - b).abs() < 1.0e-6);

        // Boston to New York is roughly 300 km.
        assert!(a > 290_000.0 && a < 310_000.0);
    }

    #[test]
    fn test_region_contains() {
        const SQUARE: &str = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-72.0, 42.0], [-71.0, 42.0], [-71.0, 43.0], [-72.0, 43.0], [-72.0, 42.0]]]
                }
            }]
        }"#;

        let region = Region::from_geojson_str(SQUARE).unwrap();

        assert!(region.contains(Coord::new(-71.5, 42.5)));
        assert!(!region.contains(Coord::new(-70.5, 42.5)));
        assert!(!region.contains(Coord::new(-71.5, 43.5)));
    }

    #[test]
    fn test_region_rejects_garbage() {
        assert!(Region::from_geojson_str("not json").is_err());
        assert!(Region::from_geojson_str(r#"{"type": "FeatureCollection", "features": []}"#).is_err());
    }
}
