//! Geodetic conversions between latitude/longitude, UTM and MGRS
//!
//! All functions here are pure: no shared mutable state, safe to call from any number of
//! background tasks at once. The transverse Mercator projection uses the Krüger series
//! to fourth order in the third flattening, which stays well below a millimeter inside
//! (and several degrees beyond) a UTM zone.

use crate::CoordinateFormatError;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

type ConversionResult<T> = std::result::Result<T, CoordinateFormatError>;

/// UTM central scale factor
pub const UTM_SCALE_FACTOR: f64 = 0.9996;

/// False easting applied to every zone
pub const FALSE_EASTING: f64 = 500_000.0;

/// False northing applied in the southern hemisphere
pub const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Southern limit of the UTM/MGRS latitude bands
pub const MIN_LATITUDE: f64 = -80.0;

/// Northern limit of the UTM/MGRS latitude bands
pub const MAX_LATITUDE: f64 = 84.0;

/// Size of one MGRS grid square in meters
pub const GRID_SQUARE_METERS: f64 = 100_000.0;

/// Latitude band letters from 80°S northwards (band X is 12° tall)
const BAND_LETTERS: &[u8; 20] = b"CDEFGHJKLMNPQRSTUVWX";

/// 100km row letters
const ROW_LETTERS: &[u8; 20] = b"ABCDEFGHJKLMNPQRSTUV";

/// 100km column letter sets, selected by `(zone - 1) % 3`
const COLUMN_SETS: [&[u8; 8]; 3] = [b"ABCDEFGH", b"JKLMNPQR", b"STUVWXYZ"];

/// Lower bound of the UTM northing inside each band, used to resolve the
/// 2000km repetition of the row letters
const BAND_MIN_NORTHING: [f64; 20] = [
    1_100_000.0, // C
    2_000_000.0, // D
    2_800_000.0, // E
    3_700_000.0, // F
    4_600_000.0, // G
    5_500_000.0, // H
    6_400_000.0, // J
    7_300_000.0, // K
    8_200_000.0, // L
    9_100_000.0, // M
    0.0,         // N
    800_000.0,   // P
    1_700_000.0, // Q
    2_600_000.0, // R
    3_500_000.0, // S
    4_400_000.0, // T
    5_300_000.0, // U
    6_200_000.0, // V
    7_000_000.0, // W
    7_900_000.0, // X
];

/// Reference ellipsoid
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ellipsoid {
    /// Semi-major axis in meters
    pub semi_major_axis: f64,
    /// Flattening (a - b) / a
    pub flattening: f64,
}

impl Ellipsoid {
    pub const WGS_84: Ellipsoid = Ellipsoid {
        semi_major_axis: 6_378_137.0,
        flattening: 1.0 / 298.257_223_563,
    };

    /// First eccentricity
    pub fn eccentricity(&self) -> f64 {
        (self.flattening * (2.0 - self.flattening)).sqrt()
    }

    /// Third flattening n = f / (2 - f)
    pub fn third_flattening(&self) -> f64 {
        self.flattening / (2.0 - self.flattening)
    }
}

/// Krüger series coefficients for one ellipsoid
#[derive(Debug)]
struct TransverseMercator {
    /// Rectifying radius
    rectifying_radius: f64,
    eccentricity: f64,
    alpha: [f64; 4],
    beta: [f64; 4],
    delta: [f64; 4],
}

impl TransverseMercator {
    fn new(ellipsoid: Ellipsoid) -> Self {
        let n = ellipsoid.third_flattening();
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;

        Self {
            rectifying_radius: ellipsoid.semi_major_axis / (1.0 + n)
                * (1.0 + n2 / 4.0 + n4 / 64.0),
            eccentricity: ellipsoid.eccentricity(),
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0,
                61.0 * n3 / 240.0 - 103.0 * n4 / 140.0,
                49561.0 * n4 / 161_280.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0,
                n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0,
                17.0 * n3 / 480.0 - 37.0 * n4 / 840.0,
                4397.0 * n4 / 161_280.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3 + 116.0 * n4 / 45.0,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0 - 227.0 * n4 / 45.0,
                56.0 * n3 / 15.0 - 136.0 * n4 / 35.0,
                4279.0 * n4 / 630.0,
            ],
        }
    }

    /// Project to (x, y) meters relative to the central meridian and the equator,
    /// already scaled by the UTM scale factor
    fn forward(&self, lat: f64, lon: f64, central_meridian: f64) -> (f64, f64) {
        let phi = lat.to_radians();
        let lambda = (lon - central_meridian).to_radians();
        let e = self.eccentricity;

        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - e * (e * sin_phi).atanh()).sinh();
        let xi_prime = t.atan2(lambda.cos());
        let eta_prime = (lambda.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_prime;
        let mut eta = eta_prime;
        for (j, alpha) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += alpha * (k * xi_prime).sin() * (k * eta_prime).cosh();
            eta += alpha * (k * xi_prime).cos() * (k * eta_prime).sinh();
        }

        let scale = UTM_SCALE_FACTOR * self.rectifying_radius;
        (scale * eta, scale * xi)
    }

    /// Inverse of [`Self::forward`]
    fn inverse(&self, x: f64, y: f64, central_meridian: f64) -> (f64, f64) {
        let scale = UTM_SCALE_FACTOR * self.rectifying_radius;
        let xi = y / scale;
        let eta = x / scale;

        let mut xi_prime = xi;
        let mut eta_prime = eta;
        for (j, beta) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_prime -= beta * (k * xi).sin() * (k * eta).cosh();
            eta_prime -= beta * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_prime.sin() / eta_prime.cosh()).asin();
        let mut phi = chi;
        for (j, delta) in self.delta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            phi += delta * (k * chi).sin();
        }
        let lambda = eta_prime.sinh().atan2(xi_prime.cos());

        (phi.to_degrees(), central_meridian + lambda.to_degrees())
    }
}

static WGS_84_PROJECTION: LazyLock<TransverseMercator> =
    LazyLock::new(|| TransverseMercator::new(Ellipsoid::WGS_84));

/// A WGS-84 position in degrees, with an optional elevation in meters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: None,
        }
    }

    /// Copy of this point carrying the given elevation
    pub const fn with_elevation(self, elevation: Option<f64>) -> Self {
        Self {
            latitude: self.latitude,
            longitude: self.longitude,
            elevation,
        }
    }

    /// The point as a planar coordinate (x = longitude, y = latitude)
    #[inline]
    pub fn coord(&self) -> geo::Coord<f64> {
        geo::Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }

    /// Great-circle distance to another point in meters
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        crate::utils::haversine_distance(
            self.latitude,
            self.longitude,
            other.latitude,
            other.longitude,
        )
    }
}

/// Check a latitude/longitude pair against the UTM/MGRS domain
fn validate(lat: f64, lon: f64) -> ConversionResult<()> {
    if !lat.is_finite() || !(MIN_LATITUDE..=MAX_LATITUDE).contains(&lat) {
        return Err(CoordinateFormatError::LatitudeRange(lat));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(CoordinateFormatError::LongitudeRange(lon));
    }
    Ok(())
}

/// UTM zone number for a position, including the Norway and Svalbard exceptions
pub fn zone_number(lat: f64, lon: f64) -> u8 {
    let mut zone = (((lon + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60);

    if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
        zone = 32;
    }

    if (72.0..84.0).contains(&lat) {
        zone = match lon {
            l if (0.0..9.0).contains(&l) => 31,
            l if (9.0..21.0).contains(&l) => 33,
            l if (21.0..33.0).contains(&l) => 35,
            l if (33.0..42.0).contains(&l) => 37,
            _ => zone,
        };
    }

    zone as u8
}

/// Central meridian of a UTM zone in degrees
#[inline]
pub fn central_meridian(zone: u8) -> f64 {
    (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
}

/// Index of the latitude band (0 = C ... 19 = X)
pub fn band_index(lat: f64) -> ConversionResult<usize> {
    if !lat.is_finite() || !(MIN_LATITUDE..=MAX_LATITUDE).contains(&lat) {
        return Err(CoordinateFormatError::LatitudeRange(lat));
    }
    Ok((((lat - MIN_LATITUDE) / 8.0).floor() as usize).min(BAND_LETTERS.len() - 1))
}

/// Latitude band letter for a latitude
pub fn band_letter(lat: f64) -> ConversionResult<char> {
    Ok(BAND_LETTERS[band_index(lat)?] as char)
}

/// Position of a band letter in the band table
fn band_position(band: char) -> ConversionResult<usize> {
    BAND_LETTERS
        .iter()
        .position(|&b| b as char == band.to_ascii_uppercase())
        .ok_or_else(|| CoordinateFormatError::Invalid {
            field: "latitude band",
            value: band.to_string(),
        })
}

/// Human-readable zone descriptor such as `"32U"`
pub fn zone_descriptor(lat: f64, lon: f64) -> ConversionResult<String> {
    validate(lat, lon)?;
    Ok(format!("{}{}", zone_number(lat, lon), band_letter(lat)?))
}

/// A UTM coordinate: zone, hemisphere and easting/northing in meters
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UtmPoint {
    pub zone: u8,
    pub north: bool,
    pub easting: f64,
    pub northing: f64,
}

impl UtmPoint {
    /// Convert a lat/lon position using its natural zone
    pub fn from_lat_lon(lat: f64, lon: f64) -> ConversionResult<Self> {
        validate(lat, lon)?;
        Ok(Self::from_lat_lon_in_zone(
            lat,
            lon,
            zone_number(lat, lon),
            lat >= 0.0,
        ))
    }

    /// Project a lat/lon position into a given zone and hemisphere
    ///
    /// No range checks: grids extend a little beyond their zone boundary and need the
    /// projection to keep working there.
    pub fn from_lat_lon_in_zone(lat: f64, lon: f64, zone: u8, north: bool) -> Self {
        let (x, y) = WGS_84_PROJECTION.forward(lat, lon, central_meridian(zone));
        Self {
            zone,
            north,
            easting: FALSE_EASTING + x,
            northing: if north { y } else { y + FALSE_NORTHING_SOUTH },
        }
    }

    /// Convert back to latitude/longitude
    ///
    /// Longitudes are not wrapped, so a grid built in zone 60 continues past 180°.
    pub fn to_lat_lon(&self) -> GeoPoint {
        let y = if self.north {
            self.northing
        } else {
            self.northing - FALSE_NORTHING_SOUTH
        };
        let (lat, lon) = WGS_84_PROJECTION.inverse(
            self.easting - FALSE_EASTING,
            y,
            central_meridian(self.zone),
        );
        GeoPoint::new(lat, lon)
    }

    /// Move by the given number of meters east and north, in place
    #[inline]
    pub fn offset(&mut self, east: f64, north: f64) {
        self.easting += east;
        self.northing += north;
    }

    /// Copy of this point moved by the given number of meters
    #[inline]
    pub fn offset_by(mut self, east: f64, north: f64) -> Self {
        self.offset(east, north);
        self
    }

    /// Snap easting/northing down to a multiple of `meters`
    pub fn align_down(mut self, meters: f64) -> Self {
        self.easting = (self.easting / meters).floor() * meters;
        self.northing = (self.northing / meters).floor() * meters;
        self
    }
}

/// An MGRS reference: zone, band, 100km square and the offset inside the square
///
/// Copy semantics: holders copy rather than alias. [`MgrsReference::offset`] mutates in
/// place for the stepping done during grid generation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MgrsReference {
    pub zone: u8,
    pub band: char,
    /// 100km square column and row letters
    pub square: [char; 2],
    /// Meters east of the square's west edge
    pub easting: f64,
    /// Meters north of the square's south edge
    pub northing: f64,
}

impl MgrsReference {
    /// Convert a lat/lon position
    pub fn from_lat_lon(lat: f64, lon: f64) -> ConversionResult<Self> {
        let utm = UtmPoint::from_lat_lon(lat, lon)?;
        Self::from_utm(&utm, lat)
    }

    /// Build the reference for a UTM coordinate
    ///
    /// `latitude` selects the band letter; it must be the latitude of the position (or
    /// one in the same band).
    pub fn from_utm(utm: &UtmPoint, latitude: f64) -> ConversionResult<Self> {
        if !(1..=60).contains(&utm.zone) {
            return Err(CoordinateFormatError::Invalid {
                field: "zone",
                value: utm.zone.to_string(),
            });
        }
        let band = band_letter(latitude)?;

        let column = (utm.easting / GRID_SQUARE_METERS).floor() as i64 - 1;
        let set = COLUMN_SETS[(utm.zone as usize - 1) % 3];
        if !(0..set.len() as i64).contains(&column) {
            return Err(CoordinateFormatError::Invalid {
                field: "easting",
                value: format!("{:.0}", utm.easting),
            });
        }

        let mut row = (utm.northing / GRID_SQUARE_METERS).floor() as i64 % 20;
        if utm.zone % 2 == 0 {
            row = (row + 5) % 20;
        }
        let row = row.rem_euclid(20) as usize;

        Ok(Self {
            zone: utm.zone,
            band,
            square: [set[column as usize] as char, ROW_LETTERS[row] as char],
            easting: utm.easting.rem_euclid(GRID_SQUARE_METERS),
            northing: utm.northing.rem_euclid(GRID_SQUARE_METERS),
        })
    }

    /// Resolve the full UTM coordinate
    pub fn to_utm(&self) -> ConversionResult<UtmPoint> {
        if !(1..=60).contains(&self.zone) {
            return Err(CoordinateFormatError::Invalid {
                field: "zone",
                value: self.zone.to_string(),
            });
        }
        let band = band_position(self.band)?;

        let set = COLUMN_SETS[(self.zone as usize - 1) % 3];
        let column = set
            .iter()
            .position(|&c| c as char == self.square[0])
            .ok_or_else(|| CoordinateFormatError::Invalid {
                field: "grid square column",
                value: self.square[0].to_string(),
            })?;
        let mut row = ROW_LETTERS
            .iter()
            .position(|&c| c as char == self.square[1])
            .ok_or_else(|| CoordinateFormatError::Invalid {
                field: "grid square row",
                value: self.square[1].to_string(),
            })?;
        if self.zone % 2 == 0 {
            row = (row + 15) % 20;
        }

        let easting = (column + 1) as f64 * GRID_SQUARE_METERS + self.easting;
        let mut northing = row as f64 * GRID_SQUARE_METERS + self.northing;
        while northing < BAND_MIN_NORTHING[band] {
            northing += 2_000_000.0;
        }

        Ok(UtmPoint {
            zone: self.zone,
            north: band >= band_position('N')?,
            easting,
            northing,
        })
    }

    /// Convert back to latitude/longitude
    pub fn to_lat_lon(&self) -> ConversionResult<GeoPoint> {
        Ok(self.to_utm()?.to_lat_lon())
    }

    /// Move by the given number of meters, re-deriving square letters and band
    pub fn offset(&mut self, east: f64, north: f64) -> ConversionResult<()> {
        let utm = self.to_utm()?.offset_by(east, north);
        let lat = utm.to_lat_lon().latitude;
        *self = Self::from_utm(&utm, lat)?;
        Ok(())
    }

    /// Zone descriptor such as `"32U"`
    pub fn zone_descriptor(&self) -> String {
        format!("{}{}", self.zone, self.band)
    }

    /// 100km square identifier such as `"MV"`
    pub fn grid_descriptor(&self) -> String {
        self.square.iter().collect()
    }

    /// Five-digit easting within the square, floored to the meter
    pub fn easting_descriptor(&self) -> String {
        format!("{:05}", self.easting.floor() as u32)
    }

    /// Five-digit northing within the square, floored to the meter
    pub fn northing_descriptor(&self) -> String {
        format!("{:05}", self.northing.floor() as u32)
    }
}

impl fmt::Display for MgrsReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.zone_descriptor(),
            self.grid_descriptor(),
            self.easting_descriptor(),
            self.northing_descriptor()
        )
    }
}

impl FromStr for MgrsReference {
    type Err = CoordinateFormatError;

    /// Parse `"32U MV 12345 67890"`, `"32UMV1234567890"` or any precision from 1 to 5
    /// digits per axis
    fn from_str(s: &str) -> ConversionResult<Self> {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let invalid = |field: &'static str| CoordinateFormatError::Invalid {
            field,
            value: s.to_string(),
        };

        let zone_len = compact.chars().take_while(|c| c.is_ascii_digit()).count();
        if zone_len == 0 || zone_len > 2 {
            return Err(invalid("zone"));
        }
        let zone: u8 = compact[..zone_len]
            .parse()
            .map_err(|_| CoordinateFormatError::NumberFormat(compact[..zone_len].to_string()))?;
        if !(1..=60).contains(&zone) {
            return Err(invalid("zone"));
        }

        let mut letters = compact[zone_len..].chars();
        let band = letters.next().ok_or_else(|| invalid("latitude band"))?;
        band_position(band)?;
        let column = letters.next().ok_or_else(|| invalid("grid square"))?;
        let row = letters.next().ok_or_else(|| invalid("grid square"))?;
        if !column.is_ascii_alphabetic() || !row.is_ascii_alphabetic() {
            return Err(invalid("grid square"));
        }

        let digits = &compact[zone_len + 3..];
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoordinateFormatError::NumberFormat(digits.to_string()));
        }
        if digits.len() % 2 != 0 || digits.len() > 10 {
            return Err(invalid("easting/northing precision"));
        }
        let precision = digits.len() / 2;
        let parse_axis = |text: &str| -> ConversionResult<f64> {
            if text.is_empty() {
                return Ok(0.0);
            }
            let value: u32 = text
                .parse()
                .map_err(|_| CoordinateFormatError::NumberFormat(text.to_string()))?;
            Ok(value as f64 * 10f64.powi(5 - precision as i32))
        };

        let reference = Self {
            zone,
            band,
            square: [column, row],
            easting: parse_axis(&digits[..precision])?,
            northing: parse_axis(&digits[precision..])?,
        };
        // Validates the square letters against the zone's lettering scheme
        reference.to_utm()?;
        Ok(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Low-discrepancy sequence in [0, 1), good enough to sweep the globe evenly
    fn halton(index: u32, base: u32) -> f64 {
        let mut f = 1.0;
        let mut r = 0.0;
        let mut i = index;
        while i > 0 {
            f /= base as f64;
            r += f * (i % base) as f64;
            i /= base;
        }
        r
    }

    #[test]
    fn test_origin_utm() {
        let utm = UtmPoint::from_lat_lon(0.0, 0.0).unwrap();
        assert_eq!(utm.zone, 31);
        assert!(utm.north);
        assert!((utm.easting - 166_021.44).abs() < 0.01, "{}", utm.easting);
        assert!(utm.northing.abs() < 1e-6);
    }

    #[test]
    fn test_origin_mgrs() {
        let mgrs = MgrsReference::from_lat_lon(0.0, 0.0).unwrap();
        assert_eq!(mgrs.to_string(), "31N AA 66021 00000");
    }

    #[test]
    fn test_central_meridian_maps_to_false_easting() {
        let utm = UtmPoint::from_lat_lon(45.0, 9.0).unwrap();
        assert_eq!(utm.zone, 32);
        assert!((utm.easting - FALSE_EASTING).abs() < 1e-6);
        // Meridian arc to 45° scaled by 0.9996
        assert!((utm.northing - 4_982_950.4).abs() < 0.5, "{}", utm.northing);
    }

    #[test]
    fn test_southern_hemisphere_false_northing() {
        let utm = UtmPoint::from_lat_lon(-33.8688, 151.2093).unwrap();
        assert_eq!(utm.zone, 56);
        assert!(!utm.north);
        assert!(utm.northing > 6_000_000.0 && utm.northing < 6_500_000.0);
        let back = utm.to_lat_lon();
        assert!((back.latitude - -33.8688).abs() < 1e-9);
        assert!((back.longitude - 151.2093).abs() < 1e-9);
    }

    #[test]
    fn test_zone_exceptions() {
        // Norway
        assert_eq!(zone_number(60.0, 5.0), 32);
        assert_eq!(zone_number(60.0, 2.0), 31);
        assert_eq!(zone_number(55.9, 5.0), 31);
        // Svalbard
        assert_eq!(zone_number(78.0, 8.0), 31);
        assert_eq!(zone_number(78.0, 10.0), 33);
        assert_eq!(zone_number(78.0, 20.0), 33);
        assert_eq!(zone_number(78.0, 22.0), 35);
        assert_eq!(zone_number(78.0, 34.0), 37);
        assert_eq!(zone_number(78.0, 45.0), 38);
        // Antimeridian
        assert_eq!(zone_number(0.0, 180.0), 60);
        assert_eq!(zone_number(0.0, -180.0), 1);
    }

    #[test]
    fn test_band_letters() {
        assert_eq!(band_letter(-80.0).unwrap(), 'C');
        assert_eq!(band_letter(0.0).unwrap(), 'N');
        assert_eq!(band_letter(-0.1).unwrap(), 'M');
        assert_eq!(band_letter(10.0).unwrap(), 'P');
        assert_eq!(band_letter(60.0).unwrap(), 'V');
        assert_eq!(band_letter(80.0).unwrap(), 'X');
        assert_eq!(band_letter(84.0).unwrap(), 'X');
        assert!(matches!(
            band_letter(84.5),
            Err(CoordinateFormatError::LatitudeRange(_))
        ));
    }

    #[test]
    fn test_zone_descriptor() {
        assert_eq!(zone_descriptor(10.0, 10.0).unwrap(), "32P");
        assert_eq!(zone_descriptor(60.0, 5.0).unwrap(), "32V");
        assert!(matches!(
            zone_descriptor(10.0, 181.0),
            Err(CoordinateFormatError::LongitudeRange(_))
        ));
        assert!(matches!(
            zone_descriptor(-85.0, 0.0),
            Err(CoordinateFormatError::LatitudeRange(_))
        ));
    }

    #[test]
    fn test_round_trip_within_one_meter() {
        for i in 1..=10_000 {
            let lat = -80.0 + halton(i, 2) * 164.0;
            let lon = -180.0 + halton(i, 3) * 360.0;
            let mgrs = MgrsReference::from_lat_lon(lat, lon).unwrap();
            let back = mgrs.to_lat_lon().unwrap();
            let original = GeoPoint::new(lat, lon);
            let error = original.distance_to(&back);
            assert!(
                error < 1.0,
                "({lat}, {lon}) -> {mgrs} -> ({}, {}) off by {error} m",
                back.latitude,
                back.longitude
            );
        }
    }

    #[test]
    fn test_reference_round_trip() {
        let reference: MgrsReference = "32P MV 12345 67890".parse().unwrap();
        let point = reference.to_lat_lon().unwrap();
        let again = MgrsReference::from_lat_lon(point.latitude, point.longitude).unwrap();
        assert_eq!(again.zone, reference.zone);
        assert_eq!(again.band, reference.band);
        assert_eq!(again.square, reference.square);
        assert!((again.easting - reference.easting).abs() < 1e-3);
        assert!((again.northing - reference.northing).abs() < 1e-3);
    }

    #[test]
    fn test_parse_compact_and_precision() {
        let full: MgrsReference = "31NAA6602100000".parse().unwrap();
        assert_eq!(full.zone, 31);
        assert_eq!(full.band, 'N');
        assert_eq!(full.square, ['A', 'A']);
        assert_eq!(full.easting, 66021.0);

        let coarse: MgrsReference = "31N AA 6 0".parse().unwrap();
        assert_eq!(coarse.easting, 60_000.0);
        assert_eq!(coarse.northing, 0.0);

        let square_only: MgrsReference = "4QFJ".parse().unwrap();
        assert_eq!(square_only.zone, 4);
        assert_eq!(square_only.easting, 0.0);
    }

    #[test]
    fn test_parse_rejects_signed_digits() {
        for text in ["31NAA+6021+0000", "31N AA +6021 +0000", "31NAA-1-1", "31NAA6602.0000"] {
            assert!(
                matches!(
                    text.parse::<MgrsReference>(),
                    Err(CoordinateFormatError::NumberFormat(_))
                ),
                "{text}"
            );
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "".parse::<MgrsReference>(),
            Err(CoordinateFormatError::Invalid { field: "zone", .. })
        ));
        assert!(matches!(
            "61N AA 1 1".parse::<MgrsReference>(),
            Err(CoordinateFormatError::Invalid { field: "zone", .. })
        ));
        assert!(matches!(
            "31I AA 1 1".parse::<MgrsReference>(),
            Err(CoordinateFormatError::Invalid {
                field: "latitude band",
                ..
            })
        ));
        assert!(matches!(
            "31N AA 123 12".parse::<MgrsReference>(),
            Err(CoordinateFormatError::Invalid { .. })
        ));
        assert!(matches!(
            "31N AA 12A456".parse::<MgrsReference>(),
            Err(CoordinateFormatError::NumberFormat(_))
        ));
        // Column letter from another zone's set
        assert!(matches!(
            "31N JA 1 1".parse::<MgrsReference>(),
            Err(CoordinateFormatError::Invalid {
                field: "grid square column",
                ..
            })
        ));
    }

    #[test]
    fn test_offset_crosses_square_boundary() {
        let mut reference = MgrsReference::from_lat_lon(10.0, 10.0).unwrap();
        let before = reference.to_utm().unwrap();
        reference.offset(100_000.0, 0.0).unwrap();
        let after = reference.to_utm().unwrap();
        assert!((after.easting - before.easting - 100_000.0).abs() < 1e-6);
        assert!((after.northing - before.northing).abs() < 1e-6);
        assert_ne!(reference.square[0], MgrsReference::from_utm(&before, 10.0).unwrap().square[0]);
    }

    #[test]
    fn test_forced_zone_extends_past_boundary() {
        // 2° west of zone 32's west edge, still projected in zone 32
        let utm = UtmPoint::from_lat_lon_in_zone(10.0, 4.0, 32, true);
        let back = utm.to_lat_lon();
        assert!((back.latitude - 10.0).abs() < 1e-9);
        assert!((back.longitude - 4.0).abs() < 1e-9);

        // Zone 60 grids continue past the antimeridian without wrapping
        let east = UtmPoint::from_lat_lon_in_zone(0.0, 181.0, 60, true).to_lat_lon();
        assert!((east.longitude - 181.0).abs() < 1e-9);
    }

    #[test]
    fn test_align_down() {
        let utm = UtmPoint {
            zone: 32,
            north: true,
            easting: 512_345.6,
            northing: 1_105_432.1,
        };
        let aligned = utm.align_down(GRID_SQUARE_METERS);
        assert_eq!(aligned.easting, 500_000.0);
        assert_eq!(aligned.northing, 1_100_000.0);
    }
}
