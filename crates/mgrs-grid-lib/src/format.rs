//! Display formats for positions and grid-line labels

use crate::geodesy::{MgrsReference, UtmPoint};
use crate::CoordinateFormatError;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a full position is shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CoordinateFormat {
    #[default]
    Mgrs,
    /// Decimal degrees
    Dd,
    /// Degrees and decimal minutes
    Dm,
    /// Degrees, minutes and seconds
    Dms,
    Utm,
}

/// Angle notation used by the lat/lon grid lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AngleFormat {
    #[default]
    Decimal,
    DegreesMinutesSeconds,
}

/// Split an absolute angle into whole degrees, whole minutes and seconds
///
/// Seconds are rounded to hundredths first so 59.999" carries into the next minute
/// instead of printing as 60.00".
pub fn to_degrees_minutes_seconds(angle: f64) -> (u32, u32, f64) {
    let total_hundredths = (angle.abs() * 360_000.0).round() as u64;
    let degrees = total_hundredths / 360_000;
    let minutes = (total_hundredths % 360_000) / 6000;
    let seconds = (total_hundredths % 6000) as f64 / 100.0;
    (degrees as u32, minutes as u32, seconds)
}

/// Split an absolute angle into whole degrees and decimal minutes (4 decimals)
pub fn to_degrees_minutes(angle: f64) -> (u32, f64) {
    let total = (angle.abs() * 600_000.0).round() as u64;
    let degrees = total / 600_000;
    let minutes = (total % 600_000) as f64 / 10_000.0;
    (degrees as u32, minutes)
}

fn hemisphere(value: f64, positive: char, negative: char) -> char {
    if value < 0.0 { negative } else { positive }
}

fn check_range(lat: f64, lon: f64) -> Result<(), CoordinateFormatError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(CoordinateFormatError::LatitudeRange(lat));
    }
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(CoordinateFormatError::LongitudeRange(lon));
    }
    Ok(())
}

fn format_dms(value: f64, positive: char, negative: char) -> String {
    let (d, m, s) = to_degrees_minutes_seconds(value);
    format!("{}{d}°{m:02}'{s:05.2}\"", hemisphere(value, positive, negative))
}

fn format_dm(value: f64, positive: char, negative: char) -> String {
    let (d, m) = to_degrees_minutes(value);
    format!("{}{d}°{m:07.4}'", hemisphere(value, positive, negative))
}

/// Render a position in the requested format
///
/// # Errors
///
/// Out-of-range coordinates are reported, never clamped. MGRS and UTM are further
/// restricted to the 80°S..84°N band range.
pub fn format_point(
    lat: f64,
    lon: f64,
    format: CoordinateFormat,
) -> Result<String, CoordinateFormatError> {
    check_range(lat, lon)?;
    Ok(match format {
        CoordinateFormat::Mgrs => MgrsReference::from_lat_lon(lat, lon)?.to_string(),
        CoordinateFormat::Dd => format!("{lat:.5}, {lon:.5}"),
        CoordinateFormat::Dm => format!("{}  {}", format_dm(lat, 'N', 'S'), format_dm(lon, 'E', 'W')),
        CoordinateFormat::Dms => {
            format!("{}  {}", format_dms(lat, 'N', 'S'), format_dms(lon, 'E', 'W'))
        }
        CoordinateFormat::Utm => {
            let utm = UtmPoint::from_lat_lon(lat, lon)?;
            let band = crate::geodesy::band_letter(lat)?;
            format!(
                "{}{band} {:.0}E {:.0}N",
                utm.zone,
                utm.easting.floor(),
                utm.northing.floor()
            )
        }
    })
}

/// Label for a parallel at `lat`, e.g. `"N 10°"` or `"N 10°30'00\""`
pub fn latitude_label(lat: f64, format: AngleFormat) -> String {
    if lat == 0.0 {
        return "Equator".to_string();
    }
    angle_label(lat, 'N', 'S', format)
}

/// Label for a meridian at `lon`, e.g. `"E 9°"`
pub fn longitude_label(lon: f64, format: AngleFormat) -> String {
    let lon = crate::utils::wrap_longitude(lon);
    if lon == 0.0 {
        return "Prime Meridian".to_string();
    }
    if lon.abs() == 180.0 {
        return angle_label(180.0, ' ', ' ', format).trim().to_string();
    }
    angle_label(lon, 'E', 'W', format)
}

fn angle_label(value: f64, positive: char, negative: char, format: AngleFormat) -> String {
    let prefix = hemisphere(value, positive, negative);
    match format {
        AngleFormat::Decimal => {
            let abs = value.abs();
            if abs.fract() == 0.0 {
                format!("{prefix} {abs:.0}°")
            } else {
                format!("{prefix} {abs}°")
            }
        }
        AngleFormat::DegreesMinutesSeconds => {
            // Round once in whole seconds so 59.6" carries into the minutes
            let total = (value.abs() * 3600.0).round() as u64;
            let (d, m, s) = (total / 3600, total % 3600 / 60, total % 60);
            format!("{prefix} {d}°{m:02}'{s:02}\"")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dms_decomposition() {
        assert_eq!(to_degrees_minutes_seconds(10.5), (10, 30, 0.0));
        let (d, m, s) = to_degrees_minutes_seconds(-45.123456);
        assert_eq!((d, m), (45, 7));
        assert!((s - 24.44).abs() < 1e-9);
        // Carry: 0.9999999° is 1°00'00.00" after rounding
        assert_eq!(to_degrees_minutes_seconds(0.9999999), (1, 0, 0.0));
    }

    #[test]
    fn test_dm_decomposition() {
        let (d, m) = to_degrees_minutes(12.25);
        assert_eq!(d, 12);
        assert!((m - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_format_point() {
        assert_eq!(
            format_point(0.0, 0.0, CoordinateFormat::Mgrs).unwrap(),
            "31N AA 66021 00000"
        );
        assert_eq!(
            format_point(10.5, -20.25, CoordinateFormat::Dd).unwrap(),
            "10.50000, -20.25000"
        );
        assert_eq!(
            format_point(10.5, -20.25, CoordinateFormat::Dms).unwrap(),
            "N10°30'00.00\"  W20°15'00.00\""
        );
        assert_eq!(
            format_point(10.5, -20.25, CoordinateFormat::Dm).unwrap(),
            "N10°30.0000'  W20°15.0000'"
        );
        assert_eq!(
            format_point(0.0, 0.0, CoordinateFormat::Utm).unwrap(),
            "31N 166021E 0N"
        );
    }

    #[test]
    fn test_format_point_errors() {
        assert_eq!(
            format_point(91.0, 0.0, CoordinateFormat::Dd),
            Err(CoordinateFormatError::LatitudeRange(91.0))
        );
        assert_eq!(
            format_point(0.0, -181.0, CoordinateFormat::Dd),
            Err(CoordinateFormatError::LongitudeRange(-181.0))
        );
        // Valid degrees but outside the MGRS bands
        assert_eq!(
            format_point(85.0, 0.0, CoordinateFormat::Mgrs),
            Err(CoordinateFormatError::LatitudeRange(85.0))
        );
    }

    #[test]
    fn test_line_labels() {
        assert_eq!(latitude_label(0.0, AngleFormat::Decimal), "Equator");
        assert_eq!(longitude_label(0.0, AngleFormat::Decimal), "Prime Meridian");
        assert_eq!(latitude_label(10.0, AngleFormat::Decimal), "N 10°");
        assert_eq!(latitude_label(-30.0, AngleFormat::Decimal), "S 30°");
        assert_eq!(longitude_label(-9.0, AngleFormat::Decimal), "W 9°");
        assert_eq!(longitude_label(180.0, AngleFormat::Decimal), "180°");
        assert_eq!(longitude_label(190.0, AngleFormat::Decimal), "W 170°");
        assert_eq!(
            latitude_label(10.5, AngleFormat::DegreesMinutesSeconds),
            "N 10°30'00\""
        );
    }

    #[test]
    fn test_dms_label_carries_rounded_seconds() {
        let almost_eleven = 10.0 + 59.0 / 60.0 + 59.6 / 3600.0;
        assert_eq!(
            latitude_label(-almost_eleven, AngleFormat::DegreesMinutesSeconds),
            "S 11°00'00\""
        );
        let almost_half = 10.0 + 29.0 / 60.0 + 59.7 / 3600.0;
        assert_eq!(
            longitude_label(almost_half, AngleFormat::DegreesMinutesSeconds),
            "E 10°30'00\""
        );
        assert_eq!(
            latitude_label(10.0 + 12.0 / 60.0 + 3.4 / 3600.0, AngleFormat::DegreesMinutesSeconds),
            "N 10°12'03\""
        );
    }
}
