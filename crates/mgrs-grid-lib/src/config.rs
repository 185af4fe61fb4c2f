//! Tunable constants for grid generation and drawing

use crate::{GridError, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Configuration for the grid overlay
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// A cell subdivides once the view's short axis spans fewer than this many cells.
    /// Default: 5.25
    pub subdivision_span_factor: f64,
    /// Above this reciprocal map scale zones only draw their outline and label.
    /// Default: 2 100 000 x 2π
    pub label_only_scale: f64,
    /// Labels are hidden when the camera tilts beyond this many degrees.
    /// Default: 40
    pub max_label_tilt: f64,
    /// Clip tolerance in degrees. Default: 1e-8
    pub clip_epsilon: f64,
    /// Cells finer than this tier (meters) never subdivide. Default: 100, so the finest
    /// cells are 10 m.
    pub min_subdivision_resolution: f64,
    /// Longest lat/lon line chord on a globe projection, in degrees. Default: 6
    pub globe_chord_degrees: f64,
    /// Worker threads for grid generation, 0 for one per core
    pub worker_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            subdivision_span_factor: 5.25,
            label_only_scale: 2_100_000.0 * TAU,
            max_label_tilt: 40.0,
            clip_epsilon: crate::clip::DEFAULT_EPSILON,
            min_subdivision_resolution: 100.0,
            globe_chord_degrees: 6.0,
            worker_threads: 0,
        }
    }
}

impl Config {
    /// Reject values that would stall or explode subdivision
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("subdivision_span_factor", self.subdivision_span_factor),
            ("label_only_scale", self.label_only_scale),
            ("globe_chord_degrees", self.globe_chord_degrees),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(GridError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(self.clip_epsilon.is_finite() && self.clip_epsilon >= 0.0) {
            return Err(GridError::InvalidConfig(format!(
                "clip_epsilon must be non-negative, got {}",
                self.clip_epsilon
            )));
        }
        if !(10.0..=100_000.0).contains(&self.min_subdivision_resolution) {
            return Err(GridError::InvalidConfig(format!(
                "min_subdivision_resolution must be between 10 and 100000 m, got {}",
                self.min_subdivision_resolution
            )));
        }
        Ok(())
    }
}

/// Colour and width of the grid lines
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GridStyle {
    /// ARGB
    pub color: u32,
    /// Pixels
    pub line_width: f32,
}

impl Default for GridStyle {
    fn default() -> Self {
        Self {
            color: 0xFFFF_FFFF,
            line_width: 1.5,
        }
    }
}

impl GridStyle {
    /// Same colour with a different alpha
    pub fn with_alpha(self, alpha: u8) -> Self {
        Self {
            color: (self.color & 0x00FF_FFFF) | ((alpha as u32) << 24),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.subdivision_span_factor, 5.25);
        assert!((config.label_only_scale - 13_194_689.145).abs() < 0.01);
        assert_eq!(config.max_label_tilt, 40.0);
        assert_eq!(config.clip_epsilon, 1e-8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            subdivision_span_factor: 0.0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(GridError::InvalidConfig(_))));

        let config = Config {
            min_subdivision_resolution: 1.0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(GridError::InvalidConfig(_))));

        let config = Config {
            clip_epsilon: f64::NAN,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_style_alpha() {
        let style = GridStyle::default().with_alpha(0x80);
        assert_eq!(style.color, 0x80FF_FFFF);
        assert_eq!(style.line_width, 1.5);
    }
}
