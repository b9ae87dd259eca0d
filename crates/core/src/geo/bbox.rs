//! Geographic bounding boxes and request validation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LimitsConfig;

/// Errors raised when a requested region is rejected before any work starts.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// A coordinate is NaN or infinite.
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    /// Latitude outside [-90, 90].
    #[error("{field} must be between -90 and 90 (got {value})")]
    LatitudeOutOfRange { field: &'static str, value: f64 },

    /// Longitude outside [-180, 180].
    #[error("{field} must be between -180 and 180 (got {value})")]
    LongitudeOutOfRange { field: &'static str, value: f64 },

    /// Region larger than the configured maximum.
    #[error(
        "Selected area ({area:.4} deg²) exceeds maximum ({max} deg²). Please select a smaller region."
    )]
    AreaTooLarge { area: f64, max: f64 },

    /// Region so small it is effectively empty.
    #[error("Selected area ({area} deg²) is too small (minimum {min} deg²).")]
    AreaTooSmall { area: f64, min: f64 },
}

/// Accepted area range for a request, in square degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AreaLimits {
    pub min_area_deg2: f64,
    pub max_area_deg2: f64,
}

impl From<&LimitsConfig> for AreaLimits {
    fn from(config: &LimitsConfig) -> Self {
        Self {
            min_area_deg2: config.min_bbox_area_deg2,
            max_area_deg2: config.max_bbox_area_deg2,
        }
    }
}

impl Default for AreaLimits {
    fn default() -> Self {
        Self::from(&LimitsConfig::default())
    }
}

/// Rectangular region in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

/// A sub-region produced by partitioning a larger box.
pub type Tile = BoundingBox;

impl BoundingBox {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    pub fn lat_span(&self) -> f64 {
        (self.north - self.south).abs()
    }

    pub fn lon_span(&self) -> f64 {
        (self.east - self.west).abs()
    }

    /// Approximate area in square degrees.
    pub fn area_deg2(&self) -> f64 {
        self.lat_span() * self.lon_span()
    }

    /// Same region with edges ordered so that `south <= north` and `west <= east`.
    pub fn normalized(&self) -> Self {
        Self {
            south: self.south.min(self.north),
            west: self.west.min(self.east),
            north: self.south.max(self.north),
            east: self.west.max(self.east),
        }
    }

    /// Checks coordinates and area against `limits`, returning the area on success.
    pub fn validate(&self, limits: &AreaLimits) -> Result<f64, ValidationError> {
        for (field, value) in [
            ("south", self.south),
            ("west", self.west),
            ("north", self.north),
            ("east", self.east),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NotFinite { field });
            }
        }

        for (field, value) in [("south", self.south), ("north", self.north)] {
            if !(-90.0..=90.0).contains(&value) {
                return Err(ValidationError::LatitudeOutOfRange { field, value });
            }
        }

        for (field, value) in [("west", self.west), ("east", self.east)] {
            if !(-180.0..=180.0).contains(&value) {
                return Err(ValidationError::LongitudeOutOfRange { field, value });
            }
        }

        let area = self.area_deg2();
        if area > limits.max_area_deg2 {
            return Err(ValidationError::AreaTooLarge {
                area,
                max: limits.max_area_deg2,
            });
        }
        if area < limits.min_area_deg2 {
            return Err(ValidationError::AreaTooSmall {
                area,
                min: limits.min_area_deg2,
            });
        }

        Ok(area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> AreaLimits {
        AreaLimits {
            min_area_deg2: 1e-6,
            max_area_deg2: 4.0,
        }
    }

    #[test]
    fn test_area_is_absolute() {
        let bbox = BoundingBox::new(46.0, 8.0, 44.0, 6.0);
        assert_eq!(bbox.area_deg2(), 4.0);
    }

    #[test]
    fn test_area_at_maximum_passes() {
        let bbox = BoundingBox::new(44.0, 6.0, 46.0, 8.0);
        assert_eq!(bbox.validate(&limits()), Ok(4.0));
    }

    #[test]
    fn test_area_just_over_maximum_fails_with_numbers() {
        let bbox = BoundingBox::new(0.0, 0.0, 2.0, 2.00005);
        let err = bbox.validate(&limits()).unwrap_err();
        assert!(matches!(err, ValidationError::AreaTooLarge { .. }));

        let message = err.to_string();
        assert!(message.contains("4.0001"), "message was: {}", message);
        assert!(message.contains("(4 deg²)"), "message was: {}", message);
    }

    #[test]
    fn test_tiny_area_fails() {
        let bbox = BoundingBox::new(45.0, 7.0, 45.0001, 7.001);
        let err = bbox.validate(&limits()).unwrap_err();
        assert!(matches!(err, ValidationError::AreaTooSmall { .. }));
    }

    #[test]
    fn test_degenerate_box_fails() {
        let bbox = BoundingBox::new(45.0, 7.0, 45.0, 7.5);
        assert!(matches!(
            bbox.validate(&limits()),
            Err(ValidationError::AreaTooSmall { .. })
        ));
    }

    #[test]
    fn test_latitude_out_of_range() {
        let bbox = BoundingBox::new(-91.0, 7.0, 45.0, 7.1);
        assert_eq!(
            bbox.validate(&limits()),
            Err(ValidationError::LatitudeOutOfRange {
                field: "south",
                value: -91.0
            })
        );
    }

    #[test]
    fn test_longitude_out_of_range() {
        let bbox = BoundingBox::new(45.0, 7.0, 45.1, 180.5);
        assert!(matches!(
            bbox.validate(&limits()),
            Err(ValidationError::LongitudeOutOfRange { field: "east", .. })
        ));
    }

    #[test]
    fn test_nan_coordinate_rejected() {
        let bbox = BoundingBox::new(45.0, f64::NAN, 45.1, 7.1);
        assert_eq!(
            bbox.validate(&limits()),
            Err(ValidationError::NotFinite { field: "west" })
        );
    }

    #[test]
    fn test_normalized_orders_edges() {
        let bbox = BoundingBox::new(46.0, 8.0, 44.0, 6.0).normalized();
        assert_eq!(bbox, BoundingBox::new(44.0, 6.0, 46.0, 8.0));
    }

    #[test]
    fn test_deserialize_from_json() {
        let bbox: BoundingBox =
            serde_json::from_str(r#"{"south":45.0,"west":7.0,"north":45.1,"east":7.1}"#).unwrap();
        assert_eq!(bbox, BoundingBox::new(45.0, 7.0, 45.1, 7.1));
    }
}
