//! Closed Numeric Intervals

use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Closed interval `[min, max]` with `min < max`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    /// Create a range, rejecting inverted, empty or NaN bounds
    pub fn new(min: f64, max: f64) -> Result<Self, ModelError> {
        let range = Self { min, max };
        if range.is_well_formed() {
            Ok(range)
        } else {
            Err(ModelError::BadRange { min, max })
        }
    }

    /// Whether `min < max` holds (false when either bound is NaN)
    pub fn is_well_formed(&self) -> bool {
        self.min < self.max
    }

    /// Whether this range lies entirely within `other`
    pub fn is_subrange_of(&self, other: &Range) -> bool {
        self.min >= other.min && self.max <= other.max
    }

    /// Whether `value` lies within the closed interval
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}
