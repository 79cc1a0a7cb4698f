//! Registry Entities

use crate::range::Range;
use serde::{Deserialize, Serialize};

/// A class of sensor device with calibration limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorType {
    /// Unique key
    pub id: String,
    pub manufacturer: String,
    pub model_number: String,
    /// Measured quantity (e.g. "temperature")
    pub quantity: String,
    /// Calibration limits
    pub limits: Range,
}

/// A deployed instance of a sensor type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    /// Unique key
    pub id: String,
    /// Id of the [`SensorType`] this sensor is an instance of
    pub sensor_type_id: String,
    /// Expected operating range, a subrange of the type's limits
    pub expected: Range,
}

/// A single timestamped measurement, keyed by `(sensor_id, timestamp)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub sensor_id: String,
    /// Epoch timestamp, unique per sensor
    pub timestamp: i64,
    pub value: f64,
}

impl SensorReading {
    /// Composite identity key
    pub fn key(&self) -> (&str, i64) {
        (&self.sensor_id, self.timestamp)
    }

    /// Whether the value is a finite number
    pub fn is_well_formed(&self) -> bool {
        self.value.is_finite()
    }
}
