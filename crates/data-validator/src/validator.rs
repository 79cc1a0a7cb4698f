//! Flat Request Validator
//!
//! Builds typed entities and filters out of [`FlatReq`] maps, checking
//! required fields, numeric syntax and range ordering. Cross-entity checks
//! (references, subranges) belong to the registry.

use crate::error::ValidationError;
use crate::request::FlatReq;
use sensor_model::{
    FieldFilter, FilterField, ReadingFilter, Range, Sensor, SensorFilter, SensorReading,
    SensorType, SensorTypeFilter,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

const SENSOR_TYPE_FIELDS: &[&str] = &["id", "manufacturer", "modelNumber", "quantity", "min", "max"];
const SENSOR_FIELDS: &[&str] = &["id", "sensorTypeId", "min", "max"];
const READING_FIELDS: &[&str] = &["sensorId", "timestamp", "value"];
const READING_FILTER_FIELDS: &[&str] = &[
    "sensorId",
    "minValue",
    "maxValue",
    "minTimestamp",
    "maxTimestamp",
];

/// Validation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Reject add requests carrying fields the entity does not have
    #[serde(default)]
    pub reject_unknown_fields: bool,
}

/// Validator for flat sensor requests
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    /// Create a new validator with given config
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Build a sensor type; limits come from `min`/`max`
    pub fn sensor_type(&self, req: &FlatReq) -> Result<SensorType, ValidationError> {
        self.check_fields(req, SENSOR_TYPE_FIELDS)?;
        let id = required(req, "id")?;
        let manufacturer = required(req, "manufacturer")?;
        let model_number = required(req, "modelNumber")?;
        let quantity = required(req, "quantity")?;
        let limits = range(req, "limits")?;

        Ok(SensorType {
            id: id.to_string(),
            manufacturer: manufacturer.to_string(),
            model_number: model_number.to_string(),
            quantity: quantity.to_string(),
            limits,
        })
    }

    /// Build a sensor; expected range comes from `min`/`max`
    pub fn sensor(&self, req: &FlatReq) -> Result<Sensor, ValidationError> {
        self.check_fields(req, SENSOR_FIELDS)?;
        let id = required(req, "id")?;
        let sensor_type_id = required(req, "sensorTypeId")?;
        let expected = range(req, "expected")?;

        Ok(Sensor {
            id: id.to_string(),
            sensor_type_id: sensor_type_id.to_string(),
            expected,
        })
    }

    /// Build a sensor reading
    pub fn sensor_reading(&self, req: &FlatReq) -> Result<SensorReading, ValidationError> {
        self.check_fields(req, READING_FIELDS)?;
        let sensor_id = required(req, "sensorId")?;
        let timestamp = required(req, "timestamp")?;
        let value = required(req, "value")?;

        Ok(SensorReading {
            sensor_id: sensor_id.to_string(),
            timestamp: integer("timestamp", timestamp)?,
            value: number("value", value)?,
        })
    }

    /// Build a sensor type filter; blank values are ignored
    pub fn sensor_type_filter(&self, req: &FlatReq) -> Result<SensorTypeFilter, ValidationError> {
        field_filter(req)
    }

    /// Build a sensor filter; blank values are ignored
    pub fn sensor_filter(&self, req: &FlatReq) -> Result<SensorFilter, ValidationError> {
        field_filter(req)
    }

    /// Build a reading filter; `sensorId` is required, bounds are optional
    pub fn reading_filter(&self, req: &FlatReq) -> Result<ReadingFilter, ValidationError> {
        if let Some(name) = req.keys().find(|k| !READING_FILTER_FIELDS.contains(&k.as_str())) {
            return Err(ValidationError::UnknownField(name.clone()));
        }
        let mut filter = ReadingFilter::new(required(req, "sensorId")?);
        if let Some(text) = optional(req, "minValue") {
            filter = filter.min_value(number("minValue", text)?);
        }
        if let Some(text) = optional(req, "maxValue") {
            filter = filter.max_value(number("maxValue", text)?);
        }
        if let Some(text) = optional(req, "minTimestamp") {
            filter = filter.min_timestamp(integer("minTimestamp", text)?);
        }
        if let Some(text) = optional(req, "maxTimestamp") {
            filter = filter.max_timestamp(integer("maxTimestamp", text)?);
        }
        Ok(filter)
    }

    fn check_fields(&self, req: &FlatReq, allowed: &[&str]) -> Result<(), ValidationError> {
        if !self.config.reject_unknown_fields {
            return Ok(());
        }
        match req.keys().find(|k| !allowed.contains(&k.as_str())) {
            Some(name) => {
                debug!("Rejecting unknown field {}", name);
                Err(ValidationError::UnknownField(name.clone()))
            }
            None => Ok(()),
        }
    }
}

fn optional<'a>(req: &'a FlatReq, field: &str) -> Option<&'a str> {
    req.get(field).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn required<'a>(req: &'a FlatReq, field: &str) -> Result<&'a str, ValidationError> {
    optional(req, field).ok_or_else(|| ValidationError::MissingField(field.to_string()))
}

fn number(field: &str, text: &str) -> Result<f64, ValidationError> {
    text.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ValidationError::BadValue {
            field: field.to_string(),
            value: text.to_string(),
            expected: "a finite number",
        })
}

fn integer(field: &str, text: &str) -> Result<i64, ValidationError> {
    text.parse::<i64>().map_err(|_| ValidationError::BadValue {
        field: field.to_string(),
        value: text.to_string(),
        expected: "an integer",
    })
}

/// Range from the flattened `min`/`max` fields, reported under `name`
fn range(req: &FlatReq, name: &str) -> Result<Range, ValidationError> {
    let min = number("min", required(req, "min")?)?;
    let max = number("max", required(req, "max")?)?;
    Range::new(min, max).map_err(|_| ValidationError::BadRange {
        field: name.to_string(),
        min,
        max,
    })
}

fn field_filter<F: FilterField>(req: &FlatReq) -> Result<FieldFilter<F>, ValidationError> {
    let pairs = req
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k.as_str(), v.trim()));
    Ok(FieldFilter::from_pairs(pairs)?)
}
