//! Bulk Loader
//!
//! Applies batches of raw requests in dependency order: sensor types, then
//! sensors, then readings. The first failure aborts the batch; entries
//! already written stay written.

use crate::error::RegistryError;
use crate::registry::Registry;
use data_validator::{flat_req_from_json, FlatReq, ValidationError, Validator};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// Raw requests to load, one list per entity kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedBatch {
    pub sensor_types: Vec<FlatReq>,
    pub sensors: Vec<FlatReq>,
    pub sensor_readings: Vec<FlatReq>,
}

impl SeedBatch {
    /// Parse `{"sensorTypes": [...], "sensors": [...], "sensorReadings": [...]}`;
    /// every list is optional
    pub fn from_json(value: &Value) -> Result<Self, RegistryError> {
        Ok(Self {
            sensor_types: section(value, "sensorTypes")?,
            sensors: section(value, "sensors")?,
            sensor_readings: section(value, "sensorReadings")?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.sensor_types.is_empty() && self.sensors.is_empty() && self.sensor_readings.is_empty()
    }
}

fn section(value: &Value, name: &str) -> Result<Vec<FlatReq>, RegistryError> {
    match value.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| flat_req_from_json(item).map_err(RegistryError::from))
            .collect(),
        Some(other) => Err(ValidationError::BadValue {
            field: name.to_string(),
            value: other.to_string(),
            expected: "an array",
        }
        .into()),
    }
}

/// Number of entries applied per entity kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSummary {
    pub sensor_types: usize,
    pub sensors: usize,
    pub sensor_readings: usize,
}

/// Validate and add every entry of `batch`, stopping at the first failure
pub async fn load_batch(
    registry: &mut Registry,
    validator: &Validator,
    batch: &SeedBatch,
) -> Result<LoadSummary, RegistryError> {
    let mut summary = LoadSummary::default();

    for (index, req) in batch.sensor_types.iter().enumerate() {
        let sensor_type = validator
            .sensor_type(req)
            .map_err(RegistryError::from)
            .map_err(|e| aborted("sensor type", index, e))?;
        registry
            .add_sensor_type(sensor_type)
            .await
            .map_err(|e| aborted("sensor type", index, e))?;
        summary.sensor_types += 1;
    }

    for (index, req) in batch.sensors.iter().enumerate() {
        let sensor = validator
            .sensor(req)
            .map_err(RegistryError::from)
            .map_err(|e| aborted("sensor", index, e))?;
        registry
            .add_sensor(sensor)
            .await
            .map_err(|e| aborted("sensor", index, e))?;
        summary.sensors += 1;
    }

    for (index, req) in batch.sensor_readings.iter().enumerate() {
        let reading = validator
            .sensor_reading(req)
            .map_err(RegistryError::from)
            .map_err(|e| aborted("sensor reading", index, e))?;
        registry
            .add_sensor_reading(reading)
            .await
            .map_err(|e| aborted("sensor reading", index, e))?;
        summary.sensor_readings += 1;
    }

    info!(
        "Loaded {} sensor types, {} sensors, {} readings",
        summary.sensor_types, summary.sensors, summary.sensor_readings
    );
    Ok(summary)
}

fn aborted(entity: &str, index: usize, err: RegistryError) -> RegistryError {
    warn!("Bulk load aborted at {} #{}: {}", entity, index, err);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_model::{ErrorKind, ReadingFilter, SensorTypeFilter};
    use serde_json::json;

    fn seed() -> Value {
        json!({
            "sensorTypes": [
                {"id": "t1", "manufacturer": "Acme", "modelNumber": "A1",
                 "quantity": "temperature", "limits": {"min": 0, "max": 100}},
            ],
            "sensors": [
                {"id": "s1", "sensorTypeId": "t1", "expected": {"min": 10, "max": 90}},
            ],
            "sensorReadings": [
                {"sensorId": "s1", "timestamp": 200, "value": 5},
                {"sensorId": "s1", "timestamp": 100, "value": 1},
            ],
        })
    }

    #[tokio::test]
    async fn test_loads_in_order() {
        let batch = SeedBatch::from_json(&seed()).unwrap();
        let mut registry = Registry::transient();
        let summary = load_batch(&mut registry, &Validator::default(), &batch)
            .await
            .unwrap();
        assert_eq!(
            summary,
            LoadSummary {
                sensor_types: 1,
                sensors: 1,
                sensor_readings: 2
            }
        );
        let readings = registry
            .find_sensor_readings(&ReadingFilter::new("s1"))
            .await
            .unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].timestamp, 100);
    }

    #[tokio::test]
    async fn test_aborts_at_first_failure_without_rollback() {
        let mut value = seed();
        value["sensors"] = json!([
            {"id": "s1", "sensorTypeId": "t1", "min": 10, "max": 90},
            {"id": "s2", "sensorTypeId": "t9", "min": 10, "max": 90},
            {"id": "s3", "sensorTypeId": "t1", "min": 10, "max": 90},
        ]);
        let batch = SeedBatch::from_json(&value).unwrap();

        let mut registry = Registry::transient();
        let err = load_batch(&mut registry, &Validator::default(), &batch)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadId);

        let types = registry
            .find_sensor_types(&SensorTypeFilter::new())
            .await
            .unwrap();
        assert_eq!(types.len(), 1);
        let sensors = registry
            .find_sensors(&Default::default())
            .await
            .unwrap();
        assert_eq!(sensors.len(), 1);
        assert!(registry
            .find_sensor_readings(&ReadingFilter::new("s1"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_validation_failure_aborts() {
        let mut value = seed();
        value["sensorTypes"][0]["manufacturer"] = Value::Null;
        let batch = SeedBatch::from_json(&value).unwrap();

        let mut registry = Registry::transient();
        let err = load_batch(&mut registry, &Validator::default(), &batch)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Required);
        assert_eq!(err.field(), Some("manufacturer"));
    }

    #[test]
    fn test_sections_must_be_arrays() {
        assert!(SeedBatch::from_json(&json!({})).unwrap().is_empty());
        let err = SeedBatch::from_json(&json!({"sensors": {"id": "s1"}})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadVal);
    }
}
