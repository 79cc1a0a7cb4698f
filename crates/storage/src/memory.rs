//! In-Memory Store

use crate::backend::{BackendKind, SensorStore};
use crate::{reading_key, StorageError, StorageResult};
use async_trait::async_trait;
use sensor_model::{
    ReadingFilter, Sensor, SensorFilter, SensorReading, SensorType, SensorTypeFilter,
};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::ops::Bound;
use tracing::{debug, info};

/// Transient store over ordered maps.
///
/// Sensor types and sensors are keyed by id and readings by sensor id then
/// timestamp, so iteration order is already the query sort order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sensor_types: BTreeMap<String, SensorType>,
    sensors: BTreeMap<String, Sensor>,
    readings: BTreeMap<String, BTreeMap<i64, SensorReading>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        info!("Creating in-memory sensor store");
        Self::default()
    }

    /// Total number of stored readings
    pub fn reading_count(&self) -> usize {
        self.readings.values().map(BTreeMap::len).sum()
    }
}

#[async_trait]
impl SensorStore for MemoryStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Transient
    }

    async fn insert_sensor_type(&mut self, sensor_type: &SensorType) -> StorageResult<()> {
        match self.sensor_types.entry(sensor_type.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::Exists {
                entity: "sensor type",
                key: sensor_type.id.clone(),
            }),
            Entry::Vacant(slot) => {
                debug!("Inserted sensor type {}", sensor_type.id);
                slot.insert(sensor_type.clone());
                Ok(())
            }
        }
    }

    async fn replace_sensor_type(&mut self, sensor_type: &SensorType) -> StorageResult<()> {
        let stored = self
            .sensor_types
            .get_mut(&sensor_type.id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "sensor type",
                key: sensor_type.id.clone(),
            })?;
        *stored = sensor_type.clone();
        debug!("Replaced sensor type {}", sensor_type.id);
        Ok(())
    }

    async fn insert_sensor(&mut self, sensor: &Sensor) -> StorageResult<()> {
        match self.sensors.entry(sensor.id.clone()) {
            Entry::Occupied(_) => Err(StorageError::Exists {
                entity: "sensor",
                key: sensor.id.clone(),
            }),
            Entry::Vacant(slot) => {
                debug!("Inserted sensor {}", sensor.id);
                slot.insert(sensor.clone());
                Ok(())
            }
        }
    }

    async fn replace_sensor(&mut self, sensor: &Sensor) -> StorageResult<()> {
        let stored = self
            .sensors
            .get_mut(&sensor.id)
            .ok_or_else(|| StorageError::NotFound {
                entity: "sensor",
                key: sensor.id.clone(),
            })?;
        *stored = sensor.clone();
        debug!("Replaced sensor {}", sensor.id);
        Ok(())
    }

    async fn insert_reading(&mut self, reading: &SensorReading) -> StorageResult<()> {
        let sequence = self.readings.entry(reading.sensor_id.clone()).or_default();
        match sequence.entry(reading.timestamp) {
            Entry::Occupied(_) => Err(StorageError::Exists {
                entity: "sensor reading",
                key: reading_key(&reading.sensor_id, reading.timestamp),
            }),
            Entry::Vacant(slot) => {
                slot.insert(reading.clone());
                Ok(())
            }
        }
    }

    async fn replace_reading(&mut self, reading: &SensorReading) -> StorageResult<()> {
        let stored = self
            .readings
            .get_mut(&reading.sensor_id)
            .and_then(|sequence| sequence.get_mut(&reading.timestamp))
            .ok_or_else(|| StorageError::NotFound {
                entity: "sensor reading",
                key: reading_key(&reading.sensor_id, reading.timestamp),
            })?;
        stored.value = reading.value;
        Ok(())
    }

    async fn find_sensor_types(&self, filter: &SensorTypeFilter) -> StorageResult<Vec<SensorType>> {
        Ok(self
            .sensor_types
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn find_sensors(&self, filter: &SensorFilter) -> StorageResult<Vec<Sensor>> {
        Ok(self
            .sensors
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    async fn find_readings(&self, filter: &ReadingFilter) -> StorageResult<Vec<SensorReading>> {
        // BTreeMap::range panics on inverted bounds
        if filter.is_empty() {
            return Ok(Vec::new());
        }
        let Some(sequence) = self.readings.get(&filter.sensor_id) else {
            return Ok(Vec::new());
        };
        let lower = filter.timestamp.min.map_or(Bound::Unbounded, Bound::Included);
        let upper = filter.timestamp.max.map_or(Bound::Unbounded, Bound::Included);

        Ok(sequence
            .range((lower, upper))
            .map(|(_, reading)| reading)
            .filter(|reading| filter.value.contains(reading.value))
            .cloned()
            .collect())
    }

    async fn clear(&mut self) -> StorageResult<()> {
        self.sensor_types.clear();
        self.sensors.clear();
        self.readings.clear();
        info!("Cleared in-memory sensor store");
        Ok(())
    }

    async fn close(&mut self) -> StorageResult<()> {
        self.clear().await
    }
}
