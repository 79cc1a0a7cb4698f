//! Storage Backend Trait

use crate::StorageResult;
use async_trait::async_trait;
use sensor_model::{
    ReadingFilter, Sensor, SensorFilter, SensorReading, SensorType, SensorTypeFilter,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which storage implementation backs a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local collections, lost on drop
    #[default]
    Transient,
    /// SQLite database
    Persistent,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Transient => "transient",
            BackendKind::Persistent => "persistent",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Insert/replace/query contract shared by every backend.
///
/// Inserts never overwrite: a taken key fails with
/// [`StorageError::Exists`](crate::StorageError::Exists). Replacements only
/// overwrite: a missing key fails with
/// [`StorageError::NotFound`](crate::StorageError::NotFound). Queries return
/// sensor types and sensors sorted by id and readings sorted by timestamp.
///
/// Writes take `&mut self`; no backend locks internally.
#[async_trait]
pub trait SensorStore: Send + Sync {
    fn backend(&self) -> BackendKind;

    async fn insert_sensor_type(&mut self, sensor_type: &SensorType) -> StorageResult<()>;

    async fn replace_sensor_type(&mut self, sensor_type: &SensorType) -> StorageResult<()>;

    async fn insert_sensor(&mut self, sensor: &Sensor) -> StorageResult<()>;

    async fn replace_sensor(&mut self, sensor: &Sensor) -> StorageResult<()>;

    /// Insert a reading keyed by `(sensor_id, timestamp)`
    async fn insert_reading(&mut self, reading: &SensorReading) -> StorageResult<()>;

    /// Overwrite the value of the reading with the same key
    async fn replace_reading(&mut self, reading: &SensorReading) -> StorageResult<()>;

    async fn find_sensor_types(&self, filter: &SensorTypeFilter) -> StorageResult<Vec<SensorType>>;

    async fn find_sensors(&self, filter: &SensorFilter) -> StorageResult<Vec<Sensor>>;

    /// Readings of one sensor within the filter bounds; empty for an
    /// unknown sensor
    async fn find_readings(&self, filter: &ReadingFilter) -> StorageResult<Vec<SensorReading>>;

    /// Remove everything from all three collections
    async fn clear(&mut self) -> StorageResult<()>;

    /// Release connections; the store must not be used afterwards
    async fn close(&mut self) -> StorageResult<()>;
}
