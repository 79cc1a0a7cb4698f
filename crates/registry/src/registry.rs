//! Registry Facade
//!
//! Orchestrates validation order, referential checks and write policy over
//! whichever [`SensorStore`] it was built with. Cross-entity checks always
//! run before the first write, so a rejected request leaves the store
//! untouched.

use crate::config::{RegistryConfig, WritePolicy};
use crate::error::RegistryError;
use sensor_model::{
    ReadingFilter, Sensor, SensorFilter, SensorReading, SensorType, SensorTypeFilter,
};
use storage::{BackendKind, MemoryStore, SensorStore, SqliteStore, StorageError};
use tracing::{debug, info, warn};

/// Sensor registry over one storage backend
pub struct Registry {
    store: Box<dyn SensorStore>,
    sensor_type_policy: WritePolicy,
    sensor_policy: WritePolicy,
}

impl Registry {
    /// Create a registry over `store` with upsert policies
    pub fn new(store: impl SensorStore + 'static) -> Self {
        info!("Creating {} sensor registry", store.backend());
        Self {
            store: Box::new(store),
            sensor_type_policy: WritePolicy::Upsert,
            sensor_policy: WritePolicy::Upsert,
        }
    }

    /// Create a registry over a fresh in-memory store
    pub fn transient() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Build the backend described by `config`
    pub async fn connect(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let registry = match config.backend {
            BackendKind::Transient => Self::transient(),
            BackendKind::Persistent => {
                let url = config.database_url.as_deref().ok_or_else(|| {
                    RegistryError::Config("persistent backend requires database_url".to_string())
                })?;
                Self::new(SqliteStore::connect(url, config.max_connections).await?)
            }
        };
        Ok(registry.with_policies(config.sensor_type_policy, config.sensor_policy))
    }

    /// Set the write policies for sensor types and sensors
    pub fn with_policies(mut self, sensor_type: WritePolicy, sensor: WritePolicy) -> Self {
        self.sensor_type_policy = sensor_type;
        self.sensor_policy = sensor;
        self
    }

    pub fn backend(&self) -> BackendKind {
        self.store.backend()
    }

    /// Register a sensor type, returning the stored value
    pub async fn add_sensor_type(&mut self, sensor_type: SensorType) -> Result<SensorType, RegistryError> {
        let result = self.write_sensor_type(sensor_type).await;
        record("sensor_type", result)
    }

    /// Register a sensor of a known type whose expected range lies within
    /// the type's limits
    pub async fn add_sensor(&mut self, sensor: Sensor) -> Result<Sensor, RegistryError> {
        let result = self.write_sensor(sensor).await;
        record("sensor", result)
    }

    /// Insert or overwrite a reading of a known sensor.
    ///
    /// Returns the sensor's full reading sequence after the write, ordered by
    /// timestamp.
    pub async fn add_sensor_reading(
        &mut self,
        reading: SensorReading,
    ) -> Result<Vec<SensorReading>, RegistryError> {
        let result = self.write_reading(reading).await;
        record("sensor_reading", result)
    }

    /// Sensor types matching `filter`, sorted by id
    pub async fn find_sensor_types(
        &self,
        filter: &SensorTypeFilter,
    ) -> Result<Vec<SensorType>, RegistryError> {
        let found = self.store.find_sensor_types(filter).await?;
        debug!("Found {} sensor types", found.len());
        Ok(found)
    }

    /// Sensors matching `filter`, sorted by id
    pub async fn find_sensors(&self, filter: &SensorFilter) -> Result<Vec<Sensor>, RegistryError> {
        let found = self.store.find_sensors(filter).await?;
        debug!("Found {} sensors", found.len());
        Ok(found)
    }

    /// Readings of one sensor within the filter bounds, sorted by timestamp
    pub async fn find_sensor_readings(
        &self,
        filter: &ReadingFilter,
    ) -> Result<Vec<SensorReading>, RegistryError> {
        let found = self.store.find_readings(filter).await?;
        debug!("Found {} readings for sensor {}", found.len(), filter.sensor_id);
        Ok(found)
    }

    /// Remove all sensor types, sensors and readings
    pub async fn clear(&mut self) -> Result<(), RegistryError> {
        self.store.clear().await?;
        info!("Cleared sensor registry");
        Ok(())
    }

    /// Close the backend, consuming the registry
    pub async fn close(mut self) -> Result<(), RegistryError> {
        self.store.close().await?;
        info!("Closed {} sensor registry", self.store.backend());
        Ok(())
    }

    async fn write_sensor_type(&mut self, sensor_type: SensorType) -> Result<SensorType, RegistryError> {
        let limits = sensor_type.limits;
        if !limits.is_well_formed() {
            return Err(RegistryError::BadRange {
                field: "limits",
                message: format!(
                    "limits [{}, {}] of sensor type {} must have min < max",
                    limits.min, limits.max, sensor_type.id
                ),
            });
        }

        match self.store.insert_sensor_type(&sensor_type).await {
            Err(StorageError::Exists { .. }) if self.sensor_type_policy == WritePolicy::Upsert => {
                self.store.replace_sensor_type(&sensor_type).await?;
            }
            result => result?,
        }
        Ok(sensor_type)
    }

    async fn write_sensor(&mut self, sensor: Sensor) -> Result<Sensor, RegistryError> {
        let sensor_type = self
            .store
            .find_sensor_types(&SensorTypeFilter::by_id(sensor.sensor_type_id.as_str()))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::BadId {
                field: "sensorTypeId",
                message: format!(
                    "unknown sensor type {} for sensor {}",
                    sensor.sensor_type_id, sensor.id
                ),
            })?;

        let expected = sensor.expected;
        if !expected.is_well_formed() || !expected.is_subrange_of(&sensor_type.limits) {
            return Err(RegistryError::BadRange {
                field: "expected",
                message: format!(
                    "expected range [{}, {}] of sensor {} is inconsistent with limits [{}, {}] of sensor type {}",
                    expected.min,
                    expected.max,
                    sensor.id,
                    sensor_type.limits.min,
                    sensor_type.limits.max,
                    sensor_type.id
                ),
            });
        }

        match self.store.insert_sensor(&sensor).await {
            Err(StorageError::Exists { .. }) if self.sensor_policy == WritePolicy::Upsert => {
                self.store.replace_sensor(&sensor).await?;
            }
            result => result?,
        }
        Ok(sensor)
    }

    async fn write_reading(&mut self, reading: SensorReading) -> Result<Vec<SensorReading>, RegistryError> {
        if !reading.is_well_formed() {
            return Err(RegistryError::BadValue {
                field: "value",
                message: format!(
                    "value {} of reading {}@{} must be a finite number",
                    reading.value, reading.sensor_id, reading.timestamp
                ),
            });
        }

        let known = self
            .store
            .find_sensors(&SensorFilter::by_id(reading.sensor_id.as_str()))
            .await?;
        if known.is_empty() {
            return Err(RegistryError::BadId {
                field: "sensorId",
                message: format!("unknown sensor {}", reading.sensor_id),
            });
        }

        // Readings always upsert by (sensor_id, timestamp)
        match self.store.insert_reading(&reading).await {
            Err(StorageError::Exists { .. }) => self.store.replace_reading(&reading).await?,
            result => result?,
        }

        let sequence = self
            .store
            .find_readings(&ReadingFilter::new(reading.sensor_id.as_str()))
            .await?;
        Ok(sequence)
    }
}

/// Count and log the outcome of a write
fn record<T>(entity: &'static str, result: Result<T, RegistryError>) -> Result<T, RegistryError> {
    match &result {
        Ok(_) => {
            metrics::counter!("registry_writes_total", "entity" => entity).increment(1);
        }
        Err(err) => {
            warn!("Rejected {} write: {} ({})", entity, err, err.kind());
            metrics::counter!("registry_rejections_total", "kind" => err.kind().as_str())
                .increment(1);
        }
    }
    result
}

/// Build a registry on `backend`; `connection_target` is the database URL and
/// is required for [`BackendKind::Persistent`]
pub async fn make_registry(
    backend: BackendKind,
    connection_target: Option<&str>,
) -> Result<Registry, RegistryError> {
    let config = RegistryConfig {
        backend,
        database_url: connection_target.map(str::to_string),
        ..RegistryConfig::default()
    };
    Registry::connect(&config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_model::{ErrorKind, Range};

    fn sensor_type(id: &str, min: f64, max: f64) -> SensorType {
        SensorType {
            id: id.to_string(),
            manufacturer: "Acme".to_string(),
            model_number: "A1".to_string(),
            quantity: "temperature".to_string(),
            limits: Range { min, max },
        }
    }

    fn sensor(id: &str, sensor_type_id: &str, min: f64, max: f64) -> Sensor {
        Sensor {
            id: id.to_string(),
            sensor_type_id: sensor_type_id.to_string(),
            expected: Range { min, max },
        }
    }

    #[tokio::test]
    async fn test_rejects_malformed_limits() {
        let mut registry = Registry::transient();
        let err = registry
            .add_sensor_type(sensor_type("t1", 100.0, 0.0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRange);
        assert_eq!(err.field(), Some("limits"));
        assert!(registry
            .find_sensor_types(&SensorTypeFilter::new())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_checked_before_range() {
        let mut registry = Registry::transient();
        let err = registry
            .add_sensor(sensor("s1", "missing", 10.0, 0.0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadId);
        assert_eq!(err.field(), Some("sensorTypeId"));
    }

    #[tokio::test]
    async fn test_insert_only_policy_surfaces_exists() {
        let mut registry =
            Registry::transient().with_policies(WritePolicy::InsertOnly, WritePolicy::InsertOnly);
        registry.add_sensor_type(sensor_type("t1", 0.0, 100.0)).await.unwrap();
        let err = registry
            .add_sensor_type(sensor_type("t1", 0.0, 50.0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Exists);

        registry.add_sensor(sensor("s1", "t1", 10.0, 20.0)).await.unwrap();
        let err = registry
            .add_sensor(sensor("s1", "t1", 10.0, 30.0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Exists);
    }

    #[tokio::test]
    async fn test_readings_upsert_under_insert_only_policy() {
        let mut registry =
            Registry::transient().with_policies(WritePolicy::InsertOnly, WritePolicy::InsertOnly);
        registry.add_sensor_type(sensor_type("t1", 0.0, 100.0)).await.unwrap();
        registry.add_sensor(sensor("s1", "t1", 10.0, 20.0)).await.unwrap();

        let reading = |value| SensorReading {
            sensor_id: "s1".to_string(),
            timestamp: 5,
            value,
        };
        registry.add_sensor_reading(reading(1.0)).await.unwrap();
        let sequence = registry.add_sensor_reading(reading(2.0)).await.unwrap();
        assert_eq!(sequence, vec![reading(2.0)]);
    }

    #[tokio::test]
    async fn test_persistent_requires_target() {
        let err = make_registry(BackendKind::Persistent, None).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Db);

        let registry = make_registry(BackendKind::Transient, None).await.unwrap();
        assert_eq!(registry.backend(), BackendKind::Transient);
        registry.close().await.unwrap();
    }
}
