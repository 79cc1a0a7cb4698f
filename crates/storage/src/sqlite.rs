//! SQLite Store
//!
//! Persistent backend over a `sqlx` SQLite pool.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE sensor_types (id, manufacturer, model_number, quantity, limits_min, limits_max);
//! CREATE UNIQUE INDEX idx_sensor_types_id ON sensor_types(id);
//! CREATE TABLE sensors (id, sensor_type_id, expected_min, expected_max);
//! CREATE UNIQUE INDEX idx_sensors_id ON sensors(id);
//! CREATE INDEX idx_sensors_sensor_type_id ON sensors(sensor_type_id);
//! CREATE TABLE sensor_readings (sensor_id, timestamp, value);
//! CREATE UNIQUE INDEX idx_sensor_readings_key ON sensor_readings(sensor_id, timestamp);
//! ```
//!
//! Uniqueness lives in the indexes, so inserts surface duplicates as
//! [`StorageError::Exists`]. Filters become `column = ?` and `>=`/`<=`
//! clauses joined with `AND`.

use crate::backend::{BackendKind, SensorStore};
use crate::{reading_key, StorageError, StorageResult};
use async_trait::async_trait;
use sensor_model::{
    FilterField, Range, ReadingFilter, Sensor, SensorField, SensorFilter, SensorReading,
    SensorType, SensorTypeField, SensorTypeFilter,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sensor_types (
        id TEXT NOT NULL,
        manufacturer TEXT NOT NULL,
        model_number TEXT NOT NULL,
        quantity TEXT NOT NULL,
        limits_min REAL NOT NULL,
        limits_max REAL NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_sensor_types_id ON sensor_types(id)",
    "CREATE TABLE IF NOT EXISTS sensors (
        id TEXT NOT NULL,
        sensor_type_id TEXT NOT NULL,
        expected_min REAL NOT NULL,
        expected_max REAL NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_sensors_id ON sensors(id)",
    "CREATE INDEX IF NOT EXISTS idx_sensors_sensor_type_id ON sensors(sensor_type_id)",
    "CREATE TABLE IF NOT EXISTS sensor_readings (
        sensor_id TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        value REAL NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_sensor_readings_key
        ON sensor_readings(sensor_id, timestamp)",
];

const SELECT_SENSOR_TYPES: &str =
    "SELECT id, manufacturer, model_number, quantity, limits_min, limits_max FROM sensor_types";
const SELECT_SENSORS: &str = "SELECT id, sensor_type_id, expected_min, expected_max FROM sensors";

/// SQLite-backed persistent store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and initialize the
    /// schema.
    ///
    /// In-memory URLs are pinned to a single long-lived connection, since
    /// every SQLite connection would otherwise see its own empty database.
    ///
    /// # Example
    /// ```ignore
    /// let store = SqliteStore::connect("sqlite://sensors.db", 4).await?;
    /// ```
    pub async fn connect(url: &str, max_connections: u32) -> StorageResult<Self> {
        info!("Opening SQLite sensor store at {}", url);

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StorageError::ConnectionError(format!("invalid url {}: {}", url, e)))?
            .create_if_missing(true);

        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionError(format!("failed to connect: {}", e)))?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, initializing the schema
    pub async fn from_pool(pool: SqlitePool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> StorageResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::DatabaseError(format!("failed to create schema: {}", e)))?;
        }
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Map a write failure, singling out unique-index violations
fn write_error(err: sqlx::Error, entity: &'static str, key: String) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StorageError::Exists { entity, key };
        }
    }
    StorageError::DatabaseError(err.to_string())
}

fn db_error(err: sqlx::Error) -> StorageError {
    StorageError::DatabaseError(err.to_string())
}

fn sensor_type_column(field: SensorTypeField) -> &'static str {
    match field {
        SensorTypeField::Id => "id",
        SensorTypeField::Manufacturer => "manufacturer",
        SensorTypeField::ModelNumber => "model_number",
        SensorTypeField::Quantity => "quantity",
    }
}

fn sensor_column(field: SensorField) -> &'static str {
    match field {
        SensorField::Id => "id",
        SensorField::SensorTypeId => "sensor_type_id",
    }
}

fn push_equality_clauses<F: FilterField>(
    query: &mut QueryBuilder<'_, Sqlite>,
    clauses: &[(F, String)],
    column: fn(F) -> &'static str,
) {
    for (i, (field, value)) in clauses.iter().enumerate() {
        query.push(if i == 0 { " WHERE " } else { " AND " });
        query.push(column(*field)).push(" = ").push_bind(value.clone());
    }
}

fn sensor_type_from_row(row: &SqliteRow) -> StorageResult<SensorType> {
    Ok(SensorType {
        id: row.try_get("id").map_err(db_error)?,
        manufacturer: row.try_get("manufacturer").map_err(db_error)?,
        model_number: row.try_get("model_number").map_err(db_error)?,
        quantity: row.try_get("quantity").map_err(db_error)?,
        limits: Range {
            min: row.try_get("limits_min").map_err(db_error)?,
            max: row.try_get("limits_max").map_err(db_error)?,
        },
    })
}

fn sensor_from_row(row: &SqliteRow) -> StorageResult<Sensor> {
    Ok(Sensor {
        id: row.try_get("id").map_err(db_error)?,
        sensor_type_id: row.try_get("sensor_type_id").map_err(db_error)?,
        expected: Range {
            min: row.try_get("expected_min").map_err(db_error)?,
            max: row.try_get("expected_max").map_err(db_error)?,
        },
    })
}

fn reading_from_row(row: &SqliteRow) -> StorageResult<SensorReading> {
    Ok(SensorReading {
        sensor_id: row.try_get("sensor_id").map_err(db_error)?,
        timestamp: row.try_get("timestamp").map_err(db_error)?,
        value: row.try_get("value").map_err(db_error)?,
    })
}

#[async_trait]
impl SensorStore for SqliteStore {
    fn backend(&self) -> BackendKind {
        BackendKind::Persistent
    }

    async fn insert_sensor_type(&mut self, sensor_type: &SensorType) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO sensor_types
                (id, manufacturer, model_number, quantity, limits_min, limits_max)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(sensor_type.id.as_str())
        .bind(sensor_type.manufacturer.as_str())
        .bind(sensor_type.model_number.as_str())
        .bind(sensor_type.quantity.as_str())
        .bind(sensor_type.limits.min)
        .bind(sensor_type.limits.max)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "sensor type", sensor_type.id.clone()))?;

        debug!("Inserted sensor type {}", sensor_type.id);
        Ok(())
    }

    async fn replace_sensor_type(&mut self, sensor_type: &SensorType) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE sensor_types
             SET manufacturer = ?, model_number = ?, quantity = ?, limits_min = ?, limits_max = ?
             WHERE id = ?",
        )
        .bind(sensor_type.manufacturer.as_str())
        .bind(sensor_type.model_number.as_str())
        .bind(sensor_type.quantity.as_str())
        .bind(sensor_type.limits.min)
        .bind(sensor_type.limits.max)
        .bind(sensor_type.id.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "sensor type",
                key: sensor_type.id.clone(),
            });
        }
        debug!("Replaced sensor type {}", sensor_type.id);
        Ok(())
    }

    async fn insert_sensor(&mut self, sensor: &Sensor) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO sensors (id, sensor_type_id, expected_min, expected_max)
             VALUES (?, ?, ?, ?)",
        )
        .bind(sensor.id.as_str())
        .bind(sensor.sensor_type_id.as_str())
        .bind(sensor.expected.min)
        .bind(sensor.expected.max)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "sensor", sensor.id.clone()))?;

        debug!("Inserted sensor {}", sensor.id);
        Ok(())
    }

    async fn replace_sensor(&mut self, sensor: &Sensor) -> StorageResult<()> {
        let result = sqlx::query(
            "UPDATE sensors SET sensor_type_id = ?, expected_min = ?, expected_max = ?
             WHERE id = ?",
        )
        .bind(sensor.sensor_type_id.as_str())
        .bind(sensor.expected.min)
        .bind(sensor.expected.max)
        .bind(sensor.id.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "sensor",
                key: sensor.id.clone(),
            });
        }
        debug!("Replaced sensor {}", sensor.id);
        Ok(())
    }

    async fn insert_reading(&mut self, reading: &SensorReading) -> StorageResult<()> {
        sqlx::query("INSERT INTO sensor_readings (sensor_id, timestamp, value) VALUES (?, ?, ?)")
            .bind(reading.sensor_id.as_str())
            .bind(reading.timestamp)
            .bind(reading.value)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                write_error(
                    e,
                    "sensor reading",
                    reading_key(&reading.sensor_id, reading.timestamp),
                )
            })?;
        Ok(())
    }

    async fn replace_reading(&mut self, reading: &SensorReading) -> StorageResult<()> {
        let result =
            sqlx::query("UPDATE sensor_readings SET value = ? WHERE sensor_id = ? AND timestamp = ?")
                .bind(reading.value)
                .bind(reading.sensor_id.as_str())
                .bind(reading.timestamp)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound {
                entity: "sensor reading",
                key: reading_key(&reading.sensor_id, reading.timestamp),
            });
        }
        Ok(())
    }

    async fn find_sensor_types(&self, filter: &SensorTypeFilter) -> StorageResult<Vec<SensorType>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_SENSOR_TYPES);
        push_equality_clauses(&mut query, filter.clauses(), sensor_type_column);
        query.push(" ORDER BY id ASC");

        let rows = query.build().fetch_all(&self.pool).await.map_err(db_error)?;
        debug!("Sensor type query matched {} rows", rows.len());
        rows.iter().map(sensor_type_from_row).collect()
    }

    async fn find_sensors(&self, filter: &SensorFilter) -> StorageResult<Vec<Sensor>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_SENSORS);
        push_equality_clauses(&mut query, filter.clauses(), sensor_column);
        query.push(" ORDER BY id ASC");

        let rows = query.build().fetch_all(&self.pool).await.map_err(db_error)?;
        debug!("Sensor query matched {} rows", rows.len());
        rows.iter().map(sensor_from_row).collect()
    }

    async fn find_readings(&self, filter: &ReadingFilter) -> StorageResult<Vec<SensorReading>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT sensor_id, timestamp, value FROM sensor_readings WHERE sensor_id = ",
        );
        query.push_bind(filter.sensor_id.clone());
        if let Some(min) = filter.value.min {
            query.push(" AND value >= ").push_bind(min);
        }
        if let Some(max) = filter.value.max {
            query.push(" AND value <= ").push_bind(max);
        }
        if let Some(min) = filter.timestamp.min {
            query.push(" AND timestamp >= ").push_bind(min);
        }
        if let Some(max) = filter.timestamp.max {
            query.push(" AND timestamp <= ").push_bind(max);
        }
        query.push(" ORDER BY timestamp ASC");

        let rows = query.build().fetch_all(&self.pool).await.map_err(db_error)?;
        rows.iter().map(reading_from_row).collect()
    }

    async fn clear(&mut self) -> StorageResult<()> {
        for statement in [
            "DELETE FROM sensor_readings",
            "DELETE FROM sensors",
            "DELETE FROM sensor_types",
        ] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
        }
        info!("Cleared SQLite sensor store");
        Ok(())
    }

    async fn close(&mut self) -> StorageResult<()> {
        info!("Closing SQLite sensor store");
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:", 1).await.unwrap()
    }

    fn sensor(id: &str, sensor_type_id: &str) -> Sensor {
        Sensor {
            id: id.to_string(),
            sensor_type_id: sensor_type_id.to_string(),
            expected: Range { min: 1.0, max: 2.0 },
        }
    }

    fn reading(sensor_id: &str, timestamp: i64, value: f64) -> SensorReading {
        SensorReading {
            sensor_id: sensor_id.to_string(),
            timestamp,
            value,
        }
    }

    #[tokio::test]
    async fn test_schema_indexes_created() {
        let store = memory_store().await;
        let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'index'")
            .fetch_all(store.pool())
            .await
            .unwrap();
        let names: Vec<String> = rows.iter().map(|r| r.get("name")).collect();
        for expected in [
            "idx_sensor_types_id",
            "idx_sensors_id",
            "idx_sensors_sensor_type_id",
            "idx_sensor_readings_key",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {}", expected);
        }
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_exists() {
        let mut store = memory_store().await;
        store.insert_sensor(&sensor("s1", "t1")).await.unwrap();
        let err = store.insert_sensor(&sensor("s1", "t2")).await.unwrap_err();
        assert!(matches!(err, StorageError::Exists { entity: "sensor", .. }));
        assert_eq!(err.kind(), sensor_model::ErrorKind::Exists);

        store.insert_reading(&reading("s1", 10, 1.0)).await.unwrap();
        store.insert_reading(&reading("s2", 10, 1.0)).await.unwrap();
        let err = store.insert_reading(&reading("s1", 10, 2.0)).await.unwrap_err();
        assert!(matches!(err, StorageError::Exists { .. }));
    }

    #[tokio::test]
    async fn test_replace_missing_is_not_found() {
        let mut store = memory_store().await;
        let err = store.replace_reading(&reading("s1", 10, 1.0)).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));

        store.insert_reading(&reading("s1", 10, 1.0)).await.unwrap();
        store.replace_reading(&reading("s1", 10, 4.0)).await.unwrap();
        let readings = store.find_readings(&ReadingFilter::new("s1")).await.unwrap();
        assert_eq!(readings, vec![reading("s1", 10, 4.0)]);
    }

    #[tokio::test]
    async fn test_filters_translate_to_clauses() {
        let mut store = memory_store().await;
        for (id, type_id) in [("s3", "t1"), ("s1", "t1"), ("s2", "t2")] {
            store.insert_sensor(&sensor(id, type_id)).await.unwrap();
        }

        let by_type = SensorFilter::new().with(SensorField::SensorTypeId, "t1");
        let ids: Vec<_> = store
            .find_sensors(&by_type)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, ["s1", "s3"]);

        let both = by_type.with(SensorField::Id, "s3");
        assert_eq!(store.find_sensors(&both).await.unwrap(), vec![sensor("s3", "t1")]);
    }

    #[tokio::test]
    async fn test_reading_bounds() {
        let mut store = memory_store().await;
        for (timestamp, value) in [(300, 9.0), (100, 1.0), (200, 5.0)] {
            store.insert_reading(&reading("s1", timestamp, value)).await.unwrap();
        }
        let filter = ReadingFilter::new("s1").min_timestamp(150).max_value(8.0);
        assert_eq!(
            store.find_readings(&filter).await.unwrap(),
            vec![reading("s1", 200, 5.0)]
        );

        let filter = ReadingFilter::new("s1").min_value(1.0).max_timestamp(200);
        let timestamps: Vec<_> = store
            .find_readings(&filter)
            .await
            .unwrap()
            .iter()
            .map(|r| r.timestamp)
            .collect();
        assert_eq!(timestamps, [100, 200]);
    }

    #[tokio::test]
    async fn test_clear_and_close() {
        let mut store = memory_store().await;
        store.insert_sensor(&sensor("s1", "t1")).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.find_sensors(&SensorFilter::new()).await.unwrap().is_empty());
        store.close().await.unwrap();
        assert!(store.pool().is_closed());
    }

    #[tokio::test]
    async fn test_unreachable_target_is_connection_error() {
        let err = SqliteStore::connect("sqlite:///nonexistent-dir/sub/sensors.db", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ConnectionError(_)));
        assert_eq!(err.kind(), sensor_model::ErrorKind::Db);
    }
}
