//! Storage Layer
//!
//! Holds sensor types, sensors and readings behind the [`SensorStore`] trait.
//! Two implementations share the contract:
//!
//! - [`MemoryStore`]: process-local ordered maps (transient)
//! - [`SqliteStore`]: SQLite through `sqlx` with unique indexes (persistent)
//!
//! Writes are insert-only or replace-existing; upsert policy is decided by
//! the caller on top of these primitives.

mod backend;
mod memory;
mod sqlite;

pub use backend::{BackendKind, SensorStore};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use sensor_model::ErrorKind;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Unique key already present
    #[error("{entity} {key} already exists")]
    Exists { entity: &'static str, key: String },
    /// Record to replace is absent
    #[error("{entity} {key} not found")]
    NotFound { entity: &'static str, key: String },
    /// Store could not be reached or opened
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Exists { .. } => ErrorKind::Exists,
            StorageError::NotFound { .. }
            | StorageError::ConnectionError(_)
            | StorageError::DatabaseError(_) => ErrorKind::Db,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Display key of a reading
pub(crate) fn reading_key(sensor_id: &str, timestamp: i64) -> String {
    format!("{}@{}", sensor_id, timestamp)
}
