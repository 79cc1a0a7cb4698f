//! Sensor Registry
//!
//! Records sensor types, sensors and their readings, enforcing:
//! - sensor type limits with `min < max`
//! - sensors that reference a known type and stay within its limits
//! - readings that reference a known sensor, upserted by `(sensor, timestamp)`
//!
//! The same facade runs over the in-memory or SQLite backend, chosen at
//! construction time through [`RegistryConfig`] or [`make_registry`].

mod config;
mod error;
pub mod loader;
mod registry;

pub use config::{load_config, RegistryConfig, WritePolicy, ENV_PREFIX};
pub use error::{ErrorReport, RegistryError};
pub use loader::{load_batch, LoadSummary, SeedBatch};
pub use registry::{make_registry, Registry};

pub use sensor_model::{
    Bounds, ErrorKind, Range, ReadingFilter, Sensor, SensorField, SensorFilter, SensorReading,
    SensorType, SensorTypeField, SensorTypeFilter,
};
pub use storage::BackendKind;
