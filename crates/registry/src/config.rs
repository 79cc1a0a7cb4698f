//! Registry Configuration

use crate::error::RegistryError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use storage::BackendKind;

/// Environment variable prefix, e.g. `SENSORS_BACKEND=persistent`
pub const ENV_PREFIX: &str = "SENSORS";

/// How a write treats an id that is already stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Insert, or replace the stored record under the same id
    #[default]
    Upsert,
    /// Insert only; an existing id fails with `EXISTS`
    InsertOnly,
}

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Storage backend
    pub backend: BackendKind,
    /// SQLite URL, required for the persistent backend
    pub database_url: Option<String>,
    /// Pool size for file-backed databases
    pub max_connections: u32,
    /// Policy for re-registering a sensor type id
    pub sensor_type_policy: WritePolicy,
    /// Policy for re-registering a sensor id
    pub sensor_policy: WritePolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Transient,
            database_url: None,
            max_connections: 4,
            sensor_type_policy: WritePolicy::Upsert,
            sensor_policy: WritePolicy::Upsert,
        }
    }
}

impl RegistryConfig {
    /// Persistent configuration for `database_url`
    pub fn persistent(database_url: impl Into<String>) -> Self {
        Self {
            backend: BackendKind::Persistent,
            database_url: Some(database_url.into()),
            ..Self::default()
        }
    }

    /// Load through [`load_config`]
    pub fn load(path: Option<&Path>) -> Result<Self, RegistryError> {
        load_config(path)
    }
}

/// Deserialize `T` from an optional config file (TOML, JSON, YAML...)
/// overlaid with `SENSORS_*` environment variables
pub fn load_config<T: DeserializeOwned>(path: Option<&Path>) -> Result<T, RegistryError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| RegistryError::Config(e.to_string()))
}
