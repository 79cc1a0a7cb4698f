//! Registry Error Types

use data_validator::ValidationError;
use sensor_model::{ErrorKind, FilterError};
use serde::Serialize;
use storage::StorageError;
use thiserror::Error;

/// Errors returned by registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Inverted range, or an expected range outside its type's limits
    #[error("{message}")]
    BadRange { field: &'static str, message: String },

    /// Reference to an unknown sensor type or sensor
    #[error("{message}")]
    BadId { field: &'static str, message: String },

    /// Field value the store cannot hold, such as a non-finite reading
    #[error("{message}")]
    BadValue { field: &'static str, message: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration could not be loaded or is incomplete
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::BadRange { .. } => ErrorKind::BadRange,
            RegistryError::BadId { .. } => ErrorKind::BadId,
            RegistryError::BadValue { .. } => ErrorKind::BadVal,
            RegistryError::Validation(err) => err.kind(),
            RegistryError::Storage(err) => err.kind(),
            RegistryError::Config(_) => ErrorKind::Db,
        }
    }

    /// Field that triggered the error, when known
    pub fn field(&self) -> Option<&str> {
        match self {
            RegistryError::BadRange { field, .. }
            | RegistryError::BadId { field, .. }
            | RegistryError::BadValue { field, .. } => Some(*field),
            RegistryError::Validation(err) => Some(err.field()),
            RegistryError::Storage(_) | RegistryError::Config(_) => None,
        }
    }

    /// Structured, serializable form of the error
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            field: self.field().map(str::to_string),
        }
    }
}

impl From<FilterError> for RegistryError {
    fn from(err: FilterError) -> Self {
        RegistryError::Validation(err.into())
    }
}

/// Machine-readable kind plus human-readable message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}
