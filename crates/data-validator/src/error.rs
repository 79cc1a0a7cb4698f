//! Validation Error Types

use sensor_model::{ErrorKind, FilterError};
use thiserror::Error;

/// Errors while turning a flat request into a typed value
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Missing or blank required field
    #[error("missing required field \"{0}\"")]
    MissingField(String),

    /// Field is not a valid value of the expected type
    #[error("bad value \"{value}\" for field \"{field}\": expected {expected}")]
    BadValue {
        field: String,
        value: String,
        expected: &'static str,
    },

    /// Range with min >= max
    #[error("bad range for {field}: min {min} must be less than max {max}")]
    BadRange { field: String, min: f64, max: f64 },

    /// Field not accepted by this request
    #[error("unknown field \"{0}\"")]
    UnknownField(String),

    /// Same field given twice, e.g. at the top level and inside a nested object
    #[error("duplicate field \"{0}\"")]
    DuplicateField(String),

    /// Filter field rejected by the query builder
    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::MissingField(_) => ErrorKind::Required,
            ValidationError::BadValue { .. }
            | ValidationError::UnknownField(_)
            | ValidationError::DuplicateField(_) => ErrorKind::BadVal,
            ValidationError::BadRange { .. } => ErrorKind::BadRange,
            ValidationError::Filter(err) => err.kind(),
        }
    }

    /// Name of the offending field
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingField(field)
            | ValidationError::UnknownField(field)
            | ValidationError::DuplicateField(field)
            | ValidationError::BadValue { field, .. }
            | ValidationError::BadRange { field, .. } => field,
            ValidationError::Filter(err) => err.field(),
        }
    }
}
