//! Error Kinds

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Machine-readable failure category shared by every registry layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// A required field is missing
    Required,
    /// A field holds a malformed value
    BadVal,
    /// A range is inverted or not contained in its limits
    BadRange,
    /// A reference to an unknown sensor type or sensor
    BadId,
    /// A unique key is already taken
    Exists,
    /// The backing store failed
    Db,
}

impl ErrorKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Required => "REQUIRED",
            ErrorKind::BadVal => "BAD_VAL",
            ErrorKind::BadRange => "BAD_RANGE",
            ErrorKind::BadId => "BAD_ID",
            ErrorKind::Exists => "EXISTS",
            ErrorKind::Db => "DB",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by entity constructors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// Range bounds are inverted, equal or not numbers
    #[error("bad range [{min}, {max}]: min must be less than max")]
    BadRange { min: f64, max: f64 },
}

impl ModelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::BadRange { .. } => ErrorKind::BadRange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(ErrorKind::BadRange.as_str(), "BAD_RANGE");
        assert_eq!(ErrorKind::BadId.to_string(), "BAD_ID");
        assert_eq!(
            serde_json::to_string(&ErrorKind::BadVal).unwrap(),
            "\"BAD_VAL\""
        );
    }
}
