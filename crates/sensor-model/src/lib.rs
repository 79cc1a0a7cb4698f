//! Sensor Entity Model
//!
//! Entities recorded by the sensor registry, the range predicates used for
//! cross-entity checks, and typed filters over each entity collection.

mod entity;
mod error;
pub mod query;
mod range;

pub use entity::{Sensor, SensorReading, SensorType};
pub use error::{ErrorKind, ModelError};
pub use query::{
    Bounds, FieldFilter, FilterError, FilterField, ReadingFilter, SensorField, SensorFilter,
    SensorTypeField, SensorTypeFilter,
};
pub use range::Range;
