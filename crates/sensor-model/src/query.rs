//! Query Predicates
//!
//! Typed filters over the three entity collections. Sensor types and sensors
//! are filtered by exact equality on a closed set of scalar fields; readings
//! are selected by sensor id and narrowed by inclusive value/timestamp bounds.
//! Storage backends either evaluate these predicates directly or translate
//! the clauses into native query clauses.

use crate::entity::{Sensor, SensorReading, SensorType};
use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors building a filter from wire field names
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// Name is not a field of the entity
    #[error("unknown filter field \"{0}\"")]
    UnknownField(String),

    /// Field exists but holds a range, which cannot be compared for equality
    #[error("field \"{0}\" is a range and cannot be used as a filter")]
    NonScalarField(String),
}

impl FilterError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::BadVal
    }

    /// The offending field name
    pub fn field(&self) -> &str {
        match self {
            FilterError::UnknownField(name) | FilterError::NonScalarField(name) => name,
        }
    }
}

/// A scalar entity field that can appear in an equality filter
pub trait FilterField: Copy + Eq + fmt::Debug + 'static {
    /// Entity the field belongs to
    type Entity;

    /// Every filterable field of the entity
    const ALL: &'static [Self];

    /// Wire names of structural fields that are never filterable
    const NON_SCALAR: &'static [&'static str];

    /// Wire name of the field
    fn name(&self) -> &'static str;

    /// The field's value on `entity`
    fn value<'a>(&self, entity: &'a Self::Entity) -> &'a str;

    /// Resolve a wire name to a field
    fn parse(name: &str) -> Result<Self, FilterError> {
        if let Some(field) = Self::ALL.iter().copied().find(|f| f.name() == name) {
            return Ok(field);
        }
        if Self::NON_SCALAR.iter().any(|n| *n == name) {
            Err(FilterError::NonScalarField(name.to_string()))
        } else {
            Err(FilterError::UnknownField(name.to_string()))
        }
    }
}

/// Filterable [`SensorType`] fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorTypeField {
    Id,
    Manufacturer,
    ModelNumber,
    Quantity,
}

impl FilterField for SensorTypeField {
    type Entity = SensorType;

    const ALL: &'static [Self] = &[
        SensorTypeField::Id,
        SensorTypeField::Manufacturer,
        SensorTypeField::ModelNumber,
        SensorTypeField::Quantity,
    ];

    const NON_SCALAR: &'static [&'static str] = &["limits"];

    fn name(&self) -> &'static str {
        match self {
            SensorTypeField::Id => "id",
            SensorTypeField::Manufacturer => "manufacturer",
            SensorTypeField::ModelNumber => "modelNumber",
            SensorTypeField::Quantity => "quantity",
        }
    }

    fn value<'a>(&self, entity: &'a SensorType) -> &'a str {
        match self {
            SensorTypeField::Id => &entity.id,
            SensorTypeField::Manufacturer => &entity.manufacturer,
            SensorTypeField::ModelNumber => &entity.model_number,
            SensorTypeField::Quantity => &entity.quantity,
        }
    }
}

/// Filterable [`Sensor`] fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorField {
    Id,
    SensorTypeId,
}

impl FilterField for SensorField {
    type Entity = Sensor;

    const ALL: &'static [Self] = &[SensorField::Id, SensorField::SensorTypeId];

    const NON_SCALAR: &'static [&'static str] = &["expected"];

    fn name(&self) -> &'static str {
        match self {
            SensorField::Id => "id",
            SensorField::SensorTypeId => "sensorTypeId",
        }
    }

    fn value<'a>(&self, entity: &'a Sensor) -> &'a str {
        match self {
            SensorField::Id => &entity.id,
            SensorField::SensorTypeId => &entity.sensor_type_id,
        }
    }
}

/// Conjunction of exact-match clauses; an empty filter matches everything
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter<F: FilterField> {
    clauses: Vec<(F, String)>,
}

/// Filter over sensor types
pub type SensorTypeFilter = FieldFilter<SensorTypeField>;

/// Filter over sensors
pub type SensorFilter = FieldFilter<SensorField>;

impl<F: FilterField> FieldFilter<F> {
    /// The identity filter
    pub fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Add a clause, replacing any earlier clause on the same field
    pub fn with(mut self, field: F, value: impl Into<String>) -> Self {
        let value = value.into();
        match self.clauses.iter_mut().find(|(f, _)| *f == field) {
            Some(clause) => clause.1 = value,
            None => self.clauses.push((field, value)),
        }
        self
    }

    /// Build a filter from `(wire name, value)` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        pairs.into_iter().try_fold(Self::new(), |filter, (name, value)| {
            let field = F::parse(name.as_ref())?;
            Ok(filter.with(field, value))
        })
    }

    /// Clauses in insertion order
    pub fn clauses(&self) -> &[(F, String)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Expected value for `field`, if constrained
    pub fn value_of(&self, field: F) -> Option<&str> {
        self.clauses
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v.as_str())
    }

    /// Whether every clause equals the corresponding field of `entity`
    pub fn matches(&self, entity: &F::Entity) -> bool {
        self.clauses
            .iter()
            .all(|(field, expected)| field.value(entity) == expected)
    }
}

impl<F: FilterField> Default for FieldFilter<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorTypeFilter {
    /// Filter selecting the sensor type with `id`
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new().with(SensorTypeField::Id, id)
    }
}

impl SensorFilter {
    /// Filter selecting the sensor with `id`
    pub fn by_id(id: impl Into<String>) -> Self {
        Self::new().with(SensorField::Id, id)
    }
}

/// Inclusive, independently optional bounds; absent bounds are unbounded
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T: PartialOrd + Copy> Bounds<T> {
    pub fn unbounded() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    /// Whether both bounds are set with `min > max`, so nothing can match
    pub fn is_empty(&self) -> bool {
        matches!((self.min, self.max), (Some(min), Some(max)) if min > max)
    }

    pub fn contains(&self, value: T) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Selects one sensor's readings, narrowed by value and timestamp bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingFilter {
    pub sensor_id: String,
    #[serde(default)]
    pub value: Bounds<f64>,
    #[serde(default)]
    pub timestamp: Bounds<i64>,
}

impl ReadingFilter {
    /// All readings of `sensor_id`
    pub fn new(sensor_id: impl Into<String>) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            value: Bounds::unbounded(),
            timestamp: Bounds::unbounded(),
        }
    }

    pub fn min_value(mut self, min: f64) -> Self {
        self.value.min = Some(min);
        self
    }

    pub fn max_value(mut self, max: f64) -> Self {
        self.value.max = Some(max);
        self
    }

    pub fn min_timestamp(mut self, min: i64) -> Self {
        self.timestamp.min = Some(min);
        self
    }

    pub fn max_timestamp(mut self, max: i64) -> Self {
        self.timestamp.max = Some(max);
        self
    }

    /// Whether the bounds exclude every possible reading
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() || self.timestamp.is_empty()
    }

    pub fn matches(&self, reading: &SensorReading) -> bool {
        reading.sensor_id == self.sensor_id
            && self.value.contains(reading.value)
            && self.timestamp.contains(reading.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use proptest::prelude::*;

    fn thermometer(id: &str, manufacturer: &str) -> SensorType {
        SensorType {
            id: id.to_string(),
            manufacturer: manufacturer.to_string(),
            model_number: "TX-1".to_string(),
            quantity: "temperature".to_string(),
            limits: Range { min: -40.0, max: 120.0 },
        }
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = SensorTypeFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&thermometer("t1", "Acme")));
    }

    #[test]
    fn test_all_clauses_must_match() {
        let filter = SensorTypeFilter::from_pairs([("manufacturer", "Acme"), ("quantity", "temperature")])
            .unwrap();
        assert!(filter.matches(&thermometer("t1", "Acme")));
        assert!(!filter.matches(&thermometer("t2", "Globex")));

        let filter = filter.with(SensorTypeField::ModelNumber, "TX-2");
        assert!(!filter.matches(&thermometer("t1", "Acme")));
    }

    #[test]
    fn test_repeated_field_keeps_last_value() {
        let filter = SensorFilter::new()
            .with(SensorField::Id, "a")
            .with(SensorField::Id, "b");
        assert_eq!(filter.clauses().len(), 1);
        assert_eq!(filter.value_of(SensorField::Id), Some("b"));
    }

    #[test]
    fn test_rejects_range_and_unknown_fields() {
        let err = SensorTypeFilter::from_pairs([("limits", "0")]).unwrap_err();
        assert_eq!(err, FilterError::NonScalarField("limits".to_string()));
        assert_eq!(err.kind(), ErrorKind::BadVal);

        let err = SensorFilter::from_pairs([("expected", "x")]).unwrap_err();
        assert!(matches!(err, FilterError::NonScalarField(_)));

        let err = SensorFilter::from_pairs([("colour", "red")]).unwrap_err();
        assert_eq!(err.field(), "colour");
        assert!(matches!(err, FilterError::UnknownField(_)));
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in SensorTypeField::ALL {
            assert_eq!(SensorTypeField::parse(field.name()), Ok(*field));
        }
        for field in SensorField::ALL {
            assert_eq!(SensorField::parse(field.name()), Ok(*field));
        }
    }

    #[test]
    fn test_reading_filter_bounds() {
        let filter = ReadingFilter::new("s1").min_timestamp(150).max_value(8.0);
        let reading = |timestamp, value| SensorReading {
            sensor_id: "s1".to_string(),
            timestamp,
            value,
        };
        assert!(!filter.matches(&reading(100, 1.0)));
        assert!(filter.matches(&reading(200, 5.0)));
        assert!(!filter.matches(&reading(300, 9.0)));
        assert!(filter.matches(&reading(150, 8.0)));
    }

    #[test]
    fn test_inverted_bounds_are_empty() {
        let filter = ReadingFilter::new("s1").min_timestamp(10).max_timestamp(5);
        assert!(filter.is_empty());
        assert!(!ReadingFilter::new("s1").is_empty());
    }

    proptest! {
        #[test]
        fn prop_unbounded_contains_everything(v in any::<i64>()) {
            prop_assert!(Bounds::<i64>::unbounded().contains(v));
        }

        #[test]
        fn prop_bounds_inclusive(min in -1000i64..1000, len in 0i64..1000, v in -3000i64..3000) {
            let bounds = Bounds { min: Some(min), max: Some(min + len) };
            prop_assert_eq!(bounds.contains(v), v >= min && v <= min + len);
        }
    }
}
