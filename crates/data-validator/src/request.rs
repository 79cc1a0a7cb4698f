//! Flat Requests

use crate::error::ValidationError;
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw request: field name to string value
pub type FlatReq = BTreeMap<String, String>;

/// Convert a JSON object into a [`FlatReq`]
///
/// Strings, numbers and booleans become strings and `null` members are
/// dropped. A nested object (e.g. `"limits": {"min": 0, "max": 100}`) has its
/// scalar members lifted to the top level, so entity-shaped JSON and flat
/// requests are interchangeable. A lifted member that collides with another
/// key is rejected.
pub fn flat_req_from_json(value: &Value) -> Result<FlatReq, ValidationError> {
    let object = value.as_object().ok_or_else(|| ValidationError::BadValue {
        field: "request".to_string(),
        value: value.to_string(),
        expected: "a JSON object",
    })?;

    let mut req = FlatReq::new();
    for (name, member) in object {
        match member {
            Value::Object(nested) => {
                for (inner, inner_value) in nested {
                    if let Some(text) = scalar_text(inner, inner_value)? {
                        insert_unique(&mut req, inner, text)?;
                    }
                }
            }
            other => {
                if let Some(text) = scalar_text(name, other)? {
                    insert_unique(&mut req, name, text)?;
                }
            }
        }
    }
    Ok(req)
}

fn insert_unique(req: &mut FlatReq, name: &str, text: String) -> Result<(), ValidationError> {
    if req.contains_key(name) {
        return Err(ValidationError::DuplicateField(name.to_string()));
    }
    req.insert(name.to_string(), text);
    Ok(())
}

fn scalar_text(name: &str, value: &Value) -> Result<Option<String>, ValidationError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err(ValidationError::BadValue {
            field: name.to_string(),
            value: value.to_string(),
            expected: "a scalar",
        }),
    }
}
