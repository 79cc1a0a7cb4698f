//! Request Validation
//!
//! Turns flat name/value requests into typed sensor entities and filters,
//! reporting missing fields, malformed values and inverted ranges.

mod error;
mod request;
mod validator;

pub use error::ValidationError;
pub use request::{flat_req_from_json, FlatReq};
pub use validator::{ValidationConfig, Validator};
