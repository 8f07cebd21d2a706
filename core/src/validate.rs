//! Instance validation against the compiled schema.
//!
//! The validator wraps the compiled JSON Schema handle and converts the
//! underlying validator's failures into phase-tagged [`MergeError`]s with
//! the failing value's JSON-pointer path, so callers can tell whether the
//! request, the base, or the merged result was rejected.

use serde_json::Value;

use crate::error::{MergeError, Result};
use crate::schema::Schema;
use crate::types::ValidationPhase;
use crate::value;

/// Validates JSON instances against a schema.
pub struct Validator<'a> {
    schema: &'a Schema,
}

impl<'a> Validator<'a> {
    /// Creates a validator for the given schema.
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Parses and validates instance bytes, returning the first failure.
    ///
    /// # Errors
    ///
    /// [`MergeError::InputParse`] when the bytes are not valid JSON,
    /// [`MergeError::Validation`] when the instance violates the schema.
    pub fn validate(&self, instance_json: &[u8], phase: ValidationPhase) -> Result<()> {
        let instance = value::parse_instance(instance_json).map_err(|err| {
            MergeError::InputParse {
                phase,
                message: err.to_string(),
            }
        })?;
        self.validate_value(&instance, phase)
    }

    /// Validates an already-parsed value.
    pub fn validate_value(&self, instance: &Value, phase: ValidationPhase) -> Result<()> {
        match self.schema.compiled().validate(instance) {
            Ok(()) => Ok(()),
            Err(error) => {
                let pointer = error.instance_path.to_string();
                let path = if pointer.is_empty() {
                    "/".to_string()
                } else {
                    pointer
                };
                Err(MergeError::Validation {
                    phase,
                    path,
                    message: error.to_string(),
                })
            }
        }
    }
}
