//! The merge pipeline and schema loaders.
//!
//! A merge call runs a fixed sequence of phases: validate A, validate B,
//! optionally splice the schema's defaults beneath B, merge, validate the
//! result. The first failure aborts the pipeline with its phase tag; no
//! partial output is produced.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::{MergeError, Result};
use crate::merge::Merger;
use crate::schema::Schema;
use crate::types::{MergeOptions, ValidationPhase};
use crate::validate::Validator;
use crate::value;

impl Schema {
    /// Loads a schema from a file path.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::load(&data)
    }

    /// Loads a schema from an HTTP(S) URL.
    pub fn load_from_url(url: &str) -> Result<Self> {
        let response = reqwest::blocking::get(url)?;
        if !response.status().is_success() {
            return Err(MergeError::FetchStatus {
                status: response.status().as_u16(),
            });
        }
        let data = response.bytes()?;
        Self::load(&data)
    }

    /// Loads a schema from a file path, URL, or raw JSON text.
    ///
    /// Sources starting with `http://` or `https://` are fetched; sources
    /// whose first non-whitespace byte is `{` are parsed as raw JSON;
    /// anything else is treated as a file path.
    pub fn load_from_source(source: &str) -> Result<Self> {
        if source.starts_with("http://") || source.starts_with("https://") {
            return Self::load_from_url(source);
        }
        if source.trim_start().starts_with('{') {
            return Self::load(source.as_bytes());
        }
        Self::load_from_file(source)
    }

    /// Validates instance A and B, merges them, validates the result, and
    /// returns the merged JSON bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use kfs_merge_core::Schema;
    ///
    /// let schema = Schema::load(br#"{
    ///     "type": "object",
    ///     "properties": {
    ///         "immutable": {"x-kfs-merge": {"strategy": "keepBase"}}
    ///     }
    /// }"#).unwrap();
    ///
    /// let merged = schema.merge(
    ///     br#"{"immutable": "from-api", "name": "from-api"}"#,
    ///     br#"{"immutable": "template", "name": "template"}"#,
    /// ).unwrap();
    ///
    /// let value: serde_json::Value = serde_json::from_slice(&merged).unwrap();
    /// assert_eq!(value["immutable"], "template");
    /// assert_eq!(value["name"], "from-api");
    /// ```
    pub fn merge(&self, a: &[u8], b: &[u8]) -> Result<Vec<u8>> {
        self.merge_with_options(a, b, MergeOptions::default())
    }

    /// Like [`Schema::merge`] with configurable validation and defaults
    /// behavior.
    pub fn merge_with_options(&self, a: &[u8], b: &[u8], options: MergeOptions) -> Result<Vec<u8>> {
        let result = self.merge_to_value_with_options(a, b, options)?;
        serde_json::to_vec(&result).map_err(|err| MergeError::Serialize(err.to_string()))
    }

    /// Like [`Schema::merge`] but returns the parsed result value.
    pub fn merge_to_value(&self, a: &[u8], b: &[u8]) -> Result<Value> {
        self.merge_to_value_with_options(a, b, MergeOptions::default())
    }

    /// Runs the full merge pipeline and returns the result value.
    pub fn merge_to_value_with_options(
        &self,
        a: &[u8],
        b: &[u8],
        options: MergeOptions,
    ) -> Result<Value> {
        let validator = Validator::new(self);

        if !options.skip_validate_a {
            validator.validate(a, ValidationPhase::ValidateA)?;
        }
        if !options.skip_validate_b {
            validator.validate(b, ValidationPhase::ValidateB)?;
        }

        let a_value = value::parse_instance(a).map_err(|err| MergeError::InputParse {
            phase: ValidationPhase::ValidateA,
            message: err.to_string(),
        })?;
        let mut b_value = value::parse_instance(b).map_err(|err| MergeError::InputParse {
            phase: ValidationPhase::ValidateB,
            message: err.to_string(),
        })?;

        let merger = Merger::new(self);

        // Defaults splice beneath B, so precedence ends up A > B > defaults.
        if self.should_apply_defaults(&options) {
            if let Some(defaults) = self.defaults() {
                debug!("Splicing schema defaults beneath base instance");
                b_value = merger.merge(&b_value, defaults)?;
            }
        }

        let result = merger.merge(&a_value, &b_value)?;

        if !options.skip_validate_result {
            validator.validate_value(&result, ValidationPhase::ValidateResult)?;
        }

        Ok(result)
    }

    /// Validates a JSON instance against the schema.
    pub fn validate(&self, instance_json: &[u8]) -> Result<()> {
        Validator::new(self).validate(instance_json, ValidationPhase::ValidateA)
    }

    /// Whether defaults splicing is active for this call: an explicit
    /// option wins, otherwise the schema's `applyDefaults` setting.
    fn should_apply_defaults(&self, options: &MergeOptions) -> bool {
        options
            .apply_defaults
            .unwrap_or(self.global_config().apply_defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(value: serde_json::Value) -> Schema {
        Schema::load(value.to_string().as_bytes()).expect("schema should load")
    }

    #[test]
    fn test_merge_validates_a_first() {
        let schema = schema(json!({
            "type": "object",
            "properties": {"n": {"type": "integer"}}
        }));
        let err = schema
            .merge(br#"{"n": "bad"}"#, br#"{"n": 1}"#)
            .unwrap_err();
        match err {
            MergeError::Validation { phase, .. } => {
                assert_eq!(phase, ValidationPhase::ValidateA);
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_validates_b_second() {
        let schema = schema(json!({
            "type": "object",
            "properties": {"n": {"type": "integer"}}
        }));
        let err = schema
            .merge(br#"{"n": 1}"#, br#"{"n": "bad"}"#)
            .unwrap_err();
        match err {
            MergeError::Validation { phase, .. } => {
                assert_eq!(phase, ValidationPhase::ValidateB);
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_skip_flags_suppress_validation() {
        let schema = schema(json!({
            "type": "object",
            "properties": {"n": {"type": "integer"}}
        }));
        let options = MergeOptions {
            skip_validate_a: true,
            skip_validate_b: true,
            skip_validate_result: true,
            apply_defaults: None,
        };
        let merged = schema
            .merge_with_options(br#"{"n": "bad"}"#, br#"{"n": 1}"#, options)
            .unwrap();
        let value: Value = serde_json::from_slice(&merged).unwrap();
        assert_eq!(value, json!({"n": "bad"}));
    }

    #[test]
    fn test_result_validation_runs() {
        // A and B are individually valid, but the merged object unions
        // their keys and trips maxProperties.
        let schema = schema(json!({
            "type": "object",
            "maxProperties": 1
        }));
        let err = schema.merge(br#"{"a": 1}"#, br#"{"b": 2}"#).unwrap_err();
        match err {
            MergeError::Validation { phase, .. } => {
                assert_eq!(phase, ValidationPhase::ValidateResult);
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_disabled_without_flag() {
        let schema = schema(json!({
            "type": "object",
            "properties": {"timeout": {"type": "integer", "default": 30}}
        }));
        let value = schema.merge_to_value(b"{}", b"{}").unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn test_defaults_applied_when_schema_enables_them() {
        let schema = schema(json!({
            "type": "object",
            "x-kfs-merge": {"applyDefaults": true},
            "properties": {"timeout": {"type": "integer", "default": 30}}
        }));
        let value = schema.merge_to_value(b"{}", b"{}").unwrap();
        assert_eq!(value, json!({"timeout": 30}));
    }

    #[test]
    fn test_options_override_schema_defaults_setting() {
        let schema = schema(json!({
            "type": "object",
            "properties": {"timeout": {"type": "integer", "default": 30}}
        }));
        let options = MergeOptions {
            apply_defaults: Some(true),
            ..MergeOptions::default()
        };
        let value = schema
            .merge_to_value_with_options(b"{}", b"{}", options)
            .unwrap();
        assert_eq!(value, json!({"timeout": 30}));

        let schema = schema_with_defaults_enabled();
        let options = MergeOptions {
            apply_defaults: Some(false),
            ..MergeOptions::default()
        };
        let value = schema
            .merge_to_value_with_options(b"{}", b"{}", options)
            .unwrap();
        assert_eq!(value, json!({}));
    }

    fn schema_with_defaults_enabled() -> Schema {
        schema(json!({
            "type": "object",
            "x-kfs-merge": {"applyDefaults": true},
            "properties": {"timeout": {"type": "integer", "default": 30}}
        }))
    }

    #[test]
    fn test_validate_reports_first_error() {
        let schema = schema(json!({
            "type": "object",
            "properties": {"n": {"type": "integer"}}
        }));
        assert!(schema.validate(br#"{"n": 1}"#).is_ok());
        assert!(schema.validate(br#"{"n": "bad"}"#).is_err());
    }

    #[test]
    fn test_load_from_source_accepts_raw_json() {
        let schema = Schema::load_from_source(r#"{"type": "object"}"#).unwrap();
        assert!(schema.validate(b"{}").is_ok());
    }

    #[test]
    fn test_load_from_missing_file_is_io_error() {
        let err = Schema::load_from_file("/nonexistent/schema.json").unwrap_err();
        assert!(matches!(err, MergeError::Io(_)));
    }
}
