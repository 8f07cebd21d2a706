//! Merge engine control flow.
//!
//! [`Merger`] recursively combines two JSON values under the rules the
//! schema preprocessor indexed. The engine is purely functional: operands
//! are borrowed, never mutated, and the output is a fresh tree.

use serde_json::Value;

use crate::error::{err_path, MergeError, Result};
use crate::schema::Schema;
use crate::types::{FieldMergeConfig, MergeStrategy, NullHandling, StrategySpec};

/// Maximum nesting depth before a merge aborts instead of overflowing the
/// stack.
pub(crate) const MAX_DEPTH: usize = 128;

/// Merges two JSON values according to schema-defined rules.
///
/// # Examples
///
/// ```
/// use kfs_merge_core::{Merger, Schema};
/// use serde_json::json;
///
/// let schema = Schema::load(br#"{"type": "object"}"#).unwrap();
/// let merger = Merger::new(&schema);
///
/// let merged = merger
///     .merge(&json!({"name": "from-api"}), &json!({"name": "template", "enabled": true}))
///     .unwrap();
/// assert_eq!(merged, json!({"name": "from-api", "enabled": true}));
/// ```
pub struct Merger<'a> {
    schema: &'a Schema,
}

impl<'a> Merger<'a> {
    /// Creates a merger for the given schema.
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// Merges instance A into instance B.
    ///
    /// `a` is the request/override instance, `b` the base/template; by
    /// default A takes precedence over B.
    pub fn merge(&self, a: &Value, b: &Value) -> Result<Value> {
        self.merge_values(a, b, "", 0)
    }

    /// Recursively merges two values at the given instance path.
    pub(crate) fn merge_values(
        &self,
        a: &Value,
        b: &Value,
        path: &str,
        depth: usize,
    ) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(MergeError::RecursionLimit {
                path: err_path(path),
            });
        }

        // Under asAbsent a null operand behaves as if the side omitted the
        // field entirely: the counterpart wins before any strategy runs.
        if self.schema.null_handling_for(path) == NullHandling::AsAbsent {
            if a.is_null() {
                return Ok(b.clone());
            }
            if b.is_null() {
                return Ok(a.clone());
            }
        }

        let config = self.effective_config(a, path);
        let strategy = match config.strategy.as_ref() {
            Some(StrategySpec::Resolved(strategy)) => *strategy,
            Some(StrategySpec::Unrecognized(name)) => {
                return Err(MergeError::UnknownStrategy {
                    path: err_path(path),
                    name: name.clone(),
                });
            }
            None => MergeStrategy::DeepMerge,
        };

        match strategy {
            MergeStrategy::KeepBase => Ok(b.clone()),
            MergeStrategy::KeepRequest => Ok(a.clone()),
            MergeStrategy::DeepMerge => self.deep_merge(a, b, path, depth),
            MergeStrategy::Replace => {
                if !a.is_null() {
                    Ok(a.clone())
                } else {
                    Ok(b.clone())
                }
            }
            MergeStrategy::Concat => self.concat(a, b, config.unique.unwrap_or(false), path),
            MergeStrategy::MergeByDiscriminator => self.merge_by_discriminator(
                a,
                b,
                config.discriminator_field.as_deref().unwrap_or("type"),
                config.replace_on_match.unwrap_or(true),
                path,
                depth,
            ),
            MergeStrategy::Numeric => {
                self.numeric(a, b, config.operation.as_deref().unwrap_or("sum"), path)
            }
        }
    }

    /// Resolves the configuration governing a path: an explicit per-path
    /// strategy wins; otherwise the global array or non-array fallback is
    /// used, discarding any strategy-less per-path options.
    fn effective_config(&self, a: &Value, path: &str) -> FieldMergeConfig {
        if let Some(config) = self.schema.field_config(path) {
            if config.strategy.is_some() {
                return config.clone();
            }
        }

        let global = self.schema.global_config();
        let fallback = if a.is_array() {
            global.array_strategy.clone()
        } else {
            global.default_strategy.clone()
        };
        FieldMergeConfig {
            strategy: Some(fallback),
            ..FieldMergeConfig::default()
        }
    }

    /// Recursively merges two values. Object pairs merge field-by-field,
    /// pre-populated with B's entries in B's order; anything else resolves
    /// to A when A is non-null, else B.
    pub(crate) fn deep_merge(
        &self,
        a: &Value,
        b: &Value,
        path: &str,
        depth: usize,
    ) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(MergeError::RecursionLimit {
                path: err_path(path),
            });
        }

        if let (Value::Object(a_map), Value::Object(b_map)) = (a, b) {
            let mut result = b_map.clone();
            for (key, a_value) in a_map {
                let field_path = format!("{path}/{key}");
                match b_map.get(key) {
                    None => {
                        result.insert(key.clone(), a_value.clone());
                    }
                    Some(b_value) => {
                        let merged = self.merge_values(a_value, b_value, &field_path, depth + 1)?;
                        result.insert(key.clone(), merged);
                    }
                }
            }
            return Ok(Value::Object(result));
        }

        if a.is_null() {
            if self.schema.null_handling_for(path) == NullHandling::AsAbsent {
                return Ok(b.clone());
            }
            return Ok(Value::Null);
        }

        Ok(a.clone())
    }
}
