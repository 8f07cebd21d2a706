//! Schema loading and `x-kfs-merge` preprocessing.
//!
//! A [`Schema`] is built once from raw schema bytes and is immutable from
//! then on, so it can be shared across threads by reference. Loading walks
//! the schema twice: first through `$defs` to collect definition-scoped
//! merge configurations, then through the root `properties`/`items` tree to
//! collect per-path configurations and `$ref` bindings. Default values are
//! extracted eagerly in the same pass so no lazy state survives into merge
//! time.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{MergeError, Result};
use crate::types::{FieldMergeConfig, GlobalMergeConfig, NullHandling};
use crate::value;

/// The JSON Schema extension key carrying merge rules.
pub const MERGE_EXTENSION_KEY: &str = "x-kfs-merge";

const DEFS_PREFIX: &str = "#/$defs/";

/// A parsed JSON Schema with preprocessed merge configuration.
///
/// Construct with [`Schema::load`] (or the loaders in the driver module),
/// then call [`Schema::merge`](Schema::merge) /
/// [`Schema::validate`](Schema::validate).
#[derive(Debug)]
pub struct Schema {
    compiled: jsonschema::Validator,
    global: GlobalMergeConfig,
    /// Field configuration keyed by instance path (`/a/b`). Includes
    /// configurations inherited from `$ref` targets.
    field_configs: HashMap<String, FieldMergeConfig>,
    /// Definition configuration keyed by `defName:relativePath` (relative
    /// path empty for the definition's own top-level configuration).
    def_configs: HashMap<String, FieldMergeConfig>,
    /// `$ref` sites: instance path of the ref-bearing node to the name of
    /// the local definition it targets. Ordered so prefix resolution is
    /// deterministic.
    ref_bindings: BTreeMap<String, String>,
    defaults: Option<Value>,
}

impl Schema {
    /// Parses schema bytes, compiles the JSON Schema, and extracts merge
    /// configuration and default values.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::SchemaParse`] for malformed JSON, a non-object
    /// schema root, or an `x-kfs-merge` value that is not an object, and
    /// [`MergeError::SchemaCompile`] when the schema does not compile.
    ///
    /// # Examples
    ///
    /// ```
    /// use kfs_merge_core::Schema;
    ///
    /// let schema = Schema::load(br#"{
    ///     "type": "object",
    ///     "x-kfs-merge": { "nullHandling": "asAbsent" }
    /// }"#).unwrap();
    /// assert!(schema.defaults().is_none());
    /// ```
    pub fn load(schema_json: &[u8]) -> Result<Self> {
        let parsed = value::parse_instance(schema_json)
            .map_err(|err| MergeError::SchemaParse(err.to_string()))?;

        let compiled = jsonschema::validator_for(&parsed)
            .map_err(|err| MergeError::SchemaCompile(err.to_string()))?;

        let Value::Object(raw) = parsed else {
            return Err(MergeError::SchemaParse(
                "schema root must be an object".to_string(),
            ));
        };

        let global = parse_global_config(&raw)?;

        let mut def_configs = HashMap::new();
        parse_defs_configs(&raw, &mut def_configs)?;

        let mut field_configs = HashMap::new();
        let mut ref_bindings = BTreeMap::new();
        parse_field_configs(
            "",
            &raw,
            &def_configs,
            &mut field_configs,
            &mut ref_bindings,
        )?;

        let defaults = extract_defaults(&raw);

        debug!(
            field_configs = field_configs.len(),
            def_configs = def_configs.len(),
            ref_bindings = ref_bindings.len(),
            has_defaults = defaults.is_some(),
            "Loaded schema with merge extensions"
        );

        Ok(Self {
            compiled,
            global,
            field_configs,
            def_configs,
            ref_bindings,
            defaults,
        })
    }

    /// Returns the schema-level merge configuration.
    pub fn global_config(&self) -> &GlobalMergeConfig {
        &self.global
    }

    /// Returns the merge configuration for an instance path.
    ///
    /// Resolution order: a direct entry for the path wins; otherwise every
    /// recorded `$ref` binding whose path is a strict prefix of `path` is
    /// tried, looking up the remaining tail inside the bound definition's
    /// configuration.
    pub fn field_config(&self, path: &str) -> Option<&FieldMergeConfig> {
        if let Some(config) = self.field_configs.get(path) {
            return Some(config);
        }

        for (base_path, def_name) in &self.ref_bindings {
            if path.len() > base_path.len() && path.starts_with(base_path.as_str()) {
                let tail = &path[base_path.len()..];
                if let Some(config) = self.def_configs.get(&format!("{def_name}:{tail}")) {
                    return Some(config);
                }
            }
        }

        None
    }

    /// Returns the effective null-handling mode for an instance path.
    ///
    /// A `nullHandling` setting governs the subtree beneath the node that
    /// declares it: the path itself is checked first, then each ancestor
    /// path, then the global mode.
    pub fn null_handling_for(&self, path: &str) -> NullHandling {
        let mut current = path;
        loop {
            if let Some(mode) = self
                .field_config(current)
                .and_then(|config| config.null_handling)
            {
                return mode;
            }
            let Some(cut) = current.rfind('/') else {
                break;
            };
            current = &current[..cut];
        }
        self.global.null_handling
    }

    /// Returns the defaults tree extracted from the schema's `default`
    /// annotations, if any property carries one.
    pub fn defaults(&self) -> Option<&Value> {
        self.defaults.as_ref()
    }

    /// The compiled validator backing [`Schema::validate`](Schema::validate).
    pub(crate) fn compiled(&self) -> &jsonschema::Validator {
        &self.compiled
    }
}

/// Extracts the root-level `x-kfs-merge` configuration.
fn parse_global_config(raw: &Map<String, Value>) -> Result<GlobalMergeConfig> {
    let mut global = GlobalMergeConfig::default();
    let Some(merge_raw) = raw.get(MERGE_EXTENSION_KEY) else {
        return Ok(global);
    };
    let merge_map = merge_raw.as_object().ok_or_else(|| {
        MergeError::SchemaParse(format!("{MERGE_EXTENSION_KEY} must be an object"))
    })?;

    if let Some(name) = merge_map.get("defaultStrategy").and_then(Value::as_str) {
        global.default_strategy = resolve_strategy_name(name);
    }
    if let Some(name) = merge_map.get("arrayStrategy").and_then(Value::as_str) {
        global.array_strategy = resolve_strategy_name(name);
    }
    if let Some(mode) = merge_map.get("nullHandling").and_then(Value::as_str) {
        if let Some(mode) = NullHandling::parse(mode) {
            global.null_handling = mode;
        }
    }
    if let Some(apply) = merge_map.get("applyDefaults").and_then(Value::as_bool) {
        global.apply_defaults = apply;
    }

    Ok(global)
}

/// Resolves a strategy name through the usual legacy collapse, discarding
/// any bundled option side effects (the global fallback carries none).
fn resolve_strategy_name(name: &str) -> crate::types::StrategySpec {
    let mut scratch = FieldMergeConfig::default();
    scratch.apply_strategy_name(name);
    scratch
        .strategy
        .unwrap_or_else(|| crate::types::StrategySpec::Unrecognized(name.to_string()))
}

/// Parses a subschema `x-kfs-merge` object into a field configuration.
fn parse_field_entry(merge_map: &Map<String, Value>) -> FieldMergeConfig {
    let mut config = FieldMergeConfig::default();

    if let Some(field) = merge_map.get("discriminatorField").and_then(Value::as_str) {
        config.discriminator_field = Some(field.to_string());
    } else if let Some(field) = merge_map.get("mergeKey").and_then(Value::as_str) {
        // Legacy alias for discriminatorField.
        config.discriminator_field = Some(field.to_string());
    }
    if let Some(replace) = merge_map.get("replaceOnMatch").and_then(Value::as_bool) {
        config.replace_on_match = Some(replace);
    }
    if let Some(unique) = merge_map.get("unique").and_then(Value::as_bool) {
        config.unique = Some(unique);
    }
    if let Some(operation) = merge_map.get("operation").and_then(Value::as_str) {
        config.operation = Some(operation.to_string());
    }
    if let Some(mode) = merge_map.get("nullHandling").and_then(Value::as_str) {
        config.null_handling = NullHandling::parse(mode);
    }
    // Strategy last: legacy names only fill options the schema left unset.
    if let Some(name) = merge_map.get("strategy").and_then(Value::as_str) {
        config.apply_strategy_name(name);
    }

    config
}

/// Returns the definition name for a local `#/$defs/NAME` reference.
fn local_def_name(reference: &str) -> Option<&str> {
    reference
        .strip_prefix(DEFS_PREFIX)
        .filter(|name| !name.is_empty())
}

/// First traversal: collect configurations declared inside `$defs`.
fn parse_defs_configs(
    raw: &Map<String, Value>,
    def_configs: &mut HashMap<String, FieldMergeConfig>,
) -> Result<()> {
    let Some(defs) = raw.get("$defs").and_then(Value::as_object) else {
        return Ok(());
    };

    for (def_name, def_value) in defs {
        let Some(def_map) = def_value.as_object() else {
            continue;
        };

        if let Some(merge_raw) = def_map.get(MERGE_EXTENSION_KEY) {
            let merge_map = merge_raw.as_object().ok_or_else(|| {
                MergeError::SchemaParse(format!(
                    "{MERGE_EXTENSION_KEY} in $defs/{def_name} must be an object"
                ))
            })?;
            def_configs.insert(def_name.clone(), parse_field_entry(merge_map));
        }

        parse_def_field_configs(def_name, "", def_map, def_configs)?;
    }

    Ok(())
}

/// Recurses into a definition's `properties`/`items`, storing nested
/// configurations under `defName:relativePath`.
fn parse_def_field_configs(
    def_name: &str,
    path: &str,
    node: &Map<String, Value>,
    def_configs: &mut HashMap<String, FieldMergeConfig>,
) -> Result<()> {
    if !path.is_empty() {
        if let Some(merge_raw) = node.get(MERGE_EXTENSION_KEY) {
            let merge_map = merge_raw.as_object().ok_or_else(|| {
                MergeError::SchemaParse(format!(
                    "{MERGE_EXTENSION_KEY} in $defs/{def_name}{path} must be an object"
                ))
            })?;
            def_configs.insert(format!("{def_name}:{path}"), parse_field_entry(merge_map));
        }
    }

    if let Some(props) = node.get("properties").and_then(Value::as_object) {
        for (prop_name, prop_value) in props {
            if let Some(prop_map) = prop_value.as_object() {
                let prop_path = format!("{path}/{prop_name}");
                parse_def_field_configs(def_name, &prop_path, prop_map, def_configs)?;
            }
        }
    }

    if let Some(items) = node.get("items").and_then(Value::as_object) {
        let items_path = format!("{path}/items");
        parse_def_field_configs(def_name, &items_path, items, def_configs)?;
    }

    Ok(())
}

/// Second traversal: collect per-path configurations and `$ref` bindings
/// from the root schema.
fn parse_field_configs(
    path: &str,
    node: &Map<String, Value>,
    def_configs: &HashMap<String, FieldMergeConfig>,
    field_configs: &mut HashMap<String, FieldMergeConfig>,
    ref_bindings: &mut BTreeMap<String, String>,
) -> Result<()> {
    if let Some(reference) = node.get("$ref").and_then(Value::as_str) {
        if let Some(def_name) = local_def_name(reference) {
            bind_ref(path, def_name, def_configs, field_configs, ref_bindings);
        }
    }

    if let Some(merge_raw) = node.get(MERGE_EXTENSION_KEY) {
        // The root node's extension is the global configuration, parsed
        // separately; only subschema nodes store field configuration.
        if !path.is_empty() {
            let merge_map = merge_raw.as_object().ok_or_else(|| {
                MergeError::SchemaParse(format!(
                    "{MERGE_EXTENSION_KEY} at {path} must be an object"
                ))
            })?;
            field_configs.insert(path.to_string(), parse_field_entry(merge_map));
        }
    }

    if let Some(alternatives) = node.get("anyOf").and_then(Value::as_array) {
        for alternative in alternatives {
            if let Some(reference) = alternative.get("$ref").and_then(Value::as_str) {
                if let Some(def_name) = local_def_name(reference) {
                    bind_ref(path, def_name, def_configs, field_configs, ref_bindings);
                }
            }
        }
    }

    if let Some(alternatives) = node.get("oneOf").and_then(Value::as_array) {
        for alternative in alternatives {
            if let Some(reference) = alternative.get("$ref").and_then(Value::as_str) {
                if let Some(def_name) = local_def_name(reference) {
                    // Only the first ref-bearing alternative is recorded;
                    // selecting per-instance by discriminator is out of scope.
                    ref_bindings
                        .entry(path.to_string())
                        .or_insert_with(|| def_name.to_string());
                }
            }
        }
    }

    if let Some(props) = node.get("properties").and_then(Value::as_object) {
        for (prop_name, prop_value) in props {
            if let Some(prop_map) = prop_value.as_object() {
                let prop_path = format!("{path}/{prop_name}");
                parse_field_configs(
                    &prop_path,
                    prop_map,
                    def_configs,
                    field_configs,
                    ref_bindings,
                )?;
            }
        }
    }

    if let Some(items) = node.get("items").and_then(Value::as_object) {
        let items_path = format!("{path}/items");
        parse_field_configs(&items_path, items, def_configs, field_configs, ref_bindings)?;
    }

    Ok(())
}

/// Records a `$ref` binding and inherits the target definition's top-level
/// configuration unless the site already has a direct one.
fn bind_ref(
    path: &str,
    def_name: &str,
    def_configs: &HashMap<String, FieldMergeConfig>,
    field_configs: &mut HashMap<String, FieldMergeConfig>,
    ref_bindings: &mut BTreeMap<String, String>,
) {
    ref_bindings
        .entry(path.to_string())
        .or_insert_with(|| def_name.to_string());

    if let Some(config) = def_configs.get(def_name) {
        if !field_configs.contains_key(path) {
            field_configs.insert(path.to_string(), config.clone());
        }
    }
}

/// Extracts the defaults tree from the schema's `default` annotations.
/// Returns `None` unless the result is an object.
fn extract_defaults(raw: &Map<String, Value>) -> Option<Value> {
    let mut visited = HashSet::new();
    match extract_node_defaults(raw, raw, &mut visited) {
        Some(Value::Object(map)) if !map.is_empty() => Some(Value::Object(map)),
        _ => None,
    }
}

/// Recursively combines a node's own `default` with the defaults of its
/// properties; leaf-property defaults shadow object-level default keys.
/// `$ref` cycles are broken by tracking the definitions on the current
/// descent and treating a revisit as empty.
fn extract_node_defaults(
    raw: &Map<String, Value>,
    node: &Map<String, Value>,
    visited: &mut HashSet<String>,
) -> Option<Value> {
    if let Some(reference) = node.get("$ref").and_then(Value::as_str) {
        let def_name = local_def_name(reference)?;
        if !visited.insert(def_name.to_string()) {
            return None;
        }
        let result = raw
            .get("$defs")
            .and_then(Value::as_object)
            .and_then(|defs| defs.get(def_name))
            .and_then(Value::as_object)
            .and_then(|def_node| extract_node_defaults(raw, def_node, visited));
        visited.remove(def_name);
        return result;
    }

    // An explicit `"default": null` counts as no default.
    let node_default = node.get("default").filter(|value| !value.is_null());

    let Some(props) = node.get("properties").and_then(Value::as_object) else {
        return node_default.cloned();
    };

    let mut leaf_defaults = Map::new();
    for (prop_name, prop_value) in props {
        let Some(prop_map) = prop_value.as_object() else {
            continue;
        };
        if let Some(value) = extract_node_defaults(raw, prop_map, visited) {
            leaf_defaults.insert(prop_name.clone(), value);
        }
    }

    match node_default {
        None if leaf_defaults.is_empty() => None,
        None => Some(Value::Object(leaf_defaults)),
        Some(Value::Object(base)) => {
            let mut merged = base.clone();
            for (key, value) in leaf_defaults {
                merged.insert(key, value);
            }
            Some(Value::Object(merged))
        }
        Some(other) => {
            if leaf_defaults.is_empty() {
                Some(other.clone())
            } else {
                Some(Value::Object(leaf_defaults))
            }
        }
    }
}
