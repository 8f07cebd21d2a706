//! End-to-end merge scenarios through the public API.

use kfs_merge_core::{MergeError, MergeOptions, Schema, ValidationPhase};
use serde_json::{json, Value};

fn load(schema: Value) -> Schema {
    Schema::load(schema.to_string().as_bytes()).expect("schema should load")
}

fn merge(schema: &Schema, a: Value, b: Value) -> Value {
    schema
        .merge_to_value(a.to_string().as_bytes(), b.to_string().as_bytes())
        .expect("merge should succeed")
}

#[test]
fn request_overrides_base_and_base_is_preserved_elsewhere() {
    let schema = load(json!({"type": "object"}));
    let merged = merge(
        &schema,
        json!({"name": "from-api", "count": 10}),
        json!({"name": "template", "count": 5, "enabled": true}),
    );
    assert_eq!(
        merged,
        json!({"name": "from-api", "count": 10, "enabled": true})
    );
}

#[test]
fn immutable_field_via_keep_base() {
    let schema = load(json!({
        "type": "object",
        "properties": {
            "immutable": {"x-kfs-merge": {"strategy": "keepBase"}}
        }
    }));
    let merged = merge(
        &schema,
        json!({"immutable": "from-api", "mutable": "from-api"}),
        json!({"immutable": "template", "mutable": "template"}),
    );
    assert_eq!(
        merged,
        json!({"immutable": "template", "mutable": "from-api"})
    );
}

#[test]
fn keyed_array_merge_with_default_replace_on_match() {
    let schema = load(json!({
        "type": "object",
        "properties": {
            "filters": {
                "type": "array",
                "x-kfs-merge": {
                    "strategy": "mergeByDiscriminator",
                    "discriminatorField": "type"
                }
            }
        }
    }));
    let merged = merge(
        &schema,
        json!({"filters": [{"type": "hqdn3d", "value": 12}]}),
        json!({"filters": [
            {"type": "hqdn3d", "value": 8, "extra": "fromB"},
            {"type": "unsharp", "value": 1}
        ]}),
    );
    // A's matched item replaces B's (dropping B's extra); B's unconsumed
    // item is appended.
    assert_eq!(
        merged["filters"],
        json!([
            {"type": "hqdn3d", "value": 12},
            {"type": "unsharp", "value": 1}
        ])
    );
}

#[test]
fn keyed_array_merge_without_replace_on_match() {
    let schema = load(json!({
        "type": "object",
        "properties": {
            "filters": {
                "type": "array",
                "x-kfs-merge": {
                    "strategy": "mergeByDiscriminator",
                    "discriminatorField": "type",
                    "replaceOnMatch": false
                }
            }
        }
    }));
    let merged = merge(
        &schema,
        json!({"filters": [{"type": "hqdn3d", "value": 12}]}),
        json!({"filters": [
            {"type": "hqdn3d", "value": 8, "extra": "fromB"},
            {"type": "unsharp", "value": 1}
        ]}),
    );
    assert_eq!(
        merged["filters"][0],
        json!({"type": "hqdn3d", "value": 12, "extra": "fromB"})
    );
}

#[test]
fn concat_with_unique() {
    let schema = load(json!({
        "type": "object",
        "properties": {
            "tags": {
                "type": "array",
                "x-kfs-merge": {"strategy": "concat", "unique": true}
            }
        }
    }));
    let merged = merge(
        &schema,
        json!({"tags": ["production", "urgent", "custom"]}),
        json!({"tags": ["production", "default", "system"]}),
    );
    assert_eq!(
        merged["tags"],
        json!(["production", "default", "system", "urgent", "custom"])
    );
}

#[test]
fn numeric_max_with_defaults() {
    let schema = load(json!({
        "type": "object",
        "x-kfs-merge": {"applyDefaults": true},
        "properties": {
            "timeout": {
                "type": "integer",
                "default": 30,
                "x-kfs-merge": {"strategy": "numeric", "operation": "max"}
            }
        }
    }));
    let merged = merge(&schema, json!({}), json!({"timeout": 60}));
    assert_eq!(merged, json!({"timeout": 60}));
}

#[test]
fn null_as_absent() {
    let schema = load(json!({
        "type": "object",
        "properties": {
            "value": {
                "type": ["string", "null"],
                "x-kfs-merge": {"nullHandling": "asAbsent"}
            }
        }
    }));
    let merged = merge(
        &schema,
        json!({"value": null}),
        json!({"value": "from-base"}),
    );
    assert_eq!(merged, json!({"value": "from-base"}));
}

#[test]
fn ref_with_definition_level_strategy() {
    let schema = load(json!({
        "type": "object",
        "properties": {
            "config": {"$ref": "#/$defs/Config"}
        },
        "$defs": {
            "Config": {
                "type": "object",
                "x-kfs-merge": {"strategy": "keepBase"}
            }
        }
    }));
    let merged = merge(
        &schema,
        json!({"config": {"name": "from-api"}}),
        json!({"config": {"name": "template"}}),
    );
    assert_eq!(merged, json!({"config": {"name": "template"}}));
}

// ---------------------------------------------------------------------------
// Laws
// ---------------------------------------------------------------------------

#[test]
fn defaults_precedence_is_request_then_base_then_defaults() {
    let schema = load(json!({
        "type": "object",
        "x-kfs-merge": {"applyDefaults": true},
        "properties": {
            "only_default": {"type": "string", "default": "from-defaults"},
            "base_overrides": {"type": "string", "default": "from-defaults"},
            "request_overrides": {"type": "string", "default": "from-defaults"}
        }
    }));
    let merged = merge(
        &schema,
        json!({"request_overrides": "from-api"}),
        json!({"base_overrides": "from-base", "request_overrides": "from-base"}),
    );
    assert_eq!(
        merged,
        json!({
            "base_overrides": "from-base",
            "request_overrides": "from-api",
            "only_default": "from-defaults"
        })
    );
}

#[test]
fn deep_merge_of_disjoint_objects_unions_keys() {
    let schema = load(json!({"type": "object"}));
    let merged = merge(
        &schema,
        json!({"a": 1, "b": {"c": 2}}),
        json!({"x": "y", "z": [3]}),
    );
    assert_eq!(merged, json!({"x": "y", "z": [3], "a": 1, "b": {"c": 2}}));
}

#[test]
fn keyed_merge_covers_every_discriminator_exactly_once() {
    let schema = load(json!({
        "type": "object",
        "properties": {
            "items": {
                "type": "array",
                "x-kfs-merge": {"strategy": "mergeByDiscriminator"}
            }
        }
    }));
    let merged = merge(
        &schema,
        json!({"items": [{"type": "a"}, {"type": "b"}]}),
        json!({"items": [{"type": "b"}, {"type": "c"}]}),
    );
    let types: Vec<&str> = merged["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["a", "b", "c"]);
}

#[test]
fn merging_twice_yields_byte_equivalent_output() {
    let schema = load(json!({"type": "object"}));
    let a = json!({"k": [1, 2.5, null], "m": {"x": true}}).to_string();
    let b = json!({"m": {"y": "s"}, "n": 0}).to_string();
    let first = schema.merge(a.as_bytes(), b.as_bytes()).unwrap();
    let second = schema.merge(a.as_bytes(), b.as_bytes()).unwrap();
    assert_eq!(first, second);
}

// ---------------------------------------------------------------------------
// Pipeline behavior
// ---------------------------------------------------------------------------

#[test]
fn duplicate_keys_in_an_instance_are_rejected() {
    let schema = load(json!({"type": "object"}));
    let err = schema
        .merge(br#"{"a": 1, "a": 2}"#, b"{}")
        .unwrap_err();
    match err {
        MergeError::InputParse { phase, message } => {
            assert_eq!(phase, ValidationPhase::ValidateA);
            assert!(message.contains("duplicate key"));
        }
        other => panic!("expected InputParse, got {other:?}"),
    }
}

#[test]
fn strategy_misuse_surfaces_the_instance_path() {
    let schema = load(json!({
        "type": "object",
        "properties": {
            "counters": {"x-kfs-merge": {"strategy": "numeric"}}
        }
    }));
    let err = schema
        .merge_to_value(
            json!({"counters": "a"}).to_string().as_bytes(),
            json!({"counters": true}).to_string().as_bytes(),
        )
        .unwrap_err();
    match err {
        MergeError::StrategyMisuse { path, .. } => assert_eq!(path, "/counters"),
        other => panic!("expected StrategyMisuse, got {other:?}"),
    }
}

#[test]
fn skip_validation_still_parses_instances() {
    let schema = load(json!({"type": "object"}));
    let options = MergeOptions {
        skip_validate_a: true,
        skip_validate_b: true,
        skip_validate_result: true,
        apply_defaults: None,
    };
    let err = schema
        .merge_with_options(b"{broken", b"{}", options)
        .unwrap_err();
    assert!(matches!(err, MergeError::InputParse { .. }));
}

#[test]
fn legacy_dialect_schema_round_trips() {
    // A schema written entirely in the legacy strategy dialect.
    let schema = load(json!({
        "type": "object",
        "x-kfs-merge": {"defaultStrategy": "mergeRequest", "arrayStrategy": "replace"},
        "properties": {
            "tags": {"x-kfs-merge": {"strategy": "concatUnique"}},
            "filters": {"x-kfs-merge": {"strategy": "mergeByKey", "mergeKey": "name"}},
            "quota": {"x-kfs-merge": {"strategy": "sum"}},
            "patch": {"x-kfs-merge": {"strategy": "overlay"}}
        }
    }));
    let merged = merge(
        &schema,
        json!({
            "tags": ["a", "b"],
            "filters": [{"name": "f1", "v": 2}],
            "quota": 10,
            "patch": {"keep": null, "set": "new"}
        }),
        json!({
            "tags": ["b", "c"],
            "filters": [{"name": "f1", "v": 1}, {"name": "f2"}],
            "quota": 5,
            "patch": {"keep": "old", "other": 1}
        }),
    );
    assert_eq!(merged["tags"], json!(["b", "c", "a"]));
    assert_eq!(
        merged["filters"],
        json!([{"name": "f1", "v": 2}, {"name": "f2"}])
    );
    assert_eq!(merged["quota"], json!(15));
    // overlay: A's null leaves B's value in place, other fields overlay.
    assert_eq!(
        merged["patch"],
        json!({"keep": "old", "other": 1, "set": "new"})
    );
}

#[test]
fn schema_handle_is_shareable_across_threads() {
    let schema = std::sync::Arc::new(load(json!({"type": "object"})));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let schema = std::sync::Arc::clone(&schema);
            std::thread::spawn(move || {
                let a = json!({"i": i}).to_string();
                schema.merge_to_value(a.as_bytes(), b"{\"shared\": true}")
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.join().unwrap().is_ok());
    }
}
