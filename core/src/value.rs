//! JSON value parsing and classification helpers.
//!
//! Instances are parsed through [`parse_instance`], which builds a
//! [`serde_json::Value`] while rejecting duplicate mapping keys (plain
//! `serde_json` silently keeps the last occurrence). Mapping insertion order
//! is preserved via the `preserve_order` feature, which the merge engine
//! relies on for its output-ordering guarantees.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};

/// Parses instance bytes into a [`Value`], rejecting duplicate mapping keys
/// and trailing garbage.
///
/// # Examples
///
/// ```
/// use kfs_merge_core::parse_instance;
///
/// let value = parse_instance(br#"{"a": 1, "b": [true, null]}"#).unwrap();
/// assert_eq!(value["a"], 1);
///
/// assert!(parse_instance(br#"{"a": 1, "a": 2}"#).is_err());
/// ```
pub fn parse_instance(bytes: &[u8]) -> Result<Value, serde_json::Error> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let value = StrictValue::deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(value.0)
}

/// A [`Value`] wrapper whose `Deserialize` impl rejects duplicate map keys.
struct StrictValue(Value);

impl<'de> Deserialize<'de> for StrictValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StrictValueVisitor)
    }
}

struct StrictValueVisitor;

impl<'de> Visitor<'de> for StrictValueVisitor {
    type Value = StrictValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("any JSON value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(StrictValue(Value::Bool(v)))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(StrictValue(Value::from(v)))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(StrictValue(Value::from(v)))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(StrictValue(Value::from(v)))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(StrictValue(Value::String(v.to_string())))
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(StrictValue(Value::Null))
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(StrictValue(item)) = seq.next_element()? {
            items.push(item);
        }
        Ok(StrictValue(Value::Array(items)))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut entries = Map::new();
        while let Some(key) = map.next_key::<String>()? {
            let StrictValue(value) = map.next_value()?;
            if entries.insert(key.clone(), value).is_some() {
                return Err(de::Error::custom(format!("duplicate key \"{key}\"")));
            }
        }
        Ok(StrictValue(Value::Object(entries)))
    }
}

/// Returns `true` for values that participate in concat deduplication.
///
/// Matches strings, booleans, and numbers. Nulls, sequences, and mappings
/// are retained unconditionally by `concat` with `unique`.
pub(crate) fn is_primitive(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Bool(_) | Value::Number(_)
    )
}

/// Returns the number behind a value, if it is one.
pub(crate) fn as_number(value: &Value) -> Option<&Number> {
    match value {
        Value::Number(number) => Some(number),
        _ => None,
    }
}

/// Numeric magnitude for comparisons. Lossy above 2^53 but total for any
/// JSON number, which is all the ordering strategies need.
pub(crate) fn number_magnitude(number: &Number) -> f64 {
    number.as_f64().unwrap_or_default()
}

/// Widens an integral number to `i128` for overflow-checked arithmetic.
pub(crate) fn integer_value(number: &Number) -> i128 {
    number
        .as_i64()
        .map(i128::from)
        .or_else(|| number.as_u64().map(i128::from))
        .unwrap_or_default()
}
