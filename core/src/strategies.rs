//! Array and scalar merge strategies.
//!
//! The dispatch lives in [`Merger::merge_values`](crate::Merger); this
//! module holds the strategy bodies that need more than a line: sequence
//! concatenation, keyed discriminator merging, and numeric reduction.

use std::collections::{HashMap, HashSet};

use serde_json::{Number, Value};

use crate::error::{err_path, MergeError, Result};
use crate::merge::Merger;
use crate::value;

impl Merger<'_> {
    /// Concatenates two sequences as `B-items ++ A-items`. A lone sequence
    /// operand passes through. With `unique`, primitive items are
    /// deduplicated by first occurrence; sequences and mappings are kept
    /// unconditionally.
    pub(crate) fn concat(&self, a: &Value, b: &Value, unique: bool, path: &str) -> Result<Value> {
        let combined: Vec<Value> = match (a.as_array(), b.as_array()) {
            (None, None) => {
                return Err(MergeError::StrategyMisuse {
                    path: err_path(path),
                    message: "concat strategy requires arrays".to_string(),
                });
            }
            (Some(a_items), None) => a_items.clone(),
            (None, Some(b_items)) => b_items.clone(),
            (Some(a_items), Some(b_items)) => b_items.iter().chain(a_items).cloned().collect(),
        };

        if !unique {
            return Ok(Value::Array(combined));
        }

        let mut seen = HashSet::new();
        let mut result = Vec::with_capacity(combined.len());
        for item in combined {
            if value::is_primitive(&item) {
                // Serialized form keys the set; integer and float variants
                // of the same magnitude stay distinct (1 vs 1.0).
                if seen.insert(item.to_string()) {
                    result.push(item);
                }
            } else {
                result.push(item);
            }
        }
        Ok(Value::Array(result))
    }

    /// Merges two sequences of mappings keyed by `field`.
    ///
    /// A's items are walked in order: non-mappings, mappings lacking the
    /// field, and unmatched discriminator values pass through verbatim; a
    /// match either replaces B's item or deep-merges with it. B's unmatched
    /// items are appended afterwards in B's order.
    pub(crate) fn merge_by_discriminator(
        &self,
        a: &Value,
        b: &Value,
        field: &str,
        replace_on_match: bool,
        path: &str,
        depth: usize,
    ) -> Result<Value> {
        if !a.is_array() && !b.is_array() {
            return Err(MergeError::StrategyMisuse {
                path: err_path(path),
                message: "mergeByDiscriminator strategy requires arrays".to_string(),
            });
        }

        let Some(b_items) = b.as_array().filter(|items| !items.is_empty()) else {
            return Ok(a.clone());
        };
        let Some(a_items) = a.as_array().filter(|items| !items.is_empty()) else {
            return Ok(b.clone());
        };

        // Index B by discriminator value; only the first occurrence of a
        // value is indexed, later duplicates pass through verbatim.
        let mut b_index: HashMap<String, usize> = HashMap::new();
        for (index, item) in b_items.iter().enumerate() {
            if let Some(disc_value) = item.as_object().and_then(|obj| obj.get(field)) {
                b_index.entry(disc_value.to_string()).or_insert(index);
            }
        }

        let mut consumed: HashSet<usize> = HashSet::new();
        let mut result = Vec::with_capacity(a_items.len() + b_items.len());

        for (index, a_item) in a_items.iter().enumerate() {
            let Some(disc_value) = a_item.as_object().and_then(|obj| obj.get(field)) else {
                result.push(a_item.clone());
                continue;
            };
            let Some(&b_pos) = b_index.get(&disc_value.to_string()) else {
                result.push(a_item.clone());
                continue;
            };

            if replace_on_match {
                result.push(a_item.clone());
            } else {
                let item_path = format!("{path}/{index}");
                result.push(self.deep_merge(a_item, &b_items[b_pos], &item_path, depth + 1)?);
            }
            consumed.insert(b_pos);
        }

        for (index, b_item) in b_items.iter().enumerate() {
            if !consumed.contains(&index) {
                result.push(b_item.clone());
            }
        }

        Ok(Value::Array(result))
    }

    /// Reduces two numbers with `operation` (`sum`, `max`, or `min`). A
    /// lone numeric operand passes through; max/min return the chosen
    /// operand unchanged, preferring A on ties.
    pub(crate) fn numeric(
        &self,
        a: &Value,
        b: &Value,
        operation: &str,
        path: &str,
    ) -> Result<Value> {
        let (a_num, b_num) = match (value::as_number(a), value::as_number(b)) {
            (None, None) => {
                return Err(MergeError::StrategyMisuse {
                    path: err_path(path),
                    message: format!("numeric strategy ({operation}) requires numbers"),
                });
            }
            (Some(_), None) => return Ok(a.clone()),
            (None, Some(_)) => return Ok(b.clone()),
            (Some(a_num), Some(b_num)) => (a_num, b_num),
        };

        match operation {
            "sum" => sum_numbers(a_num, b_num, path),
            "max" => {
                if value::number_magnitude(a_num) >= value::number_magnitude(b_num) {
                    Ok(a.clone())
                } else {
                    Ok(b.clone())
                }
            }
            "min" => {
                if value::number_magnitude(a_num) <= value::number_magnitude(b_num) {
                    Ok(a.clone())
                } else {
                    Ok(b.clone())
                }
            }
            other => Err(MergeError::StrategyMisuse {
                path: err_path(path),
                message: format!("unknown numeric operation \"{other}\""),
            }),
        }
    }
}

/// Adds two numbers, staying integral when both operands are integral and
/// promoting to floating otherwise.
fn sum_numbers(a: &Number, b: &Number, path: &str) -> Result<Value> {
    if a.is_f64() || b.is_f64() {
        let total = value::number_magnitude(a) + value::number_magnitude(b);
        return Number::from_f64(total)
            .map(Value::Number)
            .ok_or_else(|| MergeError::NumericOverflow {
                path: err_path(path),
            });
    }

    let total = value::integer_value(a) + value::integer_value(b);
    if let Ok(value) = i64::try_from(total) {
        Ok(Value::from(value))
    } else if let Ok(value) = u64::try_from(total) {
        Ok(Value::from(value))
    } else {
        Err(MergeError::NumericOverflow {
            path: err_path(path),
        })
    }
}
