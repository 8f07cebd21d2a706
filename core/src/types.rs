//! Merge strategy and configuration types.
//!
//! The engine dispatches on a closed set of canonical strategies. Schema
//! files may also use the older strategy dialect (`mergeRequest`,
//! `concatUnique`, `mergeByKey`, `overlay`, `sum`, `max`, `min`), which is
//! collapsed into the canonical set while the schema is loaded, so the
//! engine itself never sees a legacy name.

use std::fmt;

/// Canonical merge strategies.
///
/// Controls how a single `merge(a, b, path)` step combines its operands:
/// `a` is the request (takes precedence by default), `b` is the base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Always use the base's (B) value, ignoring the request (A).
    KeepBase,
    /// Always use the request's (A) value, ignoring the base (B).
    KeepRequest,
    /// Recursively merge objects field-by-field, A winning on conflict.
    /// The default for non-array values.
    DeepMerge,
    /// Use A's value entirely when it is non-null, else B's. The default
    /// for arrays.
    Replace,
    /// Append A's array items to B's; the `unique` option deduplicates
    /// primitive items.
    Concat,
    /// Merge arrays of objects by a discriminator field.
    MergeByDiscriminator,
    /// Reduce two numbers with the configured operation (sum, max, min).
    Numeric,
}

/// A strategy reference as written in a schema.
///
/// Unrecognized names are accepted at load time and kept verbatim; the
/// merge engine rejects them with
/// [`MergeError::UnknownStrategy`](crate::MergeError::UnknownStrategy) when
/// a merge actually reaches them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategySpec {
    /// A canonical strategy (possibly collapsed from a legacy name).
    Resolved(MergeStrategy),
    /// A name outside both dialects.
    Unrecognized(String),
}

/// How explicit `null` values are treated during a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullHandling {
    /// `null` is a value: a null in A overwrites B (the default).
    #[default]
    AsValue,
    /// `null` behaves as if the field were absent: the counterpart wins.
    AsAbsent,
    /// Preserve nulls from A; same effect as [`NullHandling::AsValue`],
    /// retained for schema-file compatibility.
    Preserve,
}

impl NullHandling {
    /// Parses a mode string from a schema. Unrecognized modes are ignored
    /// so the enclosing configuration falls back to the global setting.
    pub(crate) fn parse(mode: &str) -> Option<NullHandling> {
        match mode {
            "asValue" => Some(NullHandling::AsValue),
            "asAbsent" => Some(NullHandling::AsAbsent),
            "preserve" => Some(NullHandling::Preserve),
            _ => None,
        }
    }
}

/// Schema-level merge configuration, read from the root `x-kfs-merge` node.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalMergeConfig {
    /// Fallback strategy for non-array values without an explicit strategy.
    pub default_strategy: StrategySpec,
    /// Fallback strategy for array values without an explicit strategy.
    pub array_strategy: StrategySpec,
    /// Null treatment for paths without a per-field override.
    pub null_handling: NullHandling,
    /// Whether schema `default` values are spliced beneath B before merging.
    pub apply_defaults: bool,
}

impl Default for GlobalMergeConfig {
    fn default() -> Self {
        Self {
            default_strategy: StrategySpec::Resolved(MergeStrategy::DeepMerge),
            array_strategy: StrategySpec::Resolved(MergeStrategy::Replace),
            null_handling: NullHandling::AsValue,
            apply_defaults: false,
        }
    }
}

/// Per-field merge configuration, read from a subschema `x-kfs-merge` node.
///
/// Every field is optional; `None` means "not specified here", letting the
/// engine apply its strategy-specific defaults (`replaceOnMatch` defaults to
/// `true` for the discriminator merge, `unique` to `false`, `operation` to
/// `sum`, and the discriminator field to `"type"`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldMergeConfig {
    /// The strategy for this path; empty means fall back to the global
    /// default at merge time.
    pub strategy: Option<StrategySpec>,
    /// Key field for [`MergeStrategy::MergeByDiscriminator`].
    pub discriminator_field: Option<String>,
    /// Whether a discriminator match replaces B's item instead of deep
    /// merging with it.
    pub replace_on_match: Option<bool>,
    /// Whether [`MergeStrategy::Concat`] deduplicates primitive items.
    pub unique: Option<bool>,
    /// Operation tag for [`MergeStrategy::Numeric`]: `sum`, `max`, or `min`.
    pub operation: Option<String>,
    /// Null treatment override for this subtree.
    pub null_handling: Option<NullHandling>,
}

impl FieldMergeConfig {
    /// Applies a strategy name from a schema, collapsing the legacy dialect
    /// into the canonical set. Legacy names that bundle an option
    /// (`concatUnique`, `sum`, `max`, `min`, `overlay`) populate the
    /// corresponding option field unless the schema set it explicitly.
    pub(crate) fn apply_strategy_name(&mut self, name: &str) {
        let resolved = match name {
            "keepBase" => MergeStrategy::KeepBase,
            "keepRequest" => MergeStrategy::KeepRequest,
            "deepMerge" | "mergeRequest" => MergeStrategy::DeepMerge,
            "replace" => MergeStrategy::Replace,
            "concat" => MergeStrategy::Concat,
            "concatUnique" => {
                self.unique.get_or_insert(true);
                MergeStrategy::Concat
            }
            "mergeByDiscriminator" | "mergeByKey" => MergeStrategy::MergeByDiscriminator,
            "numeric" => MergeStrategy::Numeric,
            "sum" | "max" | "min" => {
                self.operation.get_or_insert_with(|| name.to_string());
                MergeStrategy::Numeric
            }
            "overlay" => {
                self.null_handling.get_or_insert(NullHandling::AsAbsent);
                MergeStrategy::DeepMerge
            }
            other => {
                self.strategy = Some(StrategySpec::Unrecognized(other.to_string()));
                return;
            }
        };
        self.strategy = Some(StrategySpec::Resolved(resolved));
    }
}

/// Controls validation and defaults behavior for a single merge call.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Skip validation of instance A.
    pub skip_validate_a: bool,
    /// Skip validation of instance B.
    pub skip_validate_b: bool,
    /// Skip validation of the merged result.
    pub skip_validate_result: bool,
    /// Overrides the schema's `applyDefaults` setting; `None` defers to it.
    pub apply_defaults: Option<bool>,
}

/// The stage of the merge pipeline a validation failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPhase {
    /// Validating the request instance (A).
    ValidateA,
    /// Validating the base instance (B).
    ValidateB,
    /// Validating the merged result.
    ValidateResult,
}

impl fmt::Display for ValidationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ValidationPhase::ValidateA => "validate_a",
            ValidationPhase::ValidateB => "validate_b",
            ValidationPhase::ValidateResult => "validate_result",
        };
        f.write_str(tag)
    }
}
