//! Schema-driven merging of JSON instances.
//!
//! This crate merges two JSON instances — the *request* (A) and the *base*
//! (B) — according to rules embedded in a JSON Schema via the `x-kfs-merge`
//! extension keyword. Both instances are validated against the schema, the
//! merge engine combines them (A takes precedence by default), and the
//! result is validated again before it is returned.
//!
//! The schema can redirect any subtree to an alternative strategy: keep one
//! side, deep merge, array concatenation, keyed merging of object arrays on
//! a discriminator field, numeric reduction, or default injection from the
//! schema's `default` annotations.
//!
//! # Example
//!
//! ```
//! use kfs_merge_core::Schema;
//!
//! let schema = Schema::load(br#"{
//!     "type": "object",
//!     "properties": {
//!         "tags": {
//!             "type": "array",
//!             "x-kfs-merge": {"strategy": "concat", "unique": true}
//!         },
//!         "immutable": {"x-kfs-merge": {"strategy": "keepBase"}}
//!     }
//! }"#).unwrap();
//!
//! let merged = schema.merge(
//!     br#"{"tags": ["urgent"], "immutable": "from-api"}"#,
//!     br#"{"tags": ["default"], "immutable": "template"}"#,
//! ).unwrap();
//!
//! let value: serde_json::Value = serde_json::from_slice(&merged).unwrap();
//! assert_eq!(value["tags"], serde_json::json!(["default", "urgent"]));
//! assert_eq!(value["immutable"], "template");
//! ```
//!
//! A loaded [`Schema`] is immutable and can be shared across threads;
//! merges on the same handle run independently.

mod api;
mod error;
mod merge;
mod schema;
mod strategies;
mod types;
mod validate;
mod value;

pub use error::{MergeError, Result};
pub use merge::Merger;
pub use schema::{Schema, MERGE_EXTENSION_KEY};
pub use types::{
    FieldMergeConfig, GlobalMergeConfig, MergeOptions, MergeStrategy, NullHandling, StrategySpec,
    ValidationPhase,
};
pub use validate::Validator;
pub use value::parse_instance;
