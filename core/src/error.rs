//! Error types for schema loading, validation, and merging.
//!
//! All failure modes surface through [`MergeError`]. Validation failures
//! carry the [`ValidationPhase`](crate::ValidationPhase) in which they were
//! detected plus the JSON-pointer path of the offending value; merge-time
//! failures carry the instance path at which the strategy was applied.

use thiserror::Error;

use crate::types::ValidationPhase;

/// Errors that can occur while loading a schema or merging instances.
#[derive(Debug, Error)]
pub enum MergeError {
    /// File I/O failure while loading a schema.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport failure while fetching a schema from a URL.
    #[error("failed to fetch schema: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Non-success HTTP status while fetching a schema from a URL.
    #[error("failed to fetch schema: HTTP {status}")]
    FetchStatus {
        /// The HTTP status code returned by the server.
        status: u16,
    },

    /// Schema bytes are not valid JSON, the schema root is not an object,
    /// or an `x-kfs-merge` extension value is not an object.
    #[error("failed to parse schema: {0}")]
    SchemaParse(String),

    /// The schema parsed but did not compile as a JSON Schema.
    #[error("failed to compile schema: {0}")]
    SchemaCompile(String),

    /// Instance bytes are not valid JSON (includes duplicate mapping keys).
    #[error("failed to parse instance [{phase}]: {message}")]
    InputParse {
        /// Phase in which the instance was being parsed.
        phase: ValidationPhase,
        /// The underlying parser message.
        message: String,
    },

    /// An instance failed schema validation.
    #[error("validation failed [{phase}] at {path}: {message}")]
    Validation {
        /// Phase in which validation ran.
        phase: ValidationPhase,
        /// JSON-pointer path of the failing value (`/` for the root).
        path: String,
        /// The validator's message.
        message: String,
    },

    /// A strategy was applied to operands it cannot handle, or a strategy
    /// option (such as a numeric operation tag) was not recognized.
    #[error("strategy misuse at {path}: {message}")]
    StrategyMisuse {
        /// Instance path at which the strategy was dispatched.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// A strategy name outside both the canonical and legacy dialects was
    /// encountered during a merge. Unknown names are accepted at load time
    /// and rejected only when the engine reaches them.
    #[error("unknown merge strategy \"{name}\" at {path}")]
    UnknownStrategy {
        /// Instance path at which the strategy was dispatched.
        path: String,
        /// The unrecognized strategy name as written in the schema.
        name: String,
    },

    /// Input nesting exceeded the engine's recursion limit.
    #[error("merge recursion limit exceeded at {path}")]
    RecursionLimit {
        /// Instance path at which the limit was hit.
        path: String,
    },

    /// Integer arithmetic overflowed, or a floating sum left the finite range.
    #[error("numeric overflow at {path}")]
    NumericOverflow {
        /// Instance path of the numeric reduction.
        path: String,
    },

    /// The merged result could not be serialized back to JSON bytes.
    #[error("failed to serialize result: {0}")]
    Serialize(String),
}

/// Convenience alias for results with [`MergeError`].
pub type Result<T> = std::result::Result<T, MergeError>;

/// Normalizes an instance path for error display; the root path is `/`.
pub(crate) fn err_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}
