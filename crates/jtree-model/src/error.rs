//! Error types for loading, saving and mutating a tree document.

use serde_json::{Map, Value};
use thiserror::Error;

/// Why a load attempt was rejected.
///
/// Every variant is terminal for the attempt: the document is left cleared and
/// the error (with the offending map, when there is one) is retained for
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("empty input")]
    EmptyInput,

    #[error("JSON parser error: line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("missing or invalid version field `{key}`")]
    MissingVersion { key: String },

    #[error("unsupported JSON version: {found}, max supported: {max}")]
    UnsupportedVersion { found: i64, max: i64 },

    #[error("missing or invalid `_headers_` descriptor")]
    MissingOrInvalidHeaders { map: Map<String, Value> },

    #[error("invalid item map")]
    InvalidMap { map: Map<String, Value> },

    #[error("I/O error: {message}")]
    Io { message: String },
}

impl LoadError {
    /// The raw map that caused the failure, when the failure is tied to one.
    #[must_use]
    pub fn offending_map(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::MissingOrInvalidHeaders { map } | Self::InvalidMap { map } => Some(map),
            _ => None,
        }
    }

    pub(crate) fn from_json(err: &serde_json::Error) -> Self {
        Self::Parse {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}

/// Why a save attempt failed. In-memory state is never touched by a failed save.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("nothing to save: document is empty")]
    EmptyDocument,

    #[error("JSON serializer error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("error writing, requested {requested}, written {written}")]
    ShortWrite { requested: usize, written: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejection reasons for structural mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("row count must be non-zero")]
    ZeroCount,

    #[error("parent index does not resolve to a node")]
    UnresolvedParent,

    #[error("rows {row}..{row}+{count} out of range for {len} children")]
    RowOutOfRange { row: usize, count: usize, len: usize },
}

/// Errors raised while reading a configuration profile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for `{key}`: {value}")]
    InvalidValue { key: String, value: String },

    #[error("unknown special flag: {name}")]
    UnknownFlag { name: String },
}
