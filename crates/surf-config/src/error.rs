//! Settings errors

use crate::value::ValueKind;
use std::path::PathBuf;
use thiserror::Error;

/// A rejected `set`; the store is left unchanged
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid setting path: '{0}'")]
    InvalidPath(String),

    #[error("Unknown setting: {0}")]
    UnknownKey(String),

    #[error("Setting {path} expects a {expected}, got a {found}")]
    TypeMismatch {
        path: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("Setting {0} is not a map")]
    NotAMap(String),

    #[error("Invalid value for setting {path}: {value}")]
    Rejected { path: String, value: String },
}

/// Load/save/export/import failure; the in-memory tree is kept
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Settings document {0} is not a JSON object")]
    NotAnObject(PathBuf),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}
