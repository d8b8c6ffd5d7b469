//! Error types for DataLab operations and datasets

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use thiserror::Error;

/// Result type for DataLab operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for DataLab operations
#[derive(Error, Debug)]
pub enum Error {
    /// An operation or dataset is missing something it needs to run
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A registration or column that does not exist was removed
    #[error("Field not found: '{field}'{}", split_suffix(.split))]
    FieldNotFound {
        /// Name of the missing field
        field: String,
        /// Split the lookup happened in, if any
        split: Option<String>,
    },

    /// Column length or type disagrees with the split or the side-car schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The on-disk table could not be rewritten
    #[error("Persistence error for {}: {source}", .path.display())]
    Persistence {
        /// File being written
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: io::Error,
    },

    /// A wrapped operation function failed
    #[error("Operation '{name}' failed: {source}")]
    Operation {
        /// Name of the failing operation
        name: String,
        /// Error returned by the function
        #[source]
        source: anyhow::Error,
    },

    /// A registered field handler failed
    #[error("Handler for field '{field}' failed: {source}")]
    Handler {
        /// Field the handler computes
        field: String,
        /// Error returned by the handler
        #[source]
        source: anyhow::Error,
    },

    /// No operation with this name is registered
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// An operation with this name is already registered in the family
    #[error("Duplicate operation '{name}' in family {family}")]
    DuplicateOperation {
        /// Operation name
        name: String,
        /// Family type tag
        family: String,
    },

    /// The dataset has no split with this name
    #[error("Unknown split: {0}")]
    UnknownSplit(String),

    /// Row index out of bounds
    #[error("Index {index} out of bounds for split of length {len}")]
    IndexOutOfBounds {
        /// Requested row
        index: usize,
        /// Number of rows in the split
        len: usize,
    },

    /// Columnar library error
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error during file operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn split_suffix(split: &Option<String>) -> String {
    split
        .as_ref()
        .map(|name| format!(" in split '{name}'"))
        .unwrap_or_default()
}

impl Error {
    /// Build a [`Error::FieldNotFound`] scoped to a split
    pub fn field_not_found(field: &str, split: Option<&str>) -> Self {
        Self::FieldNotFound {
            field: field.to_string(),
            split: split.map(str::to_string),
        }
    }

    /// Build a [`Error::Persistence`] for a path
    pub fn persistence(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}
