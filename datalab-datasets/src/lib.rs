//! Dataset wrap layer for DataLab
//!
//! Loads a multi-split dataset and lets callers attach computed fields to it,
//! either evaluated lazily on access, materialized in memory, or written back to
//! the split files on disk.

#![warn(missing_docs)]

pub mod config;
pub mod loader;
pub mod split;
pub mod wrap;

pub use config::WrapConfig;
pub use loader::{read_json_lines, ArrowDirLoader, DatasetLoader, JsonLinesLoader, MemoryLoader};
pub use split::Split;
pub use wrap::{
    handler, load_dataset, load_dataset_with_config, ApplyRows, FieldHandle, Handler, Rows, Save,
    WrapDataset, WrapDatasetDict,
};

// Re-export core types
pub use datalab_core::{Error, Result, Sample};
