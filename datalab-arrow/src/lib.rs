//! Columnar persistence for DataLab splits
//!
//! Splits persisted at the LOCAL tier live on disk as Arrow IPC stream files,
//! with a JSON side-car recording the type of every field added at that tier.
//! This crate reads and rewrites those files and converts between record
//! batches and samples.

#![warn(missing_docs)]

pub mod io;
pub mod ipc;
pub mod sidecar;
pub mod table;

pub use io::{stage_file, write_atomic, StagedFile};
pub use ipc::{
    read_table, stage_table, write_arrow_table, write_table, ArrowTable, StagedTable, WriteStats,
    END_OF_STREAM,
};
pub use sidecar::{FieldTypes, SchemaSidecar};
pub use table::{
    append_column, batch_from_samples, column_from_values, drop_column, has_column,
    replace_column, row, rows, type_tag,
};

/// Re-export of the arrow crate so downstream crates agree on its version
pub use arrow;
