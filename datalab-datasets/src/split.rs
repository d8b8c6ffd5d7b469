//! Named splits of a dataset

use std::path::{Path, PathBuf};

use datalab_arrow::arrow::record_batch::RecordBatch;

/// One named partition of a dataset
#[derive(Debug, Clone)]
pub struct Split {
    /// Split name, e.g. `train`
    name: String,

    /// Current in-memory table
    table: RecordBatch,

    /// Backing stream file, if the split was loaded from disk
    cache_file: Option<PathBuf>,
}

impl Split {
    /// A split with no backing file
    pub fn in_memory(name: impl Into<String>, table: RecordBatch) -> Self {
        Self {
            name: name.into(),
            table,
            cache_file: None,
        }
    }

    /// A split backed by a stream file
    pub fn backed(name: impl Into<String>, table: RecordBatch, cache_file: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            table,
            cache_file: Some(cache_file.into()),
        }
    }

    /// Split name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current table
    pub fn table(&self) -> &RecordBatch {
        &self.table
    }

    /// Backing file
    pub fn cache_file(&self) -> Option<&Path> {
        self.cache_file.as_deref()
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.table.num_rows()
    }

    /// Column names in table order
    pub fn column_names(&self) -> Vec<String> {
        self.table
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect()
    }

    pub(crate) fn set_table(&mut self, table: RecordBatch) {
        self.table = table;
    }
}
