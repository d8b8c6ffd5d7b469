//! Dataset loaders
//!
//! A loader knows how to (re)produce every split of a dataset. The wrap layer
//! keeps its loader so that a dataset can be reloaded after its on-disk tables
//! were rewritten.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use datalab_arrow::{batch_from_samples, read_table, write_table};
use datalab_core::{Error, Result, Sample};

use crate::split::Split;

/// Default extension of stream files
pub const ARROW_EXTENSION: &str = "arrow";

/// Produces the splits of a dataset
pub trait DatasetLoader: fmt::Debug + Send + Sync {
    /// Load every split, in a stable order
    fn load(&self) -> Result<Vec<Split>>;
}

/// Every stream file in a directory is a split named after its file stem
#[derive(Debug, Clone)]
pub struct ArrowDirLoader {
    dir: PathBuf,
    extension: String,
}

impl ArrowDirLoader {
    /// Load `*.arrow` files from `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: ARROW_EXTENSION.to_string(),
        }
    }

    /// Use a different file extension
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Directory the splits are read from
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DatasetLoader for ArrowDirLoader {
    fn load(&self) -> Result<Vec<Split>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|ext| ext.to_str()) == Some(self.extension.as_str())
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(Error::Configuration(format!(
                "no .{} files in {}",
                self.extension,
                self.dir.display()
            )));
        }

        paths
            .into_iter()
            .map(|path| {
                let name = split_name(&path)?;
                let table = read_table(&path)?.concat()?;
                debug!(split = %name, rows = table.num_rows(), "loaded split");
                Ok(Split::backed(name, table, path))
            })
            .collect()
    }
}

/// JSON-lines files converted to stream files once and reused afterwards
#[derive(Debug, Clone)]
pub struct JsonLinesLoader {
    files: Vec<(String, PathBuf)>,
    cache_dir: PathBuf,
    extension: String,
}

impl JsonLinesLoader {
    /// Cache converted splits under `cache_dir`
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            files: Vec::new(),
            cache_dir: cache_dir.into(),
            extension: ARROW_EXTENSION.to_string(),
        }
    }

    /// Add a split read from `path`
    #[must_use]
    pub fn split(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.files.push((name.into(), path.into()));
        self
    }

    /// Use a different extension for cache files
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Cache file of split `name`
    pub fn cache_file(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{name}.{}", self.extension))
    }

    fn convert(&self, name: &str, source: &Path, cache: &Path) -> Result<()> {
        let samples = read_json_lines(source)?;
        let batch = batch_from_samples(&samples)?;
        fs::create_dir_all(&self.cache_dir)?;
        write_table(cache, &batch.schema(), &[batch])?;
        info!(split = %name, rows = samples.len(), cache = %cache.display(), "converted split to cache file");
        Ok(())
    }
}

impl DatasetLoader for JsonLinesLoader {
    fn load(&self) -> Result<Vec<Split>> {
        if self.files.is_empty() {
            return Err(Error::Configuration("no splits configured".into()));
        }

        self.files
            .iter()
            .map(|(name, source)| {
                let cache = self.cache_file(name);
                if !cache.exists() {
                    self.convert(name, source, &cache)?;
                }
                let table = read_table(&cache)?.concat()?;
                Ok(Split::backed(name.clone(), table, cache))
            })
            .collect()
    }
}

/// Splits held in memory with no backing file
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    splits: Vec<(String, Vec<Sample>)>,
}

impl MemoryLoader {
    /// An empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a split
    #[must_use]
    pub fn split(mut self, name: impl Into<String>, samples: Vec<Sample>) -> Self {
        self.splits.push((name.into(), samples));
        self
    }
}

impl DatasetLoader for MemoryLoader {
    fn load(&self) -> Result<Vec<Split>> {
        self.splits
            .iter()
            .map(|(name, samples)| Ok(Split::in_memory(name.clone(), batch_from_samples(samples)?)))
            .collect()
    }
}

/// Parse one JSON object per non-blank line
pub fn read_json_lines(path: &Path) -> Result<Vec<Sample>> {
    fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}

fn split_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Configuration(format!("cannot name split from {}", path.display())))
}
