//! Wrap layer configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use datalab_core::Result;

/// Configuration for a wrapped dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WrapConfig {
    /// Extension of the schema side-car written beside each stream file
    pub sidecar_extension: String,

    /// Evaluate eager handlers on the rayon pool; requires the `parallel`
    /// feature and is ignored otherwise
    pub parallel: bool,

    /// Split rewritten tables into batches of at most this many rows
    pub max_rows_per_batch: Option<usize>,
}

impl Default for WrapConfig {
    fn default() -> Self {
        Self {
            sidecar_extension: "json".to_string(),
            parallel: false,
            max_rows_per_batch: None,
        }
    }
}

impl WrapConfig {
    /// Read a configuration from a JSON file; absent keys take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wrap.json");
        std::fs::write(&path, r#"{"max_rows_per_batch": 64}"#).unwrap();

        let config = WrapConfig::from_json_file(&path).unwrap();

        assert_eq!(config.max_rows_per_batch, Some(64));
        assert_eq!(config.sidecar_extension, "json");
        assert!(!config.parallel);
    }
}
