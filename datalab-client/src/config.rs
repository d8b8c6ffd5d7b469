//! Client configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default upload endpoint
pub const DEFAULT_ENDPOINT: &str = "https://datalab.nlpedia.ai/api/upload_new_dataset";

/// Configuration for [`crate::Client`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upload endpoint
    pub endpoint: String,

    /// Account role sent with every upload
    pub role: String,

    /// Visibility of uploaded datasets
    pub status: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Samples taken from each split
    pub max_samples_per_split: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            role: "user".to_string(),
            status: "private".to_string(),
            timeout_secs: 60,
            max_samples_per_split: 50_000,
        }
    }
}

impl ClientConfig {
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
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, r#"{"endpoint": "http://localhost:8080/upload", "status": "public"}"#).unwrap();

        let config = ClientConfig::from_json_file(&path).unwrap();

        assert_eq!(config.endpoint, "http://localhost:8080/upload");
        assert_eq!(config.status, "public");
        assert_eq!(config.role, "user");
        assert_eq!(config.max_samples_per_split, 50_000);
    }
}
