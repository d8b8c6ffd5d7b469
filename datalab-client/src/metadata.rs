//! Dataset metadata sent with an upload

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use datalab_datasets::WrapDatasetDict;

use crate::error::{ClientError, Result};

/// Catalogue entry describing a dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// Name of the dataset in the catalogue
    pub dataset_name: String,

    /// Sub-dataset or configuration name
    pub sub_dataset: Option<String>,

    /// Rows per split
    pub split: BTreeMap<String, usize>,

    /// Free-text summary
    pub summary: Option<String>,

    /// Project homepage
    pub homepage: Option<String>,

    /// Task names, e.g. `text-classification`
    pub tasks: Vec<String>,

    /// Task categories
    pub task_categories: Vec<String>,

    /// Language codes
    #[serde(rename = "language")]
    pub languages: Vec<String>,

    /// How the data was derived, e.g. `{"type": "origin"}`
    pub transformation: Value,

    /// Dataset version
    pub version: String,

    /// Kind of dataset, e.g. `textdataset`
    pub data_typology: Option<String>,

    /// Feature schema
    pub features: Option<Value>,

    /// Who registered the entry
    pub source: String,

    /// Any further catalogue attributes (license, leaderboard, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DatasetMetadata {
    /// Metadata with the catalogue defaults
    pub fn new(dataset_name: impl Into<String>) -> Self {
        Self {
            dataset_name: dataset_name.into(),
            sub_dataset: None,
            split: ["train", "validation", "test"]
                .into_iter()
                .map(|name| (name.to_string(), 0))
                .collect(),
            summary: None,
            homepage: None,
            tasks: vec!["text-classification".to_string()],
            task_categories: vec!["text-classification".to_string()],
            languages: vec!["en".to_string()],
            transformation: json!({"type": "origin"}),
            version: "origin".to_string(),
            data_typology: Some("textdataset".to_string()),
            features: None,
            source: "user".to_string(),
            extra: Map::new(),
        }
    }

    /// Take split sizes from a loaded dataset
    #[must_use]
    pub fn with_split_sizes(mut self, dataset: &WrapDatasetDict) -> Self {
        self.split = dataset
            .splits()
            .map(|split| (split.name().to_string(), split.len()))
            .collect();
        self
    }

    /// Check the fields the catalogue requires
    pub fn validate(&self) -> Result<()> {
        if self.dataset_name.trim().is_empty() {
            return Err(ClientError::Configuration("dataset_name should not be empty".into()));
        }
        if self.transformation.is_null() {
            return Err(ClientError::Configuration("transformation should not be null".into()));
        }
        if self.version.trim().is_empty() {
            return Err(ClientError::Configuration("version should not be empty".into()));
        }
        for (name, list) in [
            ("tasks", &self.tasks),
            ("task_categories", &self.task_categories),
            ("languages", &self.languages),
        ] {
            if list.is_empty() {
                return Err(ClientError::Configuration(format!("{name} should not be empty")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_defaults_are_valid() {
        let metadata = DatasetMetadata::new("mr");

        metadata.validate().unwrap();

        let wire = serde_json::to_value(&metadata).unwrap();
        assert_eq!(wire["language"], json!(["en"]));
        assert_eq!(wire["split"], json!({"test": 0, "train": 0, "validation": 0}));
        assert_eq!(wire["source"], json!("user"));
    }

    #[test_case(|m: &mut DatasetMetadata| m.dataset_name.clear() ; "empty name")]
    #[test_case(|m: &mut DatasetMetadata| m.version.clear() ; "empty version")]
    #[test_case(|m: &mut DatasetMetadata| m.tasks.clear() ; "no tasks")]
    #[test_case(|m: &mut DatasetMetadata| m.task_categories.clear() ; "no task categories")]
    #[test_case(|m: &mut DatasetMetadata| m.languages.clear() ; "no languages")]
    #[test_case(|m: &mut DatasetMetadata| m.transformation = Value::Null ; "null transformation")]
    fn test_invalid_metadata(break_it: fn(&mut DatasetMetadata)) {
        let mut metadata = DatasetMetadata::new("mr");
        break_it(&mut metadata);

        assert!(matches!(metadata.validate(), Err(ClientError::Configuration(_))));
    }

    #[test]
    fn test_extra_attributes_are_flattened() {
        let mut metadata = DatasetMetadata::new("mr");
        metadata.extra.insert("license".into(), json!("CC BY 4.0"));

        let wire = serde_json::to_value(&metadata).unwrap();

        assert_eq!(wire["license"], json!("CC BY 4.0"));
    }
}
