//! Sample and data-kind definitions shared by operations and datasets

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single record: a mapping from field name to value
pub type Sample = Map<String, Value>;

/// Auxiliary data handed to an operation function on every call (lexicons,
/// label-to-answer tables, thresholds)
pub type Resources = Map<String, Value>;

/// Field that text containers wrap raw scalars under
pub const TEXT_FIELD: &str = "text";

/// Field that structured containers wrap raw scalars under
pub const STRUCTURED_FIELD: &str = "structured_data";

/// Field that XML containers wrap raw scalars under
pub const XML_FIELD: &str = "xml";

/// Kind of data an operation targets or a container holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataKind {
    /// Untyped records
    Data,

    /// Records carrying a `text` field
    TextData,

    /// Records carrying a `structured_data` field
    StructuredData,

    /// Records carrying an `xml` field
    XmlData,

    /// Whole labeled samples of a dataset split
    Dataset,
}

impl DataKind {
    /// Field raw scalars are wrapped under when a container of this kind is built
    /// from a scalar sequence
    pub fn wrap_field(self) -> &'static str {
        match self {
            DataKind::StructuredData => STRUCTURED_FIELD,
            DataKind::XmlData => XML_FIELD,
            DataKind::Data | DataKind::TextData | DataKind::Dataset => TEXT_FIELD,
        }
    }

    /// Name used in documentation records
    pub fn as_str(self) -> &'static str {
        match self {
            DataKind::Data => "Data",
            DataKind::TextData => "TextData",
            DataKind::StructuredData => "StructuredData",
            DataKind::XmlData => "XMLData",
            DataKind::Dataset => "Dataset",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wrap one raw value under `field`
pub fn wrap_value(field: &str, value: impl Into<Value>) -> Sample {
    let mut sample = Sample::new();
    sample.insert(field.to_string(), value.into());
    sample
}

/// Merge `overrides` into `base`; keys present in both take the override
pub fn merge(mut base: Sample, overrides: Sample) -> Sample {
    for (key, value) in overrides {
        base.insert(key, value);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wrap_field_per_kind() {
        assert_eq!(DataKind::TextData.wrap_field(), "text");
        assert_eq!(DataKind::StructuredData.wrap_field(), "structured_data");
        assert_eq!(DataKind::XmlData.wrap_field(), "xml");
    }

    #[test]
    fn test_merge_prefers_overrides() {
        let base = wrap_value("text", "a");
        let mut overrides = wrap_value("text", "b");
        overrides.insert("length".into(), json!(1));

        let merged = merge(base, overrides);

        assert_eq!(merged["text"], json!("b"));
        assert_eq!(merged["length"], json!(1));
    }
}
