//! Text normalization

use std::collections::HashSet;

use serde_json::Value;
use unicode_segmentation::UnicodeSegmentation;

use datalab_core::{text_input, wrap_value, OperationDescriptor, OperationFamily, Resources, Sample};

/// Stopwords used when the operation carries no `stopwords` resource
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "that", "the", "this", "to", "was", "with",
];

/// Lowercase a text
pub fn lower(input: Value, _resources: &Resources) -> anyhow::Result<Sample> {
    let text = text_input(&input)?;
    Ok(wrap_value("text_lower", text.to_lowercase()))
}

/// Split a text into Unicode words
pub fn tokenize(input: Value, _resources: &Resources) -> anyhow::Result<Sample> {
    let text = text_input(&input)?;
    let tokens: Vec<Value> = text.unicode_words().map(Value::from).collect();
    Ok(wrap_value("text_tokenize", tokens))
}

/// Drop stopwords, case-insensitively, and rejoin with single spaces.
///
/// The `stopwords` resource, a list of strings, replaces the default list.
pub fn remove_stopwords(input: Value, resources: &Resources) -> anyhow::Result<Sample> {
    let text = text_input(&input)?;
    let stopwords: HashSet<String> = match resources.get("stopwords") {
        Some(Value::Array(words)) => words
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_lowercase)
            .collect(),
        Some(other) => anyhow::bail!("stopwords resource must be a list, got {other}"),
        None => DEFAULT_STOPWORDS.iter().map(|word| (*word).to_string()).collect(),
    };

    let kept: Vec<&str> = text
        .unicode_words()
        .filter(|word| !stopwords.contains(&word.to_lowercase()))
        .collect();
    Ok(wrap_value("text_without_stopwords", kept.join(" ")))
}

/// Preprocessing operations of this module
pub fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationFamily::Preprocessing
            .registrar()
            .name("lower")
            .contributor("datalab")
            .description("this function is used to lowercase a given text")
            .register(lower),
        OperationFamily::Preprocessing
            .registrar()
            .name("tokenize")
            .contributor("datalab")
            .description("this function is used to tokenize a text into words")
            .register(tokenize),
        OperationFamily::Preprocessing
            .registrar()
            .name("remove_stopwords")
            .contributor("datalab")
            .description("this function is used to remove stopwords from a text")
            .register(remove_stopwords),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lower() {
        let out = lower(json!("Hello World"), &Resources::new()).unwrap();
        assert_eq!(out["text_lower"], json!("hello world"));
    }

    #[test]
    fn test_tokenize_skips_punctuation() {
        let out = tokenize(json!("Hello, world! It's fine."), &Resources::new()).unwrap();
        assert_eq!(out["text_tokenize"], json!(["Hello", "world", "It's", "fine"]));
    }

    #[test]
    fn test_remove_stopwords_default_and_resource() {
        let default = remove_stopwords(json!("The cat is on the mat"), &Resources::new()).unwrap();
        assert_eq!(default["text_without_stopwords"], json!("cat mat"));

        let mut resources = Resources::new();
        resources.insert("stopwords".into(), json!(["cat"]));
        let custom = remove_stopwords(json!("The cat is on the mat"), &resources).unwrap();
        assert_eq!(custom["text_without_stopwords"], json!("The is on the mat"));
    }

    #[test]
    fn test_remove_stopwords_bad_resource() {
        let mut resources = Resources::new();
        resources.insert("stopwords".into(), json!("the"));
        assert!(remove_stopwords(json!("the cat"), &resources).is_err());
    }
}
