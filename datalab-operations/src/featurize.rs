//! Per-record features of a text

use serde_json::Value;
use unicode_segmentation::UnicodeSegmentation;

use datalab_core::{text_input, wrap_value, OperationDescriptor, OperationFamily, Resources, Sample};

/// Number of space-separated words
pub fn get_length(input: Value, _resources: &Resources) -> anyhow::Result<Sample> {
    let text = text_input(&input)?;
    Ok(wrap_value("length", text.split(' ').count()))
}

/// Number of user-perceived characters
pub fn get_number_of_characters(input: Value, _resources: &Resources) -> anyhow::Result<Sample> {
    let text = text_input(&input)?;
    Ok(wrap_value("number_of_characters", text.graphemes(true).count()))
}

/// Number of Unicode words, ignoring punctuation and whitespace
pub fn get_number_of_tokens(input: Value, _resources: &Resources) -> anyhow::Result<Sample> {
    let text = text_input(&input)?;
    Ok(wrap_value("number_of_tokens", text.unicode_words().count()))
}

/// Featurizing operations of this module
pub fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationFamily::Featurizing
            .registrar()
            .name("get_length")
            .contributor("datalab")
            .description("This function is used to calculate the length of a text")
            .register(get_length),
        OperationFamily::Featurizing
            .registrar()
            .name("get_number_of_characters")
            .contributor("datalab")
            .description("Count the characters of a text")
            .register(get_number_of_characters),
        OperationFamily::Featurizing
            .registrar()
            .name("get_number_of_tokens")
            .contributor("datalab")
            .description("Count the word tokens of a text")
            .register(get_number_of_tokens),
    ]
}
