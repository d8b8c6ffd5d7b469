//! Statistics over a whole container
//!
//! Aggregating functions receive a list holding the processed value of every
//! record and return a single sample.

use std::collections::HashMap;

use serde_json::{json, Value};

use datalab_core::{text_input, wrap_value, OperationDescriptor, OperationFamily, Resources, Sample};

fn texts(input: &Value) -> anyhow::Result<Vec<&str>> {
    input
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("expected a list of texts, got {input}"))?
        .iter()
        .map(text_input)
        .collect()
}

/// Mean number of space-separated words; `0.0` for an empty container
pub fn get_average_length(input: Value, _resources: &Resources) -> anyhow::Result<Sample> {
    let texts = texts(&input)?;
    if texts.is_empty() {
        return Ok(wrap_value("average_length", 0.0));
    }

    let total: usize = texts.iter().map(|text| text.split(' ').count()).sum();
    #[allow(clippy::cast_precision_loss)]
    let average = total as f64 / texts.len() as f64;
    Ok(wrap_value("average_length", average))
}

/// Word frequencies, most frequent first; ties keep first-seen order
pub fn get_vocabulary(input: Value, _resources: &Resources) -> anyhow::Result<Sample> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for text in texts(&input)? {
        for word in text.split(' ') {
            let next = counts.len();
            counts.entry(word).or_insert((0, next)).0 += 1;
        }
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(word, (count, first_seen))| (word, count, first_seen))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    let vocabulary: Vec<Value> = ranked
        .into_iter()
        .map(|(word, count, _)| json!({"word": word, "count": count}))
        .collect();
    Ok(wrap_value("vocabulary", vocabulary))
}

/// Aggregating operations of this module
pub fn operations() -> Vec<OperationDescriptor> {
    vec![
        OperationFamily::Aggregating
            .registrar()
            .name("get_average_length")
            .contributor("datalab")
            .description("average number of words per text")
            .register(get_average_length),
        OperationFamily::Aggregating
            .registrar()
            .name("get_vocabulary")
            .contributor("datalab")
            .description("word frequencies over all texts")
            .register(get_vocabulary),
    ]
}
