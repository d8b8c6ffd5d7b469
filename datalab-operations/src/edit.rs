//! Text perturbations

use std::collections::HashMap;

use serde_json::Value;
use unicode_segmentation::UnicodeSegmentation;

use datalab_core::{text_input, wrap_value, OperationDescriptor, OperationFamily, Resources, Sample};

const WEEKDAY_MONTH_ABBREVIATIONS: &[(&str, &str)] = &[
    ("Monday", "Mon."),
    ("Tuesday", "Tue."),
    ("Wednesday", "Wed."),
    ("Thursday", "Thu."),
    ("Friday", "Fri."),
    ("Saturday", "Sat."),
    ("Sunday", "Sun."),
    ("January", "Jan."),
    ("February", "Feb."),
    ("March", "Mar."),
    ("April", "Apr."),
    ("August", "Aug."),
    ("September", "Sep."),
    ("October", "Oct."),
    ("November", "Nov."),
    ("December", "Dec."),
];

/// Replace whole words found in `abbreviations` and abbreviations found in
/// `expansions`, keeping every other segment as is. A key ending in `.`
/// matches a word followed by a full stop.
fn replace_words(
    text: &str,
    abbreviations: &HashMap<String, String>,
    expansions: &HashMap<String, String>,
) -> String {
    let mut out = String::with_capacity(text.len());
    let mut segments = text.split_word_bounds().peekable();
    while let Some(segment) = segments.next() {
        if segments.peek() == Some(&".") {
            if let Some(word) = expansions.get(&format!("{segment}.")) {
                out.push_str(word);
                segments.next();
                continue;
            }
        }
        let replacement = abbreviations
            .get(segment)
            .or_else(|| expansions.get(segment));
        out.push_str(replacement.map_or(segment, String::as_str));
    }
    out
}

fn string_table(resources: &Resources, key: &str) -> anyhow::Result<Option<HashMap<String, String>>> {
    match resources.get(key) {
        Some(Value::Object(entries)) => entries
            .iter()
            .map(|(from, to)| match to.as_str() {
                Some(to) => Ok((from.clone(), to.to_string())),
                None => anyhow::bail!("{key} entry '{from}' must be a string"),
            })
            .collect::<anyhow::Result<_>>()
            .map(Some),
        Some(other) => anyhow::bail!("{key} resource must be an object, got {other}"),
        None => Ok(None),
    }
}

/// Abbreviate names of weekdays and months, and expand their abbreviations.
///
/// An `abbreviations` resource (word to abbreviation) replaces the built-in
/// English table. An `expansions` resource (abbreviation to word) does the
/// same for the other direction and otherwise defaults to the inverse of the
/// abbreviations in use.
pub fn abbreviate_weekday_month(input: Value, resources: &Resources) -> anyhow::Result<Sample> {
    let text = text_input(&input)?;
    let abbreviations = string_table(resources, "abbreviations")?.unwrap_or_else(|| {
        WEEKDAY_MONTH_ABBREVIATIONS
            .iter()
            .map(|(word, short)| ((*word).to_string(), (*short).to_string()))
            .collect()
    });
    let expansions = string_table(resources, "expansions")?.unwrap_or_else(|| {
        abbreviations
            .iter()
            .map(|(word, short)| (short.clone(), word.clone()))
            .collect()
    });
    Ok(wrap_value(
        "text_weekday_month_abbreviate",
        replace_words(text, &abbreviations, &expansions),
    ))
}

/// Editing operations of this module
pub fn operations() -> Vec<OperationDescriptor> {
    vec![OperationFamily::Editing
        .registrar()
        .name("abbreviate_weekday_month")
        .contributor("xl_augmenter")
        .description(
            "this function adds noise to all types of text sources containing names of weekdays or months",
        )
        .register(abbreviate_weekday_month)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_abbreviates_whole_words_only() {
        let out = abbreviate_weekday_month(
            json!("See you on Monday, 3 January. Mondays are long."),
            &Resources::new(),
        )
        .unwrap();

        assert_eq!(
            out["text_weekday_month_abbreviate"],
            json!("See you on Mon., 3 Jan.. Mondays are long.")
        );
    }

    #[test]
    fn test_expands_abbreviations() {
        let out =
            abbreviate_weekday_month(json!("Mon. and Tuesday, Dec. 24"), &Resources::new()).unwrap();

        assert_eq!(
            out["text_weekday_month_abbreviate"],
            json!("Monday and Tue., December 24")
        );
    }

    #[test]
    fn test_custom_expansions() {
        let mut resources = Resources::new();
        resources.insert("expansions".into(), json!({"Mo.": "Montag"}));

        let out = abbreviate_weekday_month(json!("Mo. und Mon."), &resources).unwrap();

        assert_eq!(out["text_weekday_month_abbreviate"], json!("Montag und Mon."));
    }

    #[test]
    fn test_custom_table() {
        let mut resources = Resources::new();
        resources.insert("abbreviations".into(), json!({"Montag": "Mo."}));

        let out = abbreviate_weekday_month(json!("Montag und Monday"), &resources).unwrap();

        assert_eq!(out["text_weekday_month_abbreviate"], json!("Mo. und Monday"));
    }
}
