//! Prompt templates for text classification
//!
//! Prompting functions receive the whole sample (`text` and `label`) and read
//! the `labels_to_answers` resource: either an object keyed by label or a list
//! indexed by label. Answer choices are listed in the object's insertion order.

use serde_json::{Map, Value};

use datalab_core::{OperationDescriptor, OperationFamily, Resources, Sample};

/// Template of [`template_p1`]
pub const TEMPLATE_P1: &str = "Given the text: {text}, is it about {texture_choices}";

/// Template of [`template_p2`]
pub const TEMPLATE_P2: &str = "Given the text: {text}, it is about [mask]";

fn field<'a>(sample: &'a Map<String, Value>, name: &str) -> anyhow::Result<&'a Value> {
    sample
        .get(name)
        .ok_or_else(|| anyhow::anyhow!("sample has no '{name}' field"))
}

fn answers(resources: &Resources) -> anyhow::Result<Vec<&str>> {
    let answers: Vec<&Value> = match resources.get("labels_to_answers") {
        Some(Value::Object(table)) => table.values().collect(),
        Some(Value::Array(table)) => table.iter().collect(),
        _ => anyhow::bail!("labels_to_answers resource is missing"),
    };
    answers
        .into_iter()
        .map(|answer| {
            answer
                .as_str()
                .ok_or_else(|| anyhow::anyhow!("answer {answer} is not a string"))
        })
        .collect()
}

fn answer_for<'a>(resources: &'a Resources, label: &Value) -> anyhow::Result<&'a str> {
    let answer = match (resources.get("labels_to_answers"), label) {
        (Some(Value::Object(table)), Value::String(key)) => table.get(key),
        (Some(Value::Object(table)), other) => table.get(&other.to_string()),
        (Some(Value::Array(table)), Value::Number(index)) => index
            .as_u64()
            .and_then(|index| usize::try_from(index).ok())
            .and_then(|index| table.get(index)),
        _ => None,
    };
    answer
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("no answer for label {label}"))
}

/// `"a, b or c?"`
fn choices(answers: &[&str]) -> String {
    match answers.split_last() {
        Some((last, [])) => format!("{last}?"),
        Some((last, rest)) => format!("{} or {last}?", rest.join(", ")),
        None => String::new(),
    }
}

fn prompt(
    input: &Value,
    resources: &Resources,
    text_prompt: impl Fn(&str) -> anyhow::Result<String>,
) -> anyhow::Result<Sample> {
    let sample = input
        .as_object()
        .ok_or_else(|| anyhow::anyhow!("expected a sample with text and label, got {input}"))?;
    let text = field(sample, "text")?
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("text must be a string"))?;
    let label = field(sample, "label")?;

    let mut out = Sample::new();
    out.insert("text_prompt".into(), Value::from(text_prompt(text)?));
    out.insert("label_prompt".into(), Value::from(answer_for(resources, label)?));
    Ok(out)
}

/// Ask which of the answers the text is about
pub fn template_p1(input: Value, resources: &Resources) -> anyhow::Result<Sample> {
    prompt(&input, resources, |text| {
        Ok(TEMPLATE_P1
            .replace("{text}", text)
            .replace("{texture_choices}", &choices(&answers(resources)?)))
    })
}

/// Masked prompt over the text
pub fn template_p2(input: Value, resources: &Resources) -> anyhow::Result<Sample> {
    prompt(&input, resources, |text| Ok(TEMPLATE_P2.replace("{text}", text)))
}

/// Text classification prompting operations of this module, answering with
/// `labels_to_answers`
pub fn operations(labels_to_answers: Value) -> Vec<OperationDescriptor> {
    vec![
        OperationFamily::TextClassificationPrompting
            .registrar()
            .name("template_p1")
            .contributor("datalab")
            .template(TEMPLATE_P1)
            .description("prompt that lists every answer option")
            .resource("labels_to_answers", labels_to_answers.clone())
            .register(template_p1),
        OperationFamily::TextClassificationPrompting
            .registrar()
            .name("template_p2")
            .contributor("datalab")
            .template(TEMPLATE_P2)
            .description("masked prompt for the answer")
            .resource("labels_to_answers", labels_to_answers)
            .register(template_p2),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use datalab_core::wrap_value;
    use serde_json::json;

    fn review(text: &str, label: Value) -> Sample {
        let mut sample = wrap_value("text", text);
        sample.insert("label".into(), label);
        sample
    }

    #[test]
    fn test_template_p1_through_descriptor() {
        let ops = operations(json!({"0": "negative", "1": "positive"}));

        let out = ops[0].invoke(&review("I love this movie", json!(1))).unwrap();

        assert_eq!(
            out["text_prompt"],
            json!("Given the text: I love this movie, is it about negative or positive?")
        );
        assert_eq!(out["label_prompt"], json!("positive"));
        assert_eq!(ops[0].task(), "text-classification");
        assert_eq!(ops[0].template(), Some(TEMPLATE_P1));
    }

    #[test]
    fn test_choices_follow_label_table_order() {
        let table: Map<String, Value> = (0..11)
            .map(|label| (label.to_string(), json!(format!("a{label}"))))
            .collect();
        let ops = operations(Value::Object(table));

        let out = ops[0].invoke(&review("x", json!(10))).unwrap();

        assert_eq!(
            out["text_prompt"],
            json!("Given the text: x, is it about a0, a1, a2, a3, a4, a5, a6, a7, a8, a9 or a10?")
        );
        assert_eq!(out["label_prompt"], json!("a10"));
    }

    #[test]
    fn test_template_p2_with_list_answers() {
        let ops = operations(json!(["negative", "positive"]));

        let out = ops[1].invoke(&review("meh", json!(0))).unwrap();

        assert_eq!(out["text_prompt"], json!("Given the text: meh, it is about [mask]"));
        assert_eq!(out["label_prompt"], json!("negative"));
    }

    #[test]
    fn test_unknown_label_fails() {
        let ops = operations(json!({"0": "negative"}));
        assert!(ops[1].invoke(&review("meh", json!(7))).is_err());
    }

    #[test]
    fn test_choices_formatting() {
        assert_eq!(choices(&["a"]), "a?");
        assert_eq!(choices(&["a", "b", "c"]), "a, b or c?");
    }
}
