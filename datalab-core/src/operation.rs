//! Operation descriptors, families, and the registrar that builds them
//!
//! An operation is a named, documented wrapper around a single-sample function.
//! Every family shares the same invocation semantics and differs only in the
//! defaults listed in [`OperationFamily::defaults`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::sample::{DataKind, Resources, Sample};

/// The wrapped transformation: one selected input plus resources in, one mapping out
pub type OperationFn = Arc<dyn Fn(Value, &Resources) -> anyhow::Result<Sample> + Send + Sync>;

/// Task tag used when an operation applies to any task
pub const ANY_TASK: &str = "Any";

/// Family an operation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OperationFamily {
    /// Plain operation function with no family specialization
    Generic,

    /// Normalize, tokenize, or stem raw text
    Preprocessing,

    /// Compute a scalar or structured feature from text
    Featurizing,

    /// Produce a perturbed or edited variant of text
    Editing,

    /// Reformat a labeled sample into a prompt/answer pair
    Prompting,

    /// Prompting specialized for text classification samples
    TextClassificationPrompting,

    /// Run a model-style transformation on text
    Inference,

    /// Compute one statistic over a whole container
    Aggregating,
}

/// Fixed configuration of a family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyDefaults {
    /// Discriminant string reported as the operation `type`
    pub type_name: &'static str,

    /// Data type the family targets
    pub data_type: DataKind,

    /// Fields consumed when the caller declares none
    pub processed_fields: &'static [&'static str],

    /// Task tag when the caller declares none
    pub task: &'static str,
}

impl OperationFamily {
    /// Every family, in documentation order
    pub const ALL: [OperationFamily; 8] = [
        OperationFamily::Generic,
        OperationFamily::Preprocessing,
        OperationFamily::Featurizing,
        OperationFamily::Editing,
        OperationFamily::Prompting,
        OperationFamily::TextClassificationPrompting,
        OperationFamily::Inference,
        OperationFamily::Aggregating,
    ];

    /// Defaults applied to descriptors of this family
    pub fn defaults(self) -> FamilyDefaults {
        const TEXT: &[&str] = &["text"];
        const TEXT_LABEL: &[&str] = &["text", "label"];

        let (type_name, data_type, processed_fields, task) = match self {
            OperationFamily::Generic => ("OperationFunction", DataKind::Data, TEXT, ANY_TASK),
            OperationFamily::Preprocessing => ("Preprocessing", DataKind::TextData, TEXT, ANY_TASK),
            OperationFamily::Featurizing => ("Featurizing", DataKind::TextData, TEXT, ANY_TASK),
            OperationFamily::Editing => ("Editing", DataKind::TextData, TEXT, ANY_TASK),
            OperationFamily::Prompting => ("Prompting", DataKind::TextData, TEXT, ANY_TASK),
            OperationFamily::TextClassificationPrompting => (
                "TextClassificationPrompting",
                DataKind::Dataset,
                TEXT_LABEL,
                "text-classification",
            ),
            OperationFamily::Inference => ("Inference", DataKind::TextData, TEXT, ANY_TASK),
            OperationFamily::Aggregating => ("Aggregating", DataKind::Dataset, TEXT, ANY_TASK),
        };

        FamilyDefaults {
            type_name,
            data_type,
            processed_fields,
            task,
        }
    }

    /// Discriminant string of this family
    pub fn type_name(self) -> &'static str {
        self.defaults().type_name
    }

    /// Data type this family targets
    pub fn data_type(self) -> DataKind {
        self.defaults().data_type
    }

    /// Whether operations of this family consume a whole container at once
    pub fn aggregates(self) -> bool {
        matches!(self, OperationFamily::Aggregating)
    }

    /// Start a parameterized registration for this family
    pub fn registrar(self) -> Registrar {
        Registrar::new(self)
    }

    /// Register `function` directly, deriving the name from its identifier
    pub fn operation<F>(self, function: F) -> OperationDescriptor
    where
        F: Fn(Value, &Resources) -> anyhow::Result<Sample> + Send + Sync + 'static,
    {
        Registrar::new(self).register(function)
    }
}

impl fmt::Display for OperationFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Serializable documentation record for an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationInfo {
    /// Operation name
    pub name: String,

    /// Family discriminant
    #[serde(rename = "type")]
    pub kind: String,

    /// Targeted data type
    pub data_type: String,

    /// Applicable task
    pub task: String,

    /// Provenance of the operation
    pub contributor: Option<String>,

    /// Human-readable description
    pub description: Option<String>,

    /// Fields consumed from each sample
    pub processed_fields: Vec<String>,

    /// Column the output is conventionally stored under
    pub generated_field: Option<String>,

    /// Prompt template, for prompting families
    pub template: Option<String>,
}

/// A named, typed wrapper around a single-sample transformation
#[derive(Clone)]
pub struct OperationDescriptor {
    name: String,
    function: Option<OperationFn>,
    resources: Resources,
    contributor: Option<String>,
    task: String,
    description: Option<String>,
    family: OperationFamily,
    processed_fields: Vec<String>,
    generated_field: Option<String>,
    template: Option<String>,
}

impl OperationDescriptor {
    /// Operation name, unique within its family
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Family of this operation
    pub fn family(&self) -> OperationFamily {
        self.family
    }

    /// Family discriminant string
    pub fn type_name(&self) -> &'static str {
        self.family.type_name()
    }

    /// Targeted data type
    pub fn data_type(&self) -> DataKind {
        self.family.data_type()
    }

    /// Applicable task tag
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Provenance string
    pub fn contributor(&self) -> Option<&str> {
        self.contributor.as_deref()
    }

    /// Human-readable description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Ordered input fields the function consumes
    pub fn processed_fields(&self) -> &[String] {
        &self.processed_fields
    }

    /// Column the output is conventionally stored under
    pub fn generated_field(&self) -> Option<&str> {
        self.generated_field.as_deref()
    }

    /// Prompt template, if any
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// Resources passed to every call
    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Whether a function is attached
    pub fn has_function(&self) -> bool {
        self.function.is_some()
    }

    /// Copy of this descriptor consuming a different field list
    pub fn with_processed_fields<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            processed_fields: fields.into_iter().map(Into::into).collect(),
            ..self.clone()
        }
    }

    /// Copy of this descriptor with one resource added or replaced
    pub fn with_resource(&self, key: &str, value: impl Into<Value>) -> Self {
        let mut resources = self.resources.clone();
        resources.insert(key.to_string(), value.into());
        Self {
            resources,
            ..self.clone()
        }
    }

    /// Pick the function input from a sample.
    ///
    /// A single declared field present in the sample yields that scalar; any other
    /// shape yields the whole sample as an object.
    pub fn select_input(&self, sample: &Sample) -> Value {
        if let [field] = self.processed_fields.as_slice() {
            if let Some(value) = sample.get(field) {
                return value.clone();
            }
        }
        Value::Object(sample.clone())
    }

    /// Call the function on an already selected input
    pub fn call(&self, input: Value) -> Result<Sample> {
        let function = self.function.as_ref().ok_or_else(|| {
            Error::Configuration(format!("operation '{}' has no function to invoke", self.name))
        })?;

        if self.processed_fields.is_empty() {
            return Err(Error::Configuration(format!(
                "operation '{}' declares no processed fields",
                self.name
            )));
        }

        function(input, &self.resources).map_err(|source| Error::Operation {
            name: self.name.clone(),
            source,
        })
    }

    /// Route one sample through the function
    pub fn invoke(&self, sample: &Sample) -> Result<Sample> {
        self.call(self.select_input(sample))
    }

    /// Documentation record for this operation
    pub fn info(&self) -> OperationInfo {
        OperationInfo {
            name: self.name.clone(),
            kind: self.type_name().to_string(),
            data_type: self.data_type().to_string(),
            task: self.task.clone(),
            contributor: self.contributor.clone(),
            description: self.description.clone(),
            processed_fields: self.processed_fields.clone(),
            generated_field: self.generated_field.clone(),
            template: self.template.clone(),
        }
    }
}

impl fmt::Debug for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDescriptor")
            .field("name", &self.name)
            .field("type", &self.type_name())
            .field("task", &self.task)
            .field("processed_fields", &self.processed_fields)
            .field("has_function", &self.function.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for descriptors that carry metadata
#[derive(Debug, Clone)]
pub struct Registrar {
    family: OperationFamily,
    name: Option<String>,
    resources: Resources,
    contributor: Option<String>,
    task: Option<String>,
    description: Option<String>,
    processed_fields: Option<Vec<String>>,
    generated_field: Option<String>,
    template: Option<String>,
}

impl Registrar {
    /// Create a registrar for a family with no metadata
    pub fn new(family: OperationFamily) -> Self {
        Self {
            family,
            name: None,
            resources: Resources::new(),
            contributor: None,
            task: None,
            description: None,
            processed_fields: None,
            generated_field: None,
            template: None,
        }
    }

    /// Set the operation name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the provenance string
    pub fn contributor(mut self, contributor: impl Into<String>) -> Self {
        self.contributor = Some(contributor.into());
        self
    }

    /// Set the task tag
    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace all resources
    pub fn resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    /// Add one resource
    pub fn resource(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.resources.insert(key.to_string(), value.into());
        self
    }

    /// Declare the consumed fields
    pub fn processed_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.processed_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Set the output column name
    pub fn generated_field(mut self, field: impl Into<String>) -> Self {
        self.generated_field = Some(field.into());
        self
    }

    /// Set the prompt template
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Attach `function` and produce the descriptor.
    ///
    /// Without an explicit name the function's own identifier is used. A
    /// function pointer has no identifier and leaves the name empty, which
    /// [`crate::OperationRegistry::register`] rejects; give it a [`Self::name`].
    pub fn register<F>(self, function: F) -> OperationDescriptor
    where
        F: Fn(Value, &Resources) -> anyhow::Result<Sample> + Send + Sync + 'static,
    {
        let name = self.name.clone().unwrap_or_else(function_name::<F>);
        self.finish(name, Some(Arc::new(function)))
    }

    /// Produce a metadata-only descriptor; invoking it is a configuration error
    pub fn build(self) -> OperationDescriptor {
        let name = self.name.clone().unwrap_or_default();
        self.finish(name, None)
    }

    fn finish(self, name: String, function: Option<OperationFn>) -> OperationDescriptor {
        let defaults = self.family.defaults();
        let processed_fields = self.processed_fields.unwrap_or_else(|| {
            defaults
                .processed_fields
                .iter()
                .map(|field| (*field).to_string())
                .collect()
        });

        tracing::trace!(operation = %name, family = %self.family, "building operation descriptor");

        OperationDescriptor {
            name,
            function,
            resources: self.resources,
            contributor: self.contributor,
            task: self.task.unwrap_or_else(|| defaults.task.to_string()),
            description: self.description,
            family: self.family,
            processed_fields,
            generated_field: self.generated_field,
            template: self.template,
        }
    }
}

/// Last path segment of a function's type name (`crate::featurize::get_length`
/// becomes `get_length`). Closures resolve to their enclosing function. Types
/// that are not paths, such as `fn(..)` pointers, give an empty name.
fn function_name<F>() -> String {
    let full = std::any::type_name::<F>();
    let path = full.split(['<', '(']).next().unwrap_or(full);
    if !path.contains("::") {
        return String::new();
    }
    path.rsplit("::")
        .find(|segment| !segment.starts_with("{{"))
        .unwrap_or(path)
        .to_string()
}

/// Borrow a string input, failing with a readable message otherwise
pub fn text_input(input: &Value) -> anyhow::Result<&str> {
    input
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("expected a string input, got {input}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::wrap_value;
    use serde_json::json;
    use test_case::test_case;

    fn get_length(input: Value, _resources: &Resources) -> anyhow::Result<Sample> {
        let text = text_input(&input)?;
        Ok(wrap_value("length", text.split(' ').count()))
    }

    fn echo(input: Value, _resources: &Resources) -> anyhow::Result<Sample> {
        Ok(wrap_value("input", input))
    }

    fn sample() -> Sample {
        let mut sample = wrap_value("text", "I love this movie");
        sample.insert("label".into(), json!("positive"));
        sample
    }

    #[test_case(&["text"], json!("I love this movie") ; "single present field passes scalar")]
    #[test_case(&["label"], json!("positive") ; "single label field passes scalar")]
    #[test_case(&["missing"], json!({"text": "I love this movie", "label": "positive"}) ; "single absent field passes sample")]
    #[test_case(&["text", "label"], json!({"text": "I love this movie", "label": "positive"}) ; "two fields pass sample")]
    fn test_dispatch_rule(fields: &[&str], expected: Value) {
        let op = OperationFamily::Generic
            .registrar()
            .processed_fields(fields.iter().copied())
            .register(echo);

        let output = op.invoke(&sample()).unwrap();

        assert_eq!(output["input"], expected);
    }

    #[test]
    fn test_direct_and_builder_paths_match() {
        let direct = OperationFamily::Featurizing.operation(get_length);
        let built = OperationFamily::Featurizing.registrar().register(get_length);

        assert_eq!(direct.name(), "get_length");
        assert_eq!(direct.name(), built.name());
        assert_eq!(direct.processed_fields(), built.processed_fields());
        assert_eq!(direct.info(), built.info());
        assert_eq!(
            direct.invoke(&sample()).unwrap(),
            built.invoke(&sample()).unwrap()
        );
    }

    #[test]
    fn test_function_pointer_has_no_derived_name() {
        let pointer: fn(Value, &Resources) -> anyhow::Result<Sample> = get_length;

        let op = OperationFamily::Featurizing.operation(pointer);

        assert_eq!(op.name(), "");
        assert_eq!(
            OperationFamily::Featurizing.registrar().name("length").register(pointer).name(),
            "length"
        );
    }

    #[test]
    fn test_builder_metadata() {
        let op = OperationFamily::Featurizing
            .registrar()
            .name("length")
            .contributor("datalab")
            .description("word count")
            .register(get_length);

        assert_eq!(op.name(), "length");
        assert_eq!(op.contributor(), Some("datalab"));
        assert_eq!(op.task(), ANY_TASK);
        assert_eq!(op.type_name(), "Featurizing");
        assert_eq!(op.data_type(), DataKind::TextData);
    }

    #[test]
    fn test_family_defaults() {
        let op = OperationFamily::TextClassificationPrompting.operation(echo);

        assert_eq!(op.processed_fields(), ["text", "label"]);
        assert_eq!(op.task(), "text-classification");
        assert_eq!(op.data_type(), DataKind::Dataset);
        assert!(OperationFamily::ALL
            .iter()
            .all(|family| !family.defaults().processed_fields.is_empty()));
    }

    #[test]
    fn test_missing_function_is_configuration_error() {
        let op = OperationFamily::Editing.registrar().name("noop").build();

        assert!(!op.has_function());
        assert!(matches!(op.invoke(&sample()), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_empty_fields_is_configuration_error() {
        let op = OperationFamily::Generic
            .operation(echo)
            .with_processed_fields(Vec::<String>::new());

        assert!(matches!(op.invoke(&sample()), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_function_error_propagates() {
        let op = OperationFamily::Featurizing.operation(get_length);
        let bad = wrap_value("text", 42);

        match op.invoke(&bad) {
            Err(Error::Operation { name, source }) => {
                assert_eq!(name, "get_length");
                assert!(source.to_string().contains("expected a string"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_resources_are_passed() {
        let op = OperationFamily::Generic
            .registrar()
            .name("suffix")
            .resource("suffix", "!")
            .register(|input: Value, resources: &Resources| {
                let text = text_input(&input)?;
                let suffix = resources["suffix"].as_str().unwrap_or_default();
                Ok(wrap_value("text", format!("{text}{suffix}")))
            });

        let output = op.invoke(&wrap_value("text", "hi")).unwrap();

        assert_eq!(output["text"], json!("hi!"));
    }
}
