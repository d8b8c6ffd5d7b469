//! Built-in operations for DataLab
//!
//! Nothing here registers itself. Call [`register_builtin`] once at start-up to
//! install the library into an [`OperationRegistry`], or pick operations from the
//! per-family modules.

#![warn(missing_docs)]

pub mod aggregate;
pub mod edit;
pub mod featurize;
pub mod preprocess;
pub mod prompt;

use serde_json::{json, Value};

use datalab_core::{OperationDescriptor, OperationRegistry, Result};

/// Answers the prompting operations use until a caller swaps the
/// `labels_to_answers` resource with [`OperationDescriptor::with_resource`]
pub fn default_labels_to_answers() -> Value {
    json!({"0": "negative", "1": "positive"})
}

/// Every built-in operation
pub fn builtin_operations() -> Vec<OperationDescriptor> {
    let mut operations = featurize::operations();
    operations.extend(preprocess::operations());
    operations.extend(edit::operations());
    operations.extend(prompt::operations(default_labels_to_answers()));
    operations.extend(aggregate::operations());
    operations
}

/// Install every built-in operation into `registry`
pub fn register_builtin(registry: &mut OperationRegistry) -> Result<()> {
    let operations = builtin_operations();
    let count = operations.len();
    registry.register_all(operations)?;
    tracing::info!(count, "registered built-in operations");
    Ok(())
}
