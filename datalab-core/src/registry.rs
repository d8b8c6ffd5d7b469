//! Explicit operation registry
//!
//! Operations are installed by a registration call during start-up rather than
//! as a side effect of loading a module.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::operation::{OperationDescriptor, OperationFamily, OperationInfo};

/// Operations keyed by family and name
#[derive(Debug, Default, Clone)]
pub struct OperationRegistry {
    operations: BTreeMap<(OperationFamily, String), OperationDescriptor>,
}

impl OperationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operation; names must be non-empty and unique within a family
    pub fn register(&mut self, operation: OperationDescriptor) -> Result<()> {
        if operation.name().is_empty() {
            return Err(Error::Configuration(format!(
                "{} operation has no name",
                operation.family()
            )));
        }

        let key = (operation.family(), operation.name().to_string());
        if self.operations.contains_key(&key) {
            return Err(Error::DuplicateOperation {
                name: key.1,
                family: key.0.to_string(),
            });
        }

        tracing::debug!(operation = %key.1, family = %key.0, "registered operation");
        self.operations.insert(key, operation);
        Ok(())
    }

    /// Add several operations, stopping at the first duplicate
    pub fn register_all(&mut self, operations: impl IntoIterator<Item = OperationDescriptor>) -> Result<()> {
        operations
            .into_iter()
            .try_for_each(|operation| self.register(operation))
    }

    /// Look up an operation by family and name
    pub fn get(&self, family: OperationFamily, name: &str) -> Result<&OperationDescriptor> {
        self.operations
            .get(&(family, name.to_string()))
            .ok_or_else(|| Error::UnknownOperation(format!("{family}::{name}")))
    }

    /// Look up an operation by name across all families; the first family in
    /// declaration order wins
    pub fn find(&self, name: &str) -> Result<&OperationDescriptor> {
        self.operations
            .iter()
            .find(|((_, candidate), _)| candidate == name)
            .map(|(_, operation)| operation)
            .ok_or_else(|| Error::UnknownOperation(name.to_string()))
    }

    /// All operations of one family, ordered by name
    pub fn family(&self, family: OperationFamily) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations
            .iter()
            .filter(move |((candidate, _), _)| *candidate == family)
            .map(|(_, operation)| operation)
    }

    /// Documentation records, ordered by family then name
    pub fn list(&self) -> Vec<OperationInfo> {
        self.operations.values().map(OperationDescriptor::info).collect()
    }

    /// Number of registered operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
