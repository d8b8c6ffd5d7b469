//! Data containers that stream records through operations
//!
//! A container holds a re-iterable, lazy record sequence. [`Data::apply`] clones
//! the sequence and pulls one record per result, so memory use does not grow
//! with the number of records and the container itself is never mutated.

use std::iter::FusedIterator;

use serde_json::Value;

use crate::error::Result;
use crate::operation::OperationDescriptor;
use crate::sample::{merge, wrap_value, DataKind, Sample};

/// A named sequence of samples of one kind
#[derive(Debug, Clone)]
pub struct Data<I> {
    /// Kind of the records
    kind: DataKind,

    /// Optional container name
    name: Option<String>,

    /// Lazy record sequence; cloned for every pass
    records: I,
}

impl<I> Data<I>
where
    I: Iterator<Item = Sample> + Clone,
{
    /// Build a container from already mapped samples
    pub fn from_records<R>(kind: DataKind, records: R) -> Self
    where
        R: IntoIterator<IntoIter = I>,
    {
        Self {
            kind,
            name: None,
            records: records.into_iter(),
        }
    }

    /// Set the container name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Kind of the records
    pub fn kind(&self) -> DataKind {
        self.kind
    }

    /// Container name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// A fresh pass over the records
    pub fn records(&self) -> I {
        self.records.clone()
    }

    /// Stream every record through `operation`.
    ///
    /// The returned iterator is single-pass; call `apply` again to restart.
    /// Aggregating operations yield exactly one result built from all records.
    pub fn apply<'op>(&self, operation: &'op OperationDescriptor) -> Apply<'op, I> {
        Apply::new(self.records.clone(), operation)
    }

    /// Stream every record through several operations, merging their outputs
    /// per record in order
    pub fn apply_all<'op>(&self, operations: &'op [OperationDescriptor]) -> ApplyAll<'op, I> {
        ApplyAll {
            records: self.records.clone(),
            operations,
        }
    }
}

/// Iterator adapter that wraps raw scalars under a fixed field
#[derive(Debug, Clone)]
pub struct Wrapped<J> {
    field: &'static str,
    inner: J,
}

impl<J> Iterator for Wrapped<J>
where
    J: Iterator,
    J::Item: Into<Value>,
{
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        self.inner.next().map(|raw| wrap_value(self.field, raw))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<J> Data<Wrapped<J>>
where
    J: Iterator + Clone,
    J::Item: Into<Value>,
{
    /// Wrap raw scalars of a container kind under its canonical field
    pub fn from_raw<R>(kind: DataKind, raw: R) -> Self
    where
        R: IntoIterator<IntoIter = J>,
    {
        Self {
            kind,
            name: None,
            records: Wrapped {
                field: kind.wrap_field(),
                inner: raw.into_iter(),
            },
        }
    }

    /// Text container: every scalar becomes `{"text": scalar}`
    pub fn text<R>(raw: R) -> Self
    where
        R: IntoIterator<IntoIter = J>,
    {
        Self::from_raw(DataKind::TextData, raw)
    }

    /// Structured container: every scalar becomes `{"structured_data": scalar}`
    pub fn structured<R>(raw: R) -> Self
    where
        R: IntoIterator<IntoIter = J>,
    {
        Self::from_raw(DataKind::StructuredData, raw)
    }

    /// XML container: every scalar becomes `{"xml": scalar}`
    pub fn xml<R>(raw: R) -> Self
    where
        R: IntoIterator<IntoIter = J>,
    {
        Self::from_raw(DataKind::XmlData, raw)
    }
}

/// Lazy results of applying one operation to a record sequence
pub struct Apply<'op, I> {
    records: I,
    operation: &'op OperationDescriptor,
    finished: bool,
}

impl<'op, I> Apply<'op, I>
where
    I: Iterator<Item = Sample>,
{
    /// Apply `operation` lazily to `records`
    pub fn new(records: I, operation: &'op OperationDescriptor) -> Self {
        Self {
            records,
            operation,
            finished: false,
        }
    }

    fn aggregate(&mut self) -> Result<Sample> {
        let operation = self.operation;
        let values: Vec<Value> = self
            .records
            .by_ref()
            .map(|record| operation.select_input(&record))
            .collect();
        operation.call(Value::Array(values))
    }
}

impl<I> Iterator for Apply<'_, I>
where
    I: Iterator<Item = Sample>,
{
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if self.operation.family().aggregates() {
            self.finished = true;
            return Some(self.aggregate());
        }

        match self.records.next() {
            Some(record) => Some(self.operation.invoke(&record)),
            None => {
                self.finished = true;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            (0, Some(0))
        } else if self.operation.family().aggregates() {
            (1, Some(1))
        } else {
            self.records.size_hint()
        }
    }
}

impl<I> FusedIterator for Apply<'_, I> where I: Iterator<Item = Sample> {}

/// Lazy merged results of several operations per record
pub struct ApplyAll<'op, I> {
    records: I,
    operations: &'op [OperationDescriptor],
}

impl<I> Iterator for ApplyAll<'_, I>
where
    I: Iterator<Item = Sample>,
{
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        let merged = self
            .operations
            .iter()
            .try_fold(Sample::new(), |acc, operation| {
                operation.invoke(&record).map(|output| merge(acc, output))
            });
        Some(merged)
    }
}
