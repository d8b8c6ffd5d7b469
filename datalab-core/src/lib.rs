//! Core operation pipeline for DataLab
//!
//! This crate provides the operation contract every other DataLab crate builds on:
//! typed operation descriptors, the registrar that turns plain functions into
//! descriptors, an explicit registry, and lazy data containers that stream
//! samples through operations.

#![warn(missing_docs)]

pub mod data;
pub mod error;
pub mod operation;
pub mod registry;
pub mod sample;

// Re-export key types for convenience
pub use data::{Apply, ApplyAll, Data};
pub use error::{Error, Result};
pub use operation::{
    text_input, FamilyDefaults, OperationDescriptor, OperationFamily, OperationFn, OperationInfo,
    Registrar, ANY_TASK,
};
pub use registry::OperationRegistry;
pub use sample::{merge, wrap_value, DataKind, Resources, Sample};
