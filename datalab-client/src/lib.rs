//! Upload client for DataLab datasets
//!
//! Publishes dataset metadata, optionally with samples, to a remote catalogue as
//! a single JSON POST.

#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod metadata;

pub use client::{
    samples_from_dataset, Client, HttpTransport, SampleRecord, Transport, TransportResponse,
    UploadDocument,
};
pub use config::{ClientConfig, DEFAULT_ENDPOINT};
pub use error::{ClientError, Result};
pub use metadata::DatasetMetadata;
