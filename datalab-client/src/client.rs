//! Upload of dataset metadata and samples

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use datalab_core::Sample;
use datalab_datasets::WrapDatasetDict;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::metadata::DatasetMetadata;

/// One sample tagged with its split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Split the sample belongs to
    pub split_name: String,

    /// Field values
    pub features: Sample,
}

/// Request body of an upload
#[derive(Clone, Serialize, Deserialize)]
pub struct UploadDocument {
    /// Catalogue entry
    pub metadata: DatasetMetadata,

    /// Samples of every split
    pub samples: Vec<SampleRecord>,

    /// Account name
    pub user_name: String,

    /// Account password
    pub password: String,

    /// Account role
    pub role: String,

    /// Dataset visibility
    pub status: String,
}

impl fmt::Debug for UploadDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadDocument")
            .field("metadata", &self.metadata)
            .field("samples", &self.samples.len())
            .field("user_name", &self.user_name)
            .field("role", &self.role)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Status and body of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,

    /// Response body
    pub body: String,
}

/// Sends a JSON document to a URL
pub trait Transport {
    /// POST `body` to `url`
    fn post_json(&self, url: &str, body: &Value) -> Result<TransportResponse>;
}

/// Blocking HTTP transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Transport with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, body: &Value) -> Result<TransportResponse> {
        let response = self.client.post(url).json(body).send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(TransportResponse { status, body })
    }
}

/// Every split's rows as upload samples, at most `max_per_split` per split
pub fn samples_from_dataset(
    dataset: &WrapDatasetDict,
    max_per_split: usize,
) -> Result<Vec<SampleRecord>> {
    let mut samples = Vec::new();
    for split in dataset.splits() {
        for row in split.iter().take(max_per_split) {
            samples.push(SampleRecord {
                split_name: split.name().to_string(),
                features: row?,
            });
        }
    }
    Ok(samples)
}

/// Upload client for one account
pub struct Client<T = HttpTransport> {
    config: ClientConfig,
    user_name: String,
    password: String,
    transport: T,
}

impl Client<HttpTransport> {
    /// Client sending over HTTP
    pub fn new(
        user_name: impl Into<String>,
        password: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::with_transport(user_name, password, config, transport))
    }
}

impl<T: Transport> Client<T> {
    /// Client sending through `transport`
    pub fn with_transport(
        user_name: impl Into<String>,
        password: impl Into<String>,
        config: ClientConfig,
        transport: T,
    ) -> Self {
        Self {
            config,
            user_name: user_name.into(),
            password: password.into(),
            transport,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Validate `metadata` and assemble the request body
    pub fn document(
        &self,
        metadata: DatasetMetadata,
        samples: Vec<SampleRecord>,
    ) -> Result<UploadDocument> {
        metadata.validate()?;
        Ok(UploadDocument {
            metadata,
            samples,
            user_name: self.user_name.clone(),
            password: self.password.clone(),
            role: self.config.role.clone(),
            status: self.config.status.clone(),
        })
    }

    /// Send `document`; any status but 200 is an error and is not retried.
    ///
    /// Returns the parsed response body, or the raw text when it is not JSON.
    #[instrument(
        level = "info",
        skip_all,
        fields(dataset = %document.metadata.dataset_name, samples = document.samples.len())
    )]
    pub fn upload(&self, document: &UploadDocument) -> Result<Value> {
        let body = serde_json::to_value(document)?;
        let response = self.transport.post_json(&self.config.endpoint, &body)?;

        if response.status != 200 {
            warn!(status = response.status, "upload rejected");
            return Err(ClientError::Upstream {
                status: response.status,
                message: response.body,
            });
        }

        info!("upload accepted");
        Ok(serde_json::from_str(&response.body).unwrap_or(Value::String(response.body)))
    }

    /// Register a dataset by its metadata alone
    pub fn add_dataset_metadata(&self, metadata: DatasetMetadata) -> Result<Value> {
        let placeholder = SampleRecord {
            split_name: "train".to_string(),
            features: Sample::new(),
        };
        let document = self.document(metadata, vec![placeholder])?;
        self.upload(&document)
    }

    /// Upload a loaded dataset with split sizes taken from it
    pub fn add_dataset(
        &self,
        metadata: DatasetMetadata,
        dataset: &WrapDatasetDict,
    ) -> Result<Value> {
        let samples = samples_from_dataset(dataset, self.config.max_samples_per_split)?;
        let document = self.document(metadata.with_split_sizes(dataset), samples)?;
        self.upload(&document)
    }
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("user_name", &self.user_name)
            .finish_non_exhaustive()
    }
}
