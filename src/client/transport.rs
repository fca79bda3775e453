//! How a consumer reaches the files a publisher wrote.

use crate::orchestration::PublishMetadata;
use crate::store::{HistoryBook, PublishedFile};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::{Client, StatusCode};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Request to {url} failed: {message}")]
    Http { url: String, message: String },
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("Publisher has no {0}")]
    Missing(&'static str),
    #[error("Malformed {file}: {message}")]
    Malformed { file: &'static str, message: String },
}

/// Read access to a publisher's output files.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Human-readable location, recorded with each cache entry.
    fn describe(&self) -> String;

    /// Contents of `file`, or `None` when the publisher has not written it.
    async fn fetch_file(&self, file: PublishedFile) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Everything fetched in one transport round.
#[derive(Debug, Clone)]
pub struct RemotePayload {
    /// Unparsed current snapshot; validated before it is trusted.
    pub current: serde_json::Value,
    pub metadata: Option<PublishMetadata>,
    pub historical: Option<HistoryBook>,
}

/// Fetch the three published files. Only the current snapshot is required.
pub async fn fetch_payload(transport: &dyn Transport) -> Result<RemotePayload, TransportError> {
    let current_bytes = transport
        .fetch_file(PublishedFile::Current)
        .await?
        .ok_or(TransportError::Missing(PublishedFile::Current.file_name()))?;
    let current = serde_json::from_slice(&current_bytes).map_err(|e| TransportError::Malformed {
        file: PublishedFile::Current.file_name(),
        message: e.to_string(),
    })?;

    let metadata = optional_json(transport, PublishedFile::Meta).await?;
    let historical = optional_json(transport, PublishedFile::Historical).await?;

    Ok(RemotePayload {
        current,
        metadata,
        historical,
    })
}

async fn optional_json<T: serde::de::DeserializeOwned>(
    transport: &dyn Transport,
    file: PublishedFile,
) -> Result<Option<T>, TransportError> {
    let Some(bytes) = transport.fetch_file(file).await? else {
        debug!("{} not published", file.file_name());
        return Ok(None);
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Ignoring unreadable {}: {}", file.file_name(), e);
            Ok(None)
        }
    }
}

/// Publisher output in a local or mounted directory.
#[derive(Debug, Clone)]
pub struct FileTransport {
    dir: PathBuf,
}

impl FileTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Transport for FileTransport {
    fn describe(&self) -> String {
        format!("file://{}", self.dir.display())
    }

    async fn fetch_file(&self, file: PublishedFile) -> Result<Option<Vec<u8>>, TransportError> {
        let path = self.dir.join(file.file_name());
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(TransportError::Io { path, source }),
        }
    }
}

/// A publisher served over HTTP at `{base_url}/data/<file>`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    max_elapsed: Duration,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_elapsed: timeout,
        }
    }

    fn url(&self, file: PublishedFile) -> String {
        format!("{}/data/{}", self.base_url, file.file_name())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    async fn fetch_file(&self, file: PublishedFile) -> Result<Option<Vec<u8>>, TransportError> {
        let url = self.url(file);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self.client.get(&url).send().await.map_err(|e| {
                backoff::Error::transient(TransportError::Http {
                    url: url.clone(),
                    message: e.to_string(),
                })
            })?;

            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(backoff::Error::transient(TransportError::HttpStatus {
                    url: url.clone(),
                    status: status.as_u16(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(TransportError::HttpStatus {
                    url: url.clone(),
                    status: status.as_u16(),
                }));
            }

            let bytes = response.bytes().await.map_err(|e| {
                backoff::Error::permanent(TransportError::Http {
                    url: url.clone(),
                    message: e.to_string(),
                })
            })?;
            Ok(Some(bytes.to_vec()))
        })
        .await
    }
}
