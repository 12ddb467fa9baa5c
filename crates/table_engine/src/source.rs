use std::time::Duration;

use futures_util::StreamExt;
use table_core::{FailureKind, FetchError, ListRequest, ListResponse};
use table_logging::table_trace;

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_bytes: 8 * 1024 * 1024,
        }
    }
}

/// The "list items" endpoint backing a table.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn list(&self, request: &ListRequest) -> Result<ListResponse, FetchError>;
}

/// Posts `ListRequest` as JSON and decodes a `ListResponse`.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    endpoint: reqwest::Url,
    client: reqwest::Client,
    settings: SourceSettings,
}

impl HttpPageSource {
    pub fn new(endpoint: &str, settings: SourceSettings) -> Result<Self, FetchError> {
        let endpoint = reqwest::Url::parse(endpoint)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            endpoint,
            client,
            settings,
        })
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }
}

#[async_trait::async_trait]
impl PageSource for HttpPageSource {
    async fn list(&self, request: &ListRequest) -> Result<ListResponse, FetchError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(next_len));
            }
            bytes.extend_from_slice(&chunk);
        }
        table_trace!("{} answered with {} bytes", self.endpoint, bytes.len());

        serde_json::from_slice(&bytes)
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_builder() {
        return FetchError::new(FailureKind::InvalidUrl, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
