//! HTTP transport implementation
//!
//! Talks to the chat backend over its REST + chunked-stream API:
//!
//! - `POST /api/chat/stream` — body `{message, company, model}`, chunked
//!   text response carrying the frame stream
//! - `POST /api/cancel-stream` — empty body, fire-and-forget
//! - `GET /api/models` — model catalog
//!
//! Only a connect timeout is set; the stream request deliberately has no
//! total timeout because generations can run for minutes.

use futures::TryStreamExt;

use super::traits::{ByteStream, ChatRequest, ChatTransport, TransportError};
use crate::config::ClientConfig;
use crate::models::ModelCatalog;

/// HTTP client for the chat backend
#[derive(Clone)]
pub struct HttpChatApi {
    base_url: String,
    http: reqwest::Client,
}

impl HttpChatApi {
    /// Create a client from configuration
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// The configured base URL
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn stream_url(&self) -> String {
        format!("{}/api/chat/stream", self.base_url)
    }

    fn cancel_url(&self) -> String {
        format!("{}/api/cancel-stream", self.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/api/models", self.base_url)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait::async_trait]
impl ChatTransport for HttpChatApi {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError> {
        let response = self
            .http
            .post(self.stream_url())
            .json(request)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        tracing::debug!(url = %self.stream_url(), "Chat stream opened");
        Ok(Box::pin(
            response.bytes_stream().map_err(TransportError::from),
        ))
    }

    async fn notify_cancel(&self) -> Result<(), TransportError> {
        let response = self.http.post(self.cancel_url()).send().await?;
        Self::check_status(response).await?;
        tracing::debug!("Cancel notification delivered");
        Ok(())
    }

    async fn fetch_models(&self) -> Result<ModelCatalog, TransportError> {
        let response = self.http.get(self.models_url()).send().await?;
        let response = Self::check_status(response).await?;
        Ok(response.json::<ModelCatalog>().await?)
    }
}
