//! Transport trait and wire types
//!
//! Defines the interface the session controller talks to. Implementations
//! handle the actual network plumbing; tests substitute scripted byte
//! streams without any sockets.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use thiserror::Error;

use crate::models::ModelCatalog;

/// The chunked response body as an ordered stream of byte chunks
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Body of the streaming chat request
#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    /// The user's message text
    pub message: String,
    /// Provider company for the selected model
    pub company: String,
    /// Model identifier within the company
    pub model: String,
}

/// Errors from the transport layer
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request itself failed (connection, DNS, timeout)
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server rejected the request with a non-success status
    #[error("server returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, best effort
        body: String,
    },

    /// The byte stream broke mid-response
    #[error("stream interrupted: {0}")]
    Interrupted(String),
}

/// Transport to the chat backend
///
/// One implementation per wire. All methods are request-scoped; the
/// transport itself holds no session state.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Open a streaming chat response for `request`
    ///
    /// Resolves once response headers are in; a non-success status is an
    /// error here, before any bytes stream.
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream, TransportError>;

    /// Ask the server to stop the current generation
    ///
    /// Best effort: callers treat delivery failure as non-fatal because the
    /// local abort has already taken effect.
    async fn notify_cancel(&self) -> Result<(), TransportError>;

    /// Fetch the model catalog
    async fn fetch_models(&self) -> Result<ModelCatalog, TransportError>;
}
