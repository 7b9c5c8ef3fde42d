//! Chat backend transport
//!
//! The remote generation service is an opaque collaborator reached through a
//! small wire protocol: one streaming chat request, a fire-and-forget cancel
//! notification, and a model catalog query. [`ChatTransport`] is the seam;
//! [`HttpChatApi`] is the production implementation over HTTP.

pub mod http;
pub mod traits;

pub use http::HttpChatApi;
pub use traits::{ByteStream, ChatRequest, ChatTransport, TransportError};
