//! Chat Core - Headless Streaming Chat Client for Nova
//!
//! This crate is the client-side core of the Nova chat application,
//! completely independent of any UI framework. It can drive a terminal
//! REPL, a web view, a native GUI, or run headless for testing.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Rendering layer (any)                    │
//! │        subscribes to store revisions + session events        │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//! ┌──────────────────────────────┼───────────────────────────────┐
//! │                        CHAT CORE                             │
//! │  ┌──────────────┐   ┌────────┴───────┐   ┌────────────────┐  │
//! │  │ Conversation │◄──┤ ChatController ├──►│ ChatTransport  │  │
//! │  │    Store     │   │ (one session   │   │ (HTTP backend) │  │
//! │  └──────────────┘   │  at a time)    │   └────────────────┘  │
//! │                     └───────┬────────┘                       │
//! │              ┌──────────────┴──────────────┐                 │
//! │              │ StreamDecoder + DedupFilter │                 │
//! │              └─────────────────────────────┘                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`ChatController`]: drives one streaming session at a time
//! - [`ConversationStore`]: the single authoritative message list
//! - [`StreamDecoder`]: chunked bytes to framed protocol events
//! - [`DedupFilter`]: per-session duplicate payload suppression
//! - [`ChatTransport`]: the seam to the remote generation service
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use chat_core::{
//!     ChatController, ClientConfig, ConversationStore, HttpChatApi, ModelChoice,
//! };
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ClientConfig::load().unwrap();
//!     let api = HttpChatApi::new(&config).unwrap();
//!     let store = Arc::new(ConversationStore::new());
//!     let (events_tx, mut events_rx) = mpsc::channel(16);
//!
//!     let controller = ChatController::new(api, Arc::clone(&store), events_tx);
//!     controller
//!         .send_message("Hello", &ModelChoice::default())
//!         .await;
//!
//!     // The store now holds the user message and the full response;
//!     // events_rx received exactly one lifecycle event.
//! }
//! ```
//!
//! # No UI Dependencies
//!
//! This crate has **zero** dependencies on any rendering framework. It is
//! pure client logic that any surface can sit on top of.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod models;
pub mod stream;

// Re-exports for convenience
pub use api::{ByteStream, ChatRequest, ChatTransport, HttpChatApi, TransportError};
pub use config::{ClientConfig, ConfigError};
pub use controller::{
    ChatController, SessionEvent, SessionPhase, ERROR_PREFIX, STOPPED_NOTICE,
};
pub use conversation::{ConversationStore, Message, Role};
pub use models::{ModelCatalog, ModelChoice, ModelEntry, ModelSelection};
pub use stream::{DecodedFrame, DedupFilter, StreamDecoder, StreamEvent};
