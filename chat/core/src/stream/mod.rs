//! Streaming infrastructure
//!
//! Turns the raw response byte stream into discrete protocol events and
//! suppresses duplicate deliveries within one session.

pub mod decoder;
pub mod dedup;

pub use decoder::{DecodedFrame, StreamDecoder, StreamEvent};
pub use dedup::DedupFilter;
