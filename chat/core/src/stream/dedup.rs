//! Dedup Filter
//!
//! Suppresses repeated frame deliveries within one streaming session, keyed
//! by the verbatim payload text. The server has no per-event sequence
//! numbering, so this is the client's approximation of idempotent delivery:
//! two byte-identical payloads are collapsed into one application even when
//! both were legitimately distinct chunks with the same text. That behavior
//! is load-bearing for the current server and preserved as-is; a server-side
//! sequence number would make it sound.
//!
//! The filter lives and dies with its session.

use std::collections::HashSet;

/// Per-session duplicate payload filter
#[derive(Debug, Default)]
pub struct DedupFilter {
    seen: HashSet<String>,
}

impl DedupFilter {
    /// Create an empty filter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a payload if its key has not been seen in this session
    ///
    /// Records the key on admission. Returns `false` for a repeat.
    pub fn admit(&mut self, key: &str) -> bool {
        self.seen.insert(key.to_string())
    }

    /// Number of distinct payloads seen so far
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_delivery_admitted() {
        let mut filter = DedupFilter::new();
        assert!(filter.admit("{\"text\":\"a\"}"));
        assert_eq!(filter.seen_count(), 1);
    }

    #[test]
    fn test_identical_payload_suppressed() {
        let mut filter = DedupFilter::new();
        assert!(filter.admit("{\"text\":\"a\"}"));
        assert!(!filter.admit("{\"text\":\"a\"}"));
        assert_eq!(filter.seen_count(), 1);
    }

    #[test]
    fn test_distinct_payloads_admitted() {
        let mut filter = DedupFilter::new();
        assert!(filter.admit("{\"text\":\"a\"}"));
        assert!(filter.admit("{\"text\":\"b\"}"));
        // Same text, different payload bytes: admitted.
        assert!(filter.admit("{\"text\":\"a\" }"));
        assert_eq!(filter.seen_count(), 3);
    }
}
