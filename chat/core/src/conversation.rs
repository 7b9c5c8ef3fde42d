//! Conversation Store
//!
//! Owns the ordered list of messages in the current conversation and the
//! mutation primitives used to build an assistant response incrementally.
//!
//! # Design Philosophy
//!
//! There is exactly one authoritative copy of the conversation. Renderers
//! never hold their own mirror; they subscribe to a revision counter and pull
//! a consistent snapshot when it changes. This removes the class of bugs where
//! a mutable shadow copy and the rendered state drift apart and need manual
//! reconciliation.
//!
//! The message list is append-only, with one exception: while an assistant
//! response is streaming, the *last* message may be mutated in place. At most
//! one message is ever in the streaming state.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// User input
    User,
    /// AI assistant response
    Assistant,
}

/// A message in the conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent this message
    pub role: Role,
    /// Message content
    pub content: String,
    /// Whether the message is still being streamed
    pub streaming: bool,
}

impl Message {
    /// Create a finalized user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            streaming: false,
        }
    }

    /// Create a finalized assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            streaming: false,
        }
    }

    /// Create the empty assistant placeholder that a stream fills in
    pub fn placeholder() -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            streaming: true,
        }
    }
}

/// The conversation message sequence with change notification
///
/// All mutations go through `&self` methods; interior locking serializes
/// writers so a reader never observes a half-applied update. Every mutation
/// bumps a revision counter published through a [`watch`] channel, which is
/// the only signal a rendering layer needs.
pub struct ConversationStore {
    messages: RwLock<Vec<Message>>,
    revision: watch::Sender<u64>,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            messages: RwLock::new(Vec::new()),
            revision,
        }
    }

    /// Subscribe to change notifications
    ///
    /// The receiver yields a monotonically increasing revision number. The
    /// value itself carries no meaning beyond "something changed"; call
    /// [`snapshot`](Self::snapshot) to read the new state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Get a consistent copy of all messages
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.read().clone()
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    /// Whether the conversation is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    /// Append a finalized message
    pub fn push(&self, role: Role, content: impl Into<String>) {
        {
            let mut messages = self.messages.write();
            messages.push(Message {
                role,
                content: content.into(),
                streaming: false,
            });
        }
        self.bump();
    }

    /// Append the empty streaming assistant placeholder
    ///
    /// Callers must finalize any prior streaming message first; two messages
    /// streaming at once is a logic error in the session controller, not a
    /// condition to recover from at runtime.
    pub fn push_placeholder(&self) {
        {
            let mut messages = self.messages.write();
            debug_assert!(
                !messages.iter().any(|m| m.streaming),
                "placeholder pushed while another message is streaming"
            );
            messages.push(Message::placeholder());
        }
        self.bump();
    }

    /// Concatenate `text` onto the last message
    ///
    /// No-op unless the last message is an assistant message; this guards
    /// against a stream applying text after the placeholder was removed.
    /// Returns whether the append was applied.
    pub fn append_to_last(&self, text: &str) -> bool {
        let applied = {
            let mut messages = self.messages.write();
            match messages.last_mut() {
                Some(last) if last.role == Role::Assistant => {
                    last.content.push_str(text);
                    true
                }
                _ => false,
            }
        };
        if applied {
            self.bump();
        }
        applied
    }

    /// Replace the last assistant message's content wholesale
    ///
    /// Used for finalization and error substitution. Optionally updates the
    /// streaming flag. No-op unless the last message is an assistant message;
    /// returns whether the update was applied.
    pub fn update_last(&self, content: impl Into<String>, streaming: Option<bool>) -> bool {
        let applied = {
            let mut messages = self.messages.write();
            match messages.last_mut() {
                Some(last) if last.role == Role::Assistant => {
                    last.content = content.into();
                    if let Some(streaming) = streaming {
                        last.streaming = streaming;
                    }
                    true
                }
                _ => false,
            }
        };
        if applied {
            self.bump();
        }
        applied
    }

    /// Remove all messages
    pub fn clear(&self) {
        self.messages.write().clear();
        self.bump();
    }

    fn bump(&self) {
        self.revision.send_modify(|r| *r += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_push_preserves_order() {
        let store = ConversationStore::new();
        store.push(Role::User, "first");
        store.push(Role::Assistant, "second");
        store.push(Role::User, "third");

        let contents: Vec<_> = store
            .snapshot()
            .iter()
            .map(|m| m.content.clone())
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_placeholder_then_append() {
        let store = ConversationStore::new();
        store.push(Role::User, "Hello");
        store.push_placeholder();

        assert!(store.append_to_last("Hi"));
        assert!(store.append_to_last(" there"));

        let snapshot = store.snapshot();
        let last = snapshot.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Hi there");
        assert!(last.streaming);
    }

    #[test]
    fn test_append_ignored_when_last_is_user() {
        let store = ConversationStore::new();
        store.push(Role::User, "Hello");

        assert!(!store.append_to_last("should vanish"));
        assert_eq!(store.snapshot().last().unwrap().content, "Hello");
    }

    #[test]
    fn test_append_ignored_when_empty() {
        let store = ConversationStore::new();
        assert!(!store.append_to_last("nothing to append to"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_update_last_finalizes() {
        let store = ConversationStore::new();
        store.push_placeholder();
        store.append_to_last("partial");

        assert!(store.update_last("final text", Some(false)));

        let snapshot = store.snapshot();
        let last = snapshot.last().unwrap();
        assert_eq!(last.content, "final text");
        assert!(!last.streaming);
    }

    #[test]
    fn test_update_last_ignored_when_last_is_user() {
        let store = ConversationStore::new();
        store.push(Role::User, "Hello");
        assert!(!store.update_last("nope", Some(false)));
        assert_eq!(store.snapshot().last().unwrap().content, "Hello");
    }

    #[test]
    fn test_clear() {
        let store = ConversationStore::new();
        store.push(Role::User, "a");
        store.push(Role::Assistant, "b");
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_revision_bumps_on_mutation() {
        let store = ConversationStore::new();
        let rx = store.subscribe();
        let start = *rx.borrow();

        store.push(Role::User, "a");
        store.push_placeholder();
        store.append_to_last("b");
        store.update_last("c", None);
        store.clear();

        assert_eq!(*rx.borrow(), start + 5);
    }

    #[test]
    fn test_revision_not_bumped_on_noop() {
        let store = ConversationStore::new();
        store.push(Role::User, "a");
        let rx = store.subscribe();
        let start = *rx.borrow();

        store.append_to_last("ignored");
        store.update_last("ignored", None);

        assert_eq!(*rx.borrow(), start);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let store = ConversationStore::new();
        store.push(Role::User, "a");
        let snapshot = store.snapshot();

        store.push(Role::Assistant, "b");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(store.len(), 2);
    }
}
