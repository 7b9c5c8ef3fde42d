//! Streaming Session Controller
//!
//! Orchestrates one request/response lifecycle: opens the stream, feeds
//! bytes to the decoder, applies admitted events to the conversation store,
//! and exposes cooperative cancellation.
//!
//! # Session lifecycle
//!
//! ```text
//! IDLE -> SENDING -> STREAMING -> { COMPLETED, ERRORED, ABORTED }
//! ```
//!
//! The three right-hand states are terminal. At most one session is active
//! at a time: a new [`send_message`](ChatController::send_message) aborts a
//! still-running session before starting. Every session resolves into an
//! observable message state plus exactly one [`SessionEvent`]; no error
//! escapes to the caller as a fault.
//!
//! Each session carries a unique tag. A session that has been cancelled or
//! superseded is "detached": frames still in flight on its abandoned reader
//! are ignored, never applied to the store.

use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::api::{ChatRequest, ChatTransport};
use crate::conversation::{ConversationStore, Role};
use crate::models::ModelChoice;
use crate::stream::{DecodedFrame, DedupFilter, StreamDecoder, StreamEvent};

/// Prefix for error substitution in the assistant message
pub const ERROR_PREFIX: &str = "error: ";

/// Notice appended to a response that was stopped before completion
///
/// Deliberately distinct from both the error prefix and a plain completion.
pub const STOPPED_NOTICE: &str = "[generation stopped]";

/// Lifecycle state of the current session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session has run yet, or the controller is between sessions
    Idle,
    /// Request issued, waiting for response headers
    Sending,
    /// Response stream open, events being applied
    Streaming,
    /// Terminal: the stream finished (explicitly or implicitly)
    Completed,
    /// Terminal: transport failure or protocol error frame
    Errored,
    /// Terminal: cancelled locally
    Aborted,
}

impl SessionPhase {
    /// Whether this phase ends a session
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored | Self::Aborted)
    }
}

/// The single lifecycle notification a session produces
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session reached a completed state
    Completed {
        /// Final content of the assistant message
        content: String,
        /// Whether the server reported the generation as cancelled
        cancelled: bool,
    },
    /// The session failed
    Errored {
        /// Error detail, as surfaced in the assistant message
        message: String,
    },
    /// The session was cancelled locally
    Aborted,
}

/// State owned by one in-flight session
struct ActiveSession {
    tag: Uuid,
    cancel: CancellationToken,
}

/// What applying a batch of frames concluded
enum FrameOutcome {
    /// No terminal frame yet
    Continue,
    /// This session was detached mid-application; stop silently
    Detached,
    /// Terminal `done` frame
    Done {
        /// Server-side cancellation flag
        cancelled: bool,
    },
    /// Terminal `error` frame (or a mid-stream transport failure)
    Error(String),
}

/// Orchestrates streaming chat sessions against a transport
///
/// Construct once, share behind an [`Arc`]. The controller holds only a
/// mutation capability into the store's last message; the store owns the
/// messages.
pub struct ChatController<T: ChatTransport> {
    transport: Arc<T>,
    store: Arc<ConversationStore>,
    events: mpsc::Sender<SessionEvent>,
    phase: watch::Sender<SessionPhase>,
    active: Mutex<Option<ActiveSession>>,
}

impl<T: ChatTransport + 'static> ChatController<T> {
    /// Create a controller
    ///
    /// `events` receives exactly one [`SessionEvent`] per session.
    pub fn new(
        transport: T,
        store: Arc<ConversationStore>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Idle);
        Self {
            transport: Arc::new(transport),
            store,
            events,
            phase,
            active: Mutex::new(None),
        }
    }

    /// The current session phase
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Subscribe to phase changes
    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Whether a session is currently active
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Send a user message and drive the response stream to a terminal state
    ///
    /// Appends the user message and the streaming assistant placeholder,
    /// applies admitted text events as they arrive, and resolves the session
    /// into `Completed`, `Errored`, or `Aborted`. Any still-active prior
    /// session is aborted first; sessions never overlap.
    ///
    /// Errors do not propagate: every failure becomes an assistant message
    /// plus a [`SessionEvent`]. The returned phase is the terminal state this
    /// session reached.
    pub async fn send_message(&self, input: &str, choice: &ModelChoice) -> SessionPhase {
        self.abort_active().await;

        let tag = Uuid::new_v4();
        let cancel = CancellationToken::new();
        *self.active.lock() = Some(ActiveSession {
            tag,
            cancel: cancel.clone(),
        });

        self.set_phase(SessionPhase::Sending);
        self.store.push(Role::User, input);

        let request = ChatRequest {
            message: input.to_string(),
            company: choice.company.clone(),
            model: choice.model.clone(),
        };

        let stream_result = self.transport.open_stream(&request).await;

        // The session may have been stopped or superseded while the request
        // was pending; the abort path already resolved it, so nothing here
        // may touch the store or the phase.
        if cancel.is_cancelled() || !self.is_current(tag) {
            tracing::debug!(session = %tag, "Session detached while request was pending");
            return SessionPhase::Aborted;
        }

        let mut stream = match stream_result {
            Ok(stream) => stream,
            Err(err) => {
                tracing::error!(error = %err, "Chat request failed before streaming");
                self.store
                    .push(Role::Assistant, format!("{ERROR_PREFIX}{err}"));
                return self.resolve_errored(tag, err.to_string(), false).await;
            }
        };

        self.store.push_placeholder();
        self.set_phase(SessionPhase::Streaming);
        tracing::debug!(session = %tag, model = %request.model, "Streaming started");

        let mut decoder = StreamDecoder::new();
        let mut dedup = DedupFilter::new();
        let mut accumulated = String::new();

        loop {
            let chunk = tokio::select! {
                () = cancel.cancelled() => {
                    // stop_stream (or a superseding send) already resolved
                    // this session; partially read bytes are discarded.
                    tracing::debug!(session = %tag, "Read loop cancelled");
                    return SessionPhase::Aborted;
                }
                chunk = stream.next() => chunk,
            };

            let outcome = match chunk {
                Some(Ok(bytes)) => {
                    let frames = decoder.feed(&bytes);
                    self.apply_frames(tag, frames, &mut dedup, &mut accumulated)
                }
                Some(Err(err)) => {
                    tracing::error!(session = %tag, error = %err, "Stream read failed");
                    FrameOutcome::Error(err.to_string())
                }
                None => {
                    let frames = decoder.finish();
                    match self.apply_frames(tag, frames, &mut dedup, &mut accumulated) {
                        FrameOutcome::Continue => {
                            // Ambiguous server contract: no done frame, but
                            // the body ended cleanly. Not an error; keep what
                            // arrived, and log this path distinctly.
                            tracing::warn!(
                                session = %tag,
                                chunks = dedup.seen_count(),
                                "Stream ended without a terminal frame; treating as completion"
                            );
                            FrameOutcome::Done { cancelled: false }
                        }
                        other => other,
                    }
                }
            };

            match outcome {
                FrameOutcome::Continue => {}
                FrameOutcome::Detached => return SessionPhase::Aborted,
                FrameOutcome::Done { cancelled } => {
                    return self.resolve_completed(tag, accumulated, cancelled).await;
                }
                FrameOutcome::Error(message) => {
                    return self.resolve_errored(tag, message, true).await;
                }
            }
        }
    }

    /// Cancel the in-flight session, if any
    ///
    /// Cancels the read loop at its next suspension point, notifies the
    /// server on a best-effort out-of-band request, marks the last message
    /// with the stopped notice, and emits [`SessionEvent::Aborted`]. No-op
    /// when no session is active.
    pub async fn stop_stream(&self) -> bool {
        self.abort_active().await
    }

    /// Abort the active session in place (shared by `stop_stream` and
    /// session supersession)
    async fn abort_active(&self) -> bool {
        let Some(session) = self.active.lock().take() else {
            return false;
        };
        session.cancel.cancel();
        tracing::info!(session = %session.tag, "Session aborted");

        // The placeholder holds everything streamed so far; stamp it.
        let partial = self
            .store
            .snapshot()
            .last()
            .filter(|m| m.role == Role::Assistant && m.streaming)
            .map(|m| m.content.clone());
        if let Some(partial) = partial {
            self.store
                .update_last(stopped_content(&partial), Some(false));
        }

        // Fire-and-forget server notification; the local abort already took
        // effect, so delivery failure is logged and swallowed.
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            if let Err(err) = transport.notify_cancel().await {
                tracing::warn!(error = %err, "Cancel notification failed");
            }
        });

        self.set_phase(SessionPhase::Aborted);
        self.emit(SessionEvent::Aborted).await;
        true
    }

    /// Apply decoded frames to this session, in wire order
    fn apply_frames(
        &self,
        tag: Uuid,
        frames: Vec<DecodedFrame>,
        dedup: &mut DedupFilter,
        accumulated: &mut String,
    ) -> FrameOutcome {
        for frame in frames {
            if !self.is_current(tag) {
                return FrameOutcome::Detached;
            }
            match frame.event {
                StreamEvent::Text(text) => {
                    if dedup.admit(&frame.key) {
                        accumulated.push_str(&text);
                        self.store.append_to_last(&text);
                        tracing::trace!(session = %tag, chunk = %text, "Chunk applied");
                    } else {
                        tracing::debug!(session = %tag, "Duplicate chunk suppressed");
                    }
                }
                StreamEvent::Done { cancelled } => {
                    return FrameOutcome::Done { cancelled };
                }
                StreamEvent::Error(message) => {
                    return FrameOutcome::Error(message);
                }
            }
        }
        FrameOutcome::Continue
    }

    /// Finalize a completed session (explicit, implicit, or server-cancelled)
    async fn resolve_completed(
        &self,
        tag: Uuid,
        accumulated: String,
        cancelled: bool,
    ) -> SessionPhase {
        if !self.detach_if_current(tag) {
            return SessionPhase::Aborted;
        }
        let content = if cancelled {
            stopped_content(&accumulated)
        } else {
            accumulated
        };
        self.store.update_last(content.clone(), Some(false));
        self.set_phase(SessionPhase::Completed);
        self.emit(SessionEvent::Completed { content, cancelled }).await;
        SessionPhase::Completed
    }

    /// Finalize an errored session
    ///
    /// `substitute` controls whether the placeholder content is replaced;
    /// a request that failed before streaming never created one.
    async fn resolve_errored(&self, tag: Uuid, message: String, substitute: bool) -> SessionPhase {
        if !self.detach_if_current(tag) {
            return SessionPhase::Aborted;
        }
        if substitute {
            self.store
                .update_last(format!("{ERROR_PREFIX}{message}"), Some(false));
        }
        self.set_phase(SessionPhase::Errored);
        self.emit(SessionEvent::Errored { message }).await;
        SessionPhase::Errored
    }

    /// Whether `tag` is still the active session
    fn is_current(&self, tag: Uuid) -> bool {
        self.active.lock().as_ref().is_some_and(|s| s.tag == tag)
    }

    /// Detach `tag` if it is still the active session
    ///
    /// The single point deciding which path owns the session's terminal
    /// transition; guarantees one lifecycle event per session.
    fn detach_if_current(&self, tag: Uuid) -> bool {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|s| s.tag == tag) {
            *active = None;
            true
        } else {
            false
        }
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.phase.send_replace(phase);
    }

    async fn emit(&self, event: SessionEvent) {
        if self.events.send(event).await.is_err() {
            tracing::warn!("Lifecycle event receiver dropped");
        }
    }
}

/// Content for a stopped response: the partial text plus the notice
fn stopped_content(partial: &str) -> String {
    if partial.is_empty() {
        STOPPED_NOTICE.to_string()
    } else {
        format!("{partial}\n\n{STOPPED_NOTICE}")
    }
}
