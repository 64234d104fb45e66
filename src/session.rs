//! Chat session
//!
//! Owns everything a conversation needs: the message store, the typing
//! playback, the busy flag and the last error. Asynchronous work (the
//! completion request and reveal ticks) reports back as [`SessionEvent`]s on a
//! channel, and the owner feeds them to [`ChatSession::handle`] one at a time.
//! No state is touched anywhere else.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::completion::{CompletionClient, CompletionError};
use crate::conversation::{ConversationStore, Message, Sender};
use crate::format::Segment;
use crate::playback::{Playback, RevealFrame, RevealId};

/// First assistant message of every session
pub const GREETING: &str =
    "Hello! I am your drug recommendation assistant. Please describe your symptoms.";

#[derive(Debug)]
pub enum SessionEvent {
    /// The completion request finished
    Reply(Result<String, CompletionError>),
    /// One more character of the reply is visible
    RevealTick(RevealFrame),
    /// The whole reply has been revealed
    RevealDone { id: RevealId, text: String },
}

/// The reply currently being typed out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealView {
    pub id: RevealId,
    /// Revealed prefix
    pub text: String,
    /// Revealed prefix, formatted
    pub segments: Vec<Segment>,
    /// Full reply
    pub target: String,
}

pub struct ChatSession {
    store: ConversationStore,
    playback: Playback,
    client: CompletionClient,
    events: mpsc::UnboundedSender<SessionEvent>,
    request: Option<JoinHandle<()>>,
    awaiting_reply: bool,
    reveal: Option<RevealView>,
    error: Option<String>,
}

impl ChatSession {
    /// Create a session seeded with the greeting. The receiver yields the events
    /// that must be passed back to [`ChatSession::handle`].
    pub fn new(
        client: CompletionClient,
        typing_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();

        let mut store = ConversationStore::new();
        store.append(Message::new(store.next_id(), GREETING, Sender::Assistant));

        let session = Self {
            store,
            playback: Playback::new(typing_interval),
            client,
            events,
            request: None,
            awaiting_reply: false,
            reveal: None,
            error: None,
        };

        (session, rx)
    }

    pub fn history(&self) -> &[Message] {
        self.store.history()
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    /// Awaiting a reply or revealing one
    pub fn is_busy(&self) -> bool {
        self.awaiting_reply || self.reveal.is_some()
    }

    pub fn reveal(&self) -> Option<&RevealView> {
        self.reveal.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Record `input` as a user message and request a reply
    ///
    /// Returns false without touching any state when the input is blank or a
    /// reply is still pending. A reveal in progress is cancelled and its reply
    /// discarded.
    pub fn submit(&mut self, input: &str) -> bool {
        if input.trim().is_empty() || self.awaiting_reply {
            return false;
        }

        self.cancel_reveal();
        self.error = None;

        let message = Message::new(self.store.next_id(), input, Sender::User);
        info!(id = message.id(), "user message submitted");
        self.store.append(message);

        let history = self.store.to_chat_turns();
        let client = self.client.clone();
        let events = self.events.clone();

        self.awaiting_reply = true;
        self.request = Some(tokio::spawn(async move {
            let result = client.complete(&history).await;
            let _ = events.send(SessionEvent::Reply(result));
        }));

        true
    }

    /// Apply one event
    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Reply(result) => {
                self.awaiting_reply = false;
                self.request = None;
                match result {
                    Ok(text) => self.start_reveal(text),
                    Err(err) => {
                        warn!(error = %err, "completion failed");
                        self.error = Some(err.to_string());
                    }
                }
            }
            SessionEvent::RevealTick(frame) => {
                // Ticks queued before a cancel carry a stale id
                if let Some(view) = self.reveal.as_mut().filter(|v| v.id == frame.id) {
                    view.text = frame.text;
                    view.segments = frame.segments;
                }
            }
            SessionEvent::RevealDone { id, text } => {
                if self.reveal.as_ref().is_some_and(|v| v.id == id) {
                    self.playback.finish(id);
                    self.reveal = None;
                    self.commit_reply(text);
                } else {
                    debug!(?id, "ignoring completion of a superseded reveal");
                }
            }
        }
    }

    /// Stop the animation and commit the full reply at once
    pub fn skip_reveal(&mut self) -> bool {
        let Some(view) = self.reveal.take() else {
            return false;
        };
        self.playback.cancel();
        self.commit_reply(view.target);
        true
    }

    /// Cancel the reveal and any pending request. Used on teardown.
    pub fn shutdown(&mut self) {
        self.cancel_reveal();
        if let Some(request) = self.request.take() {
            request.abort();
        }
        self.awaiting_reply = false;
    }

    fn start_reveal(&mut self, text: String) {
        let ticks = self.events.clone();
        let done = self.events.clone();

        let id = self.playback.reveal(
            text.clone(),
            move |frame| {
                let _ = ticks.send(SessionEvent::RevealTick(frame));
            },
            move |id, text| {
                let _ = done.send(SessionEvent::RevealDone { id, text });
            },
        );

        self.reveal = Some(RevealView {
            id,
            text: String::new(),
            segments: Vec::new(),
            target: text,
        });
    }

    fn cancel_reveal(&mut self) {
        self.playback.cancel();
        if let Some(view) = self.reveal.take() {
            debug!(id = ?view.id, "discarding partial reveal");
        }
    }

    fn commit_reply(&mut self, text: String) {
        let message = Message::new(self.store.next_id(), text, Sender::Assistant);
        info!(id = message.id(), "assistant reply committed");
        self.store.append(message);
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
