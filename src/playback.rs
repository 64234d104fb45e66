//! Typing playback
//!
//! Reveals a reply one character per tick. Every tick re-formats the whole
//! revealed prefix, so a marker that is only half typed shows up as literal
//! characters until its closing half arrives.
//!
//! # Concurrency
//!
//! - Each reveal runs as its own tokio task driven by `tokio::time::interval`.
//! - [`Playback`] keeps at most one reveal alive; starting another cancels the
//!   previous one first.
//! - Callbacks run while the task holds its cancellation lock, so once
//!   [`RevealHandle::cancel`] returns no callback of that reveal runs again.
//!   A callback must therefore never cancel its own reveal.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::format::{format, Segment};

/// Default delay between two revealed characters
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(30);

/// Identifies one reveal. Ids grow monotonically per [`Playback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RevealId(u64);

/// Progress of a single reveal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackState {
    target_text: String,
    revealed_prefix_length: usize,
    /// Byte offset matching `revealed_prefix_length`
    revealed_bytes: usize,
    is_active: bool,
}

impl PlaybackState {
    pub fn new(target_text: impl Into<String>) -> Self {
        Self {
            target_text: target_text.into(),
            revealed_prefix_length: 0,
            revealed_bytes: 0,
            is_active: true,
        }
    }

    /// Number of characters revealed so far
    pub fn revealed_prefix_length(&self) -> usize {
        self.revealed_prefix_length
    }

    pub fn target_text(&self) -> &str {
        &self.target_text
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn revealed(&self) -> &str {
        &self.target_text[..self.revealed_bytes]
    }

    pub fn is_complete(&self) -> bool {
        self.revealed_bytes == self.target_text.len()
    }

    /// Reveal one more character. Returns false when nothing was left to reveal.
    pub fn advance(&mut self) -> bool {
        if !self.is_active {
            return false;
        }
        match self.target_text[self.revealed_bytes..].chars().next() {
            Some(c) => {
                self.revealed_bytes += c.len_utf8();
                self.revealed_prefix_length += 1;
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.revealed_prefix_length = 0;
        self.revealed_bytes = 0;
        self.is_active = false;
    }
}

/// What a tick hands to its observer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevealFrame {
    pub id: RevealId,
    /// Characters revealed, including this tick's
    pub revealed: usize,
    pub text: String,
    pub segments: Vec<Segment>,
}

/// Cancellation handle for a running reveal
#[derive(Debug)]
pub struct RevealHandle {
    id: RevealId,
    cancelled: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

impl RevealHandle {
    pub fn id(&self) -> RevealId {
        self.id
    }

    /// Stop the timer. No callback of this reveal runs after this returns.
    pub fn cancel(&self) {
        let mut cancelled = self.cancelled.lock().unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start revealing `text`, one character every `interval`
///
/// The first character appears on the first tick, which fires immediately.
/// `on_complete` runs exactly once with the reveal id and the full text, in the
/// same tick as the last `on_tick`, unless the reveal is cancelled first.
/// Must be called inside a tokio runtime.
pub fn reveal<T, C>(
    id: RevealId,
    text: String,
    interval: Duration,
    mut on_tick: T,
    on_complete: C,
) -> RevealHandle
where
    T: FnMut(RevealFrame) + Send + 'static,
    C: FnOnce(RevealId, String) + Send + 'static,
{
    let cancelled = Arc::new(Mutex::new(false));
    let stop_flag = Arc::clone(&cancelled);

    let task = tokio::spawn(async move {
        let mut state = PlaybackState::new(text);
        let mut on_complete = Some(on_complete);
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let stopped = stop_flag.lock().unwrap_or_else(PoisonError::into_inner);
            if *stopped {
                return;
            }

            if state.advance() {
                let revealed = state.revealed();
                on_tick(RevealFrame {
                    id,
                    revealed: state.revealed_prefix_length(),
                    text: revealed.to_string(),
                    segments: format(revealed),
                });
            }

            if state.is_complete() {
                let full_text = state.target_text().to_string();
                state.reset();
                if let Some(done) = on_complete.take() {
                    done(id, full_text);
                }
                return;
            }
        }
    });

    RevealHandle {
        id,
        cancelled,
        task,
    }
}

/// Keeps at most one reveal running
#[derive(Debug)]
pub struct Playback {
    interval: Duration,
    active: Option<RevealHandle>,
    last_id: u64,
}

impl Playback {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: None,
            last_id: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start a reveal, cancelling whichever one was running
    pub fn reveal<T, C>(&mut self, text: impl Into<String>, on_tick: T, on_complete: C) -> RevealId
    where
        T: FnMut(RevealFrame) + Send + 'static,
        C: FnOnce(RevealId, String) + Send + 'static,
    {
        self.cancel();

        self.last_id += 1;
        let id = RevealId(self.last_id);
        let text = text.into();
        debug!(?id, chars = text.chars().count(), "starting reveal");

        self.active = Some(reveal(id, text, self.interval, on_tick, on_complete));
        id
    }

    /// Cancel the running reveal, if any, and return its id
    pub fn cancel(&mut self) -> Option<RevealId> {
        let handle = self.active.take()?;
        handle.cancel();
        debug!(id = ?handle.id(), "reveal cancelled");
        Some(handle.id())
    }

    /// Id of the reveal whose timer is still running
    pub fn active_id(&self) -> Option<RevealId> {
        self.active
            .as_ref()
            .filter(|handle| !handle.is_finished())
            .map(RevealHandle::id)
    }

    pub fn is_active(&self) -> bool {
        self.active_id().is_some()
    }

    /// Forget a reveal whose completion has been handled
    pub fn finish(&mut self, id: RevealId) -> bool {
        if self.active.as_ref().map(RevealHandle::id) == Some(id) {
            self.active = None;
            true
        } else {
            false
        }
    }
}

impl Default for Playback {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.cancel();
    }
}
