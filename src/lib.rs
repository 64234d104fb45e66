//! Drug recommendation chat assistant
//!
//! The library holds everything except the terminal front end: reply
//! formatting, typing playback, the conversation store, the completion client
//! and the [`session::ChatSession`] that ties them together.

pub mod completion;
pub mod config;
pub mod conversation;
pub mod format;
pub mod playback;
pub mod session;

pub use completion::{CompletionClient, CompletionError, CompletionSettings};
pub use config::Config;
pub use conversation::{ConversationStore, Message, Sender};
pub use format::{format, Segment};
pub use playback::{Playback, RevealFrame, RevealId};
pub use session::{ChatSession, SessionEvent, GREETING};
