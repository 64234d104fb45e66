//! In-memory conversation history
//!
//! Messages are appended in the order they happen and never edited or removed.
//! The store does not check that senders alternate.

use serde::{Deserialize, Serialize};

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    /// Label shown above the message
    pub fn display_name(&self) -> &'static str {
        match self {
            Sender::User => "You",
            Sender::Assistant => "Assistant",
        }
    }
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: usize,
    text: String,
    sender: Sender,
}

impl Message {
    pub fn new(id: usize, text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id,
            text: text.into(),
            sender,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }
}

/// Role of a history entry sent to the completion endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One `{role, content}` entry of the request history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        let role = match message.sender {
            Sender::User => Role::User,
            Sender::Assistant => Role::Assistant,
        };
        ChatTurn::new(role, message.text.clone())
    }
}

/// Ordered, append-only list of messages
#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    /// Id for the next message: current length + 1
    pub fn next_id(&self) -> usize {
        self.messages.len() + 1
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// History in the shape the completion endpoint expects
    pub fn to_chat_turns(&self) -> Vec<ChatTurn> {
        self.messages.iter().map(ChatTurn::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_length() {
        let mut store = ConversationStore::new();
        assert_eq!(store.next_id(), 1);

        store.append(Message::new(store.next_id(), "hello", Sender::Assistant));
        store.append(Message::new(store.next_id(), "I have a headache", Sender::User));

        let ids: Vec<usize> = store.history().iter().map(Message::id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.next_id(), 3);
    }

    #[test]
    fn test_alternation_not_enforced() {
        let mut store = ConversationStore::new();
        store.append(Message::new(store.next_id(), "first", Sender::User));
        store.append(Message::new(store.next_id(), "second", Sender::User));

        assert_eq!(store.len(), 2);
        assert!(store.history().iter().all(|m| m.sender() == Sender::User));
    }

    #[test]
    fn test_chat_turn_roles() {
        let mut store = ConversationStore::new();
        store.append(Message::new(1, "Hi, describe your symptoms.", Sender::Assistant));
        store.append(Message::new(2, "Sore throat", Sender::User));

        let turns = store.to_chat_turns();
        assert_eq!(
            turns,
            vec![
                ChatTurn::new(Role::Assistant, "Hi, describe your symptoms."),
                ChatTurn::new(Role::User, "Sore throat"),
            ]
        );

        let json = serde_json::to_value(&turns[1]).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "Sore throat"}));
    }
}
