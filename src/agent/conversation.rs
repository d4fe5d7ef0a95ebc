//! Append-only conversation history.

use serde::{Deserialize, Serialize};

use crate::session::SessionId;
use crate::types::Message;

/// A session's stored message history.
///
/// Messages can only be appended; insertion order is conversation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    id: SessionId,
    messages: Vec<Message>,
}

impl Conversation {
    /// An empty conversation for the session.
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Get the last N messages.
    pub fn last_n(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
