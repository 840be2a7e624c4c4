//! Chat history storage
//!
//! Append-only list of [`ChatMessage`]s for one session. The only in-place
//! mutations are growing the single currently-streaming message and
//! rewriting the type of the last (pending) message when a gate resolves.

use crate::models::{ChatMessage, MessageType, Sender};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
    /// Index of the message currently receiving stream deltas
    #[serde(skip)]
    streaming: Option<usize>,
    updated_at: Option<DateTime<Utc>>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted records, keeping their order
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self {
            updated_at: messages.last().map(|m| m.created_at),
            messages,
            streaming: None,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.updated_at = Some(Utc::now());
    }

    // =============================
    // Iterators
    // =============================

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Up to `count` most recent messages, oldest first
    pub fn recent(&self, count: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(count);
        &self.messages[start..]
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Drop a trailing loading placeholder once its result arrives
    pub fn resolve_loading(&mut self) -> Option<ChatMessage> {
        if self.messages.last()?.message_type != MessageType::Loading {
            return None;
        }
        self.messages.pop()
    }

    /// Rewrite the last message's type; returns the rewritten message
    pub fn rewrite_last_type(&mut self, message_type: MessageType) -> Option<&ChatMessage> {
        let last = self.messages.last_mut()?;
        last.message_type = message_type;
        self.updated_at = Some(Utc::now());
        Some(last)
    }

    // =============================
    // Streaming slot
    // =============================

    /// Open the streaming message; an already open one is replaced
    pub fn begin_stream(&mut self, sender: Sender) -> Uuid {
        self.discard_stream();
        let message = ChatMessage::new(sender, MessageType::Text, String::new());
        let id = message.id;
        self.messages.push(message);
        self.streaming = Some(self.messages.len() - 1);
        id
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.is_some()
    }

    pub fn append_stream(&mut self, delta: &str) -> bool {
        match self.streaming.and_then(|idx| self.messages.get_mut(idx)) {
            Some(message) => {
                message.text.push_str(delta);
                true
            }
            None => false,
        }
    }

    /// Close the streaming message, keeping it in history
    pub fn finish_stream(&mut self) -> Option<&ChatMessage> {
        let idx = self.streaming.take()?;
        self.updated_at = Some(Utc::now());
        self.messages.get(idx)
    }

    /// Drop the partial streaming message
    pub fn discard_stream(&mut self) {
        if let Some(idx) = self.streaming.take() {
            if idx < self.messages.len() {
                self.messages.remove(idx);
            }
        }
    }
}
