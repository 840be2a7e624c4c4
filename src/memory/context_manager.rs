//! Context Window Management
//!
//! Turns the tail of a chat history into completion-engine turns and
//! attaches the wallet context to the outgoing user message.

use crate::completion::Turn;
use crate::config::DEFAULT_HISTORY_WINDOW;
use crate::models::{ChatMessage, MessageType, Sender};

/// Configuration for the recent-history window
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Number of recent messages handed to the engine
    pub preserve_recent_count: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            preserve_recent_count: DEFAULT_HISTORY_WINDOW,
        }
    }
}

pub struct ContextManager {
    config: ContextConfig,
}

impl ContextManager {
    pub fn new() -> Self {
        Self {
            config: ContextConfig::default(),
        }
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Engine turns for the last N conversational messages.
    /// Loading placeholders and empty messages are skipped; consecutive
    /// non-user messages are folded into one assistant turn.
    pub fn recent_turns(&self, history: &[ChatMessage]) -> Vec<Turn> {
        let relevant: Vec<&ChatMessage> = history
            .iter()
            .filter(|m| m.message_type != MessageType::Loading && !m.text.trim().is_empty())
            .collect();

        let start = relevant.len().saturating_sub(self.config.preserve_recent_count);
        let mut turns: Vec<Turn> = Vec::new();

        for message in &relevant[start..] {
            if message.sender == Sender::User {
                turns.push(Turn::User(message.text.clone()));
                continue;
            }

            match turns.last_mut() {
                Some(Turn::Assistant { text, calls }) if calls.is_empty() => {
                    text.push_str("\n\n");
                    text.push_str(&message.text);
                }
                _ => turns.push(Turn::Assistant {
                    text: message.text.clone(),
                    calls: Vec::new(),
                }),
            }
        }

        turns
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefix the message with the connected wallet, if any
pub fn with_wallet_context(message: &str, wallet: Option<&str>) -> String {
    match wallet {
        Some(address) => format!("[User Wallet: {}]\n\n{}", address, message),
        None => message.to_string(),
    }
}
