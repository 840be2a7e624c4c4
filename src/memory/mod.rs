//! Conversation memory
//!
//! Session chat history, the recent-context window handed to the engine,
//! chat titles, and the persisted chat record store.

pub mod context_manager;
pub mod persistence;
pub mod store;
pub mod title;

pub use context_manager::{with_wallet_context, ContextConfig, ContextManager};
pub use persistence::{ChatStore, ChatSummary};
pub use store::ChatHistory;
pub use title::{fallback_title, TitleGenerator};
