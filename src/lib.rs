//! Chain Assistant Orchestrator
//!
//! Conversational assistant core for a Solana wallet client:
//! - Classifies each message into a closed set of intents
//! - Runs deterministic task handlers for wallet, swap, staking and auction work
//! - Routes everything else to an LLM persona with a bounded capability loop
//! - Streams persona answers as server-sent events
//! - Gates the session on any action that needs explicit confirmation
//!
//! FLOW:
//! TEXT → CLASSIFY → HANDLER | PERSONA → TOOL LOOP → STREAM → GATE

pub mod agent;
pub mod api;
pub mod audit;
pub mod chain;
pub mod classifier;
pub mod completion;
pub mod config;
pub mod error;
pub mod execution;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod persona;
pub mod session;
pub mod state;
pub mod streaming;
pub mod tools;

#[cfg(test)]
mod testing;

pub use error::{AssistantError, Result};

// Re-export common types
pub use agent::{Assistant, Reply, ResponseMode};
pub use classifier::{IntentClassifier, IntentId};
pub use models::*;
pub use persona::{Persona, PersonaRouter};
pub use session::{GateKind, GateState};
