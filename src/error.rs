//! Error types for the chain assistant orchestrator

use crate::session::GateKind;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Dialogue Pipeline Errors
    // =============================

    #[error("Completion engine error: {0}")]
    CompletionEngine(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Capability error: {0}")]
    Capability(String),

    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("Capability '{0}' is not available to this persona")]
    CapabilityRefused(String),

    #[error("Invalid capability input: {0}")]
    InvalidCapabilityInput(String),

    // =============================
    // Session / Gate Errors
    // =============================

    #[error("A {0} action is pending; confirm or exit it first")]
    ActionPending(GateKind),

    #[error("A request is already in flight for this session")]
    RequestInFlight,

    #[error("No pending action to resolve")]
    NoPendingAction,

    #[error("Gate conflict: {0}")]
    GateConflict(String),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // =============================
    // Infrastructure Errors
    // =============================

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("UUID parse error: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssistantError {
    /// Conflicts the client can fix by resolving the session state first.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            AssistantError::ActionPending(_)
                | AssistantError::RequestInFlight
                | AssistantError::NoPendingAction
                | AssistantError::GateConflict(_)
        )
    }
}
