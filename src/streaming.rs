//! Streaming transport
//!
//! One response is an ordered event sequence on one channel:
//! persona (first, once) → text deltas → done | error (last, once).
//! Clients rebuild the text by concatenating deltas in arrival order.

use crate::agent::tool_loop::{LoopOutcome, LoopRequest, StepObserver, ToolLoop, ENGINE_FAILURE_MESSAGE};
use crate::error::AssistantError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const STREAM_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    #[serde(rename = "agent")]
    Persona { agent: String },
    #[serde(rename = "text")]
    TextDelta { content: String },
    #[serde(rename = "done")]
    Completion,
    #[serde(rename = "error")]
    Error { error: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completion | StreamEvent::Error { .. })
    }

    /// JSON body of one SSE `data:` line
    pub fn to_sse_data(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Split text into word-sized fragments; concatenating them gives the input back
pub fn chunk_text(text: &str) -> impl Iterator<Item = &str> {
    text.split_inclusive(|c: char| c.is_whitespace())
}

#[async_trait::async_trait]
impl StepObserver for mpsc::Sender<StreamEvent> {
    async fn on_text(&self, text: &str) -> bool {
        for fragment in chunk_text(text) {
            let event = StreamEvent::TextDelta {
                content: fragment.to_string(),
            };
            if self.send(event).await.is_err() {
                return false;
            }
        }
        true
    }

    fn is_listening(&self) -> bool {
        !self.is_closed()
    }
}

/// A running streamed response
pub struct ResponseStream {
    pub events: mpsc::Receiver<StreamEvent>,
    pub task: JoinHandle<Option<LoopOutcome>>,
}

/// Run the tool loop in its own task, emitting events as it goes.
/// The producer stops after its current step once the receiver is dropped.
pub fn spawn_stream(tool_loop: Arc<ToolLoop>, request: LoopRequest) -> ResponseStream {
    let (tx, events) = mpsc::channel(STREAM_CHANNEL_CAPACITY);

    let task = tokio::spawn(async move {
        let persona = StreamEvent::Persona {
            agent: request.persona.as_str().to_string(),
        };
        if tx.send(persona).await.is_err() {
            return None;
        }

        match tool_loop.run(&request, &tx).await {
            Ok(outcome) => {
                if outcome.cancelled {
                    debug!(persona = %outcome.persona, "Stream receiver gone; response abandoned");
                } else {
                    let _ = tx.send(StreamEvent::Completion).await;
                }
                Some(outcome)
            }
            Err(e) => {
                warn!(persona = %request.persona, error = %e, "Streamed response failed");
                let _ = tx
                    .send(StreamEvent::Error {
                        error: ENGINE_FAILURE_MESSAGE.to_string(),
                    })
                    .await;
                None
            }
        }
    });

    ResponseStream { events, task }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyState {
    Receiving,
    Complete,
    Failed(String),
}

/// Receiver-side reconstruction of one streamed response
#[derive(Debug)]
pub struct StreamAssembler {
    persona: Option<String>,
    text: String,
    state: AssemblyState,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self {
            persona: None,
            text: String::new(),
            state: AssemblyState::Receiving,
        }
    }

    pub fn push(&mut self, event: StreamEvent) -> Result<()> {
        if self.state != AssemblyState::Receiving {
            return Err(AssistantError::InvalidRequest(
                "event received after the stream finished".to_string(),
            ));
        }

        match event {
            StreamEvent::Persona { agent } => {
                if self.persona.is_some() || !self.text.is_empty() {
                    return Err(AssistantError::InvalidRequest(
                        "persona event must come first and only once".to_string(),
                    ));
                }
                self.persona = Some(agent);
            }
            StreamEvent::TextDelta { content } => self.text.push_str(&content),
            StreamEvent::Completion => self.state = AssemblyState::Complete,
            StreamEvent::Error { error } => self.state = AssemblyState::Failed(error),
        }
        Ok(())
    }

    pub fn persona(&self) -> Option<&str> {
        self.persona.as_deref()
    }

    pub fn state(&self) -> &AssemblyState {
        &self.state
    }

    /// Full text, only once the completion event arrived
    pub fn finished_text(&self) -> Option<&str> {
        match self.state {
            AssemblyState::Complete => Some(&self.text),
            _ => None,
        }
    }

    pub fn partial_text(&self) -> &str {
        &self.text
    }
}

impl Default for StreamAssembler {
    fn default() -> Self {
        Self::new()
    }
}
