//! Completion engine seam
//!
//! The tool loop only talks to [`CompletionEngine`]; Gemini is one
//! implementation, [`ScriptedEngine`] replays canned completions.

pub mod gemini;

use crate::error::AssistantError;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

pub use gemini::GeminiClient;

/// A capability invocation requested by the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One entry of the transcript sent to the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    User(String),
    Assistant { text: String, calls: Vec<ToolCall> },
    ToolResult { call: ToolCall, result: Value },
}

/// Declaration of a capability the engine may call
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CapabilitySpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

pub struct CompletionRequest<'a> {
    pub instructions: &'a str,
    pub turns: &'a [Turn],
    pub capabilities: &'a [CapabilitySpec],
}

impl<'a> CompletionRequest<'a> {
    pub fn plain(instructions: &'a str, turns: &'a [Turn]) -> Self {
        Self {
            instructions,
            turns,
            capabilities: &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub calls: Vec<ToolCall>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: Vec::new(),
        }
    }

    pub fn calls(calls: Vec<ToolCall>) -> Self {
        Self {
            text: String::new(),
            calls,
        }
    }
}

#[async_trait::async_trait]
pub trait CompletionEngine: Send + Sync {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<Completion>;
}

/// Engine that replays a fixed script, one completion per call.
/// Running past the end of the script is an engine failure.
pub struct ScriptedEngine {
    script: Mutex<VecDeque<Result<Completion>>>,
    calls: Mutex<usize>,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Result<Completion>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(vec![Ok(Completion::text(text))])
    }

    /// Number of completions requested so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl CompletionEngine for ScriptedEngine {
    async fn complete(&self, _request: CompletionRequest<'_>) -> Result<Completion> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }

        let next = self
            .script
            .lock()
            .map_err(|_| AssistantError::CompletionEngine("script lock poisoned".to_string()))?
            .pop_front();

        next.unwrap_or_else(|| {
            Err(AssistantError::CompletionEngine(
                "scripted engine has no more completions".to_string(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_engine_replays_in_order() {
        let engine = ScriptedEngine::new(vec![
            Ok(Completion::text("first")),
            Ok(Completion::text("second")),
        ]);
        let turns = vec![Turn::User("hi".to_string())];

        let a = engine.complete(CompletionRequest::plain("", &turns)).await.unwrap();
        let b = engine.complete(CompletionRequest::plain("", &turns)).await.unwrap();
        let c = engine.complete(CompletionRequest::plain("", &turns)).await;

        assert_eq!(a.text, "first");
        assert_eq!(b.text, "second");
        assert!(matches!(c, Err(AssistantError::CompletionEngine(_))));
        assert_eq!(engine.call_count(), 3);
    }
}
