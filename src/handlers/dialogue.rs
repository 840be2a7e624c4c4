//! Solpilot and Sonia discuss the user's topic, taking turns

use super::{HandlerContext, MessageSink, TaskHandler};
use crate::classifier::IntentId;
use crate::completion::{CompletionEngine, CompletionRequest, Turn};
use crate::models::{ChatMessage, MessageType};
use crate::persona::Persona;
use crate::Result;
use std::sync::Arc;
use tracing::warn;

pub const DIALOGUE_TURNS: usize = 4;
pub const DIALOGUE_FAILED_TEXT: &str =
    "❌ Solpilot and Sonia couldn't start their conversation right now. Please try again.";

const SPEAKERS: [Persona; 2] = [Persona::Solpilot, Persona::Sonia];

pub struct DialogueHandler {
    engine: Arc<dyn CompletionEngine>,
    turns: usize,
}

impl DialogueHandler {
    pub fn new(engine: Arc<dyn CompletionEngine>) -> Self {
        Self {
            engine,
            turns: DIALOGUE_TURNS,
        }
    }

    fn prompt(topic: &str, transcript: &[(Persona, String)], speaker: Persona) -> String {
        let mut prompt = format!("Topic from the user: {}\n", topic);
        if !transcript.is_empty() {
            prompt.push_str("\nConversation so far:\n");
            for (persona, line) in transcript {
                prompt.push_str(&format!("{}: {}\n", persona.display_name(), line));
            }
        }
        prompt.push_str(&format!("\nReply as {}.", speaker.display_name()));
        prompt
    }
}

#[async_trait::async_trait]
impl TaskHandler for DialogueHandler {
    fn name(&self) -> &'static str {
        "agent_dialogue"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::TalkBetweenAgents]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        let mut transcript: Vec<(Persona, String)> = Vec::with_capacity(self.turns);

        for turn in 0..self.turns {
            let speaker = SPEAKERS[turn % SPEAKERS.len()];
            let partner = SPEAKERS[(turn + 1) % SPEAKERS.len()];
            let instructions = format!(
                "{}\n\nYou are talking with {} about the user's topic. Answer in at most three sentences and build on what was said.",
                speaker.instructions(),
                partner.display_name()
            );
            let turns = [Turn::User(Self::prompt(ctx.message, &transcript, speaker))];

            let reply = match self
                .engine
                .complete(CompletionRequest::plain(&instructions, &turns))
                .await
            {
                Ok(completion) if !completion.text.trim().is_empty() => completion.text.trim().to_string(),
                Ok(_) => break,
                Err(e) => {
                    warn!(turn, persona = %speaker, error = %e, "Agent dialogue turn failed");
                    break;
                }
            };

            sink.emit(
                ChatMessage::new(speaker.into(), MessageType::Text, reply.clone()).with_intent(ctx.intent),
            );
            transcript.push((speaker, reply));
        }

        if transcript.is_empty() {
            sink.emit(ChatMessage::error(DIALOGUE_FAILED_TEXT).with_intent(ctx.intent));
        }
        Ok(())
    }
}
