//! Chat title generation
//!
//! Asks the completion engine for a short title under a deadline and falls
//! back to a deterministic local title on timeout, failure or empty output.

use crate::completion::{CompletionEngine, CompletionRequest, Turn};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const FALLBACK_TITLE_CHARS: usize = 50;
const MAX_TITLE_CHARS: usize = 80;

const TITLE_INSTRUCTIONS: &str = r#"You write chat titles.

Summarise the user's message as a short title of at most eight words.
Respond with the title only: no quotes, no trailing punctuation."#;

pub struct TitleGenerator {
    engine: Arc<dyn CompletionEngine>,
    timeout: Duration,
}

impl TitleGenerator {
    pub fn new(engine: Arc<dyn CompletionEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    /// Never fails; worst case is the local fallback
    pub async fn generate(&self, first_message: &str) -> String {
        let turns = vec![Turn::User(first_message.to_string())];
        let request = CompletionRequest::plain(TITLE_INSTRUCTIONS, &turns);

        match tokio::time::timeout(self.timeout, self.engine.complete(request)).await {
            Ok(Ok(completion)) => match clean_title(&completion.text) {
                Some(title) => {
                    info!(title = %title, "Generated chat title");
                    title
                }
                None => fallback_title(first_message),
            },
            Ok(Err(e)) => {
                warn!(error = %e, "Title generation failed, using fallback");
                fallback_title(first_message)
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Title generation timed out, using fallback");
                fallback_title(first_message)
            }
        }
    }
}

/// First 50 characters of the trimmed message, "..." appended when cut
pub fn fallback_title(message: &str) -> String {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return "New Chat".to_string();
    }

    if trimmed.chars().count() <= FALLBACK_TITLE_CHARS {
        return trimmed.to_string();
    }

    let head: String = trimmed.chars().take(FALLBACK_TITLE_CHARS).collect();
    format!("{}...", head.trim_end())
}

fn clean_title(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|l| !l.is_empty())?;
    let title = line
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '#')
        .trim()
        .trim_end_matches(['.', '!'])
        .trim();

    if title.is_empty() {
        return None;
    }

    Some(title.chars().take(MAX_TITLE_CHARS).collect())
}
