//! Tool-invocation loop
//!
//! PROMPT → COMPLETE → CALL CAPABILITIES → FEED RESULTS → COMPLETE ...
//!
//! Runs until the engine stops requesting calls or the step ceiling is
//! hit. The whole run state is one owned [`LoopState`] moved through each
//! step. Capability failures are fed back to the engine as envelopes; only
//! an engine failure aborts the run.

use crate::audit::{AuditLog, LoopAuditRecord};
use crate::completion::{CapabilitySpec, CompletionEngine, CompletionRequest, Turn};
use crate::config::DEFAULT_MAX_TOOL_STEPS;
use crate::execution::CapabilityExecutor;
use crate::memory::{with_wallet_context, ContextConfig, ContextManager};
use crate::models::{ChatMessage, ToolCallRecord};
use crate::persona::Persona;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const FALLBACK_RESPONSE: &str = "I've processed your request.";
pub const ENGINE_FAILURE_MESSAGE: &str =
    "❌ Sorry, I couldn't get a response right now. Please try again.";

/// Receives the text of each step as it is produced
#[async_trait::async_trait]
pub trait StepObserver: Send + Sync {
    /// Returns `false` once nobody is listening any more
    async fn on_text(&self, text: &str) -> bool;
    /// Checked after every step, text or not
    fn is_listening(&self) -> bool;
}

pub struct NoopObserver;

#[async_trait::async_trait]
impl StepObserver for NoopObserver {
    async fn on_text(&self, _text: &str) -> bool {
        true
    }

    fn is_listening(&self) -> bool {
        true
    }
}

/// Everything one run needs, owned so it can move into a spawned task
#[derive(Debug, Clone)]
pub struct LoopRequest {
    pub session_id: Option<Uuid>,
    pub persona: Persona,
    pub message: String,
    /// Messages before the current one
    pub history: Vec<ChatMessage>,
    pub wallet: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub persona: Persona,
    pub text: String,
    pub records: Vec<ToolCallRecord>,
    pub steps: usize,
    pub cancelled: bool,
    pub audit_id: Option<Uuid>,
}

#[derive(Debug, Default)]
struct LoopState {
    transcript: Vec<Turn>,
    records: Vec<ToolCallRecord>,
    text: String,
    steps: usize,
}

enum StepOutcome {
    /// Engine asked for calls; feed results back
    Continue(LoopState),
    /// Engine answered without calls
    Finished(LoopState),
    /// Observer went away
    Abandoned(LoopState),
}

pub struct ToolLoop {
    engine: Arc<dyn CompletionEngine>,
    executor: Arc<CapabilityExecutor>,
    context: ContextManager,
    audit: Arc<AuditLog>,
    max_steps: usize,
}

impl ToolLoop {
    pub fn new(
        engine: Arc<dyn CompletionEngine>,
        executor: Arc<CapabilityExecutor>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            engine,
            executor,
            context: ContextManager::new(),
            audit,
            max_steps: DEFAULT_MAX_TOOL_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.context = ContextManager::with_config(ContextConfig {
            preserve_recent_count: window,
        });
        self
    }

    pub fn engine(&self) -> &Arc<dyn CompletionEngine> {
        &self.engine
    }

    pub async fn run(
        &self,
        request: &LoopRequest,
        observer: &dyn StepObserver,
    ) -> Result<LoopOutcome> {
        let start = Instant::now();
        let persona = request.persona;
        let allowed = persona.capabilities();
        let catalogue = self.executor.registry().catalogue(allowed);

        info!(
            session_id = ?request.session_id,
            persona = %persona,
            capabilities = catalogue.len(),
            "Tool loop: starting"
        );

        let mut transcript = self.context.recent_turns(&request.history);
        transcript.push(Turn::User(with_wallet_context(
            &request.message,
            request.wallet.as_deref(),
        )));

        let mut state = LoopState {
            transcript,
            ..LoopState::default()
        };
        let mut cancelled = false;

        while state.steps < self.max_steps {
            match self.step(persona, &catalogue, allowed, state, observer).await? {
                StepOutcome::Continue(next) => {
                    state = next;
                    // Let the consumer run so a hang-up is seen before the next step.
                    tokio::task::yield_now().await;
                    if !observer.is_listening() {
                        debug!(persona = %persona, step = state.steps, "Tool loop: observer gone");
                        cancelled = true;
                        break;
                    }
                }
                StepOutcome::Finished(next) => {
                    state = next;
                    break;
                }
                StepOutcome::Abandoned(next) => {
                    state = next;
                    cancelled = true;
                    break;
                }
            }
        }

        if state.steps >= self.max_steps {
            debug!(persona = %persona, steps = state.steps, "Tool loop: step ceiling reached");
        }

        if !cancelled && state.text.trim().is_empty() {
            state.text = FALLBACK_RESPONSE.to_string();
            cancelled = !observer.on_text(FALLBACK_RESPONSE).await;
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let record = LoopAuditRecord::new(
            request.session_id,
            persona.as_str(),
            state.records.clone(),
            state.steps,
            duration_ms,
        );
        let audit_id = match self.audit.record(record).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Failed to write tool loop audit record");
                None
            }
        };

        info!(
            persona = %persona,
            steps = state.steps,
            tool_calls = state.records.len(),
            cancelled,
            duration_ms,
            "Tool loop: complete"
        );

        Ok(LoopOutcome {
            persona,
            text: state.text,
            records: state.records,
            steps: state.steps,
            cancelled,
            audit_id,
        })
    }

    async fn step(
        &self,
        persona: Persona,
        catalogue: &[CapabilitySpec],
        allowed: &[&str],
        mut state: LoopState,
        observer: &dyn StepObserver,
    ) -> Result<StepOutcome> {
        state.steps += 1;

        let completion = self
            .engine
            .complete(CompletionRequest {
                instructions: persona.instructions(),
                turns: &state.transcript,
                capabilities: catalogue,
            })
            .await
            .map_err(|e| {
                warn!(persona = %persona, step = state.steps, error = %e, "Completion engine failed");
                e
            })?;

        debug!(
            persona = %persona,
            step = state.steps,
            calls = completion.calls.len(),
            "Tool loop: step completed"
        );

        let mut listening = true;
        if !completion.text.trim().is_empty() {
            let fragment = if state.text.is_empty() {
                completion.text.clone()
            } else {
                format!("\n\n{}", completion.text)
            };
            state.text.push_str(&fragment);
            listening = observer.on_text(&fragment).await;
        }

        let calls = completion.calls;
        state.transcript.push(Turn::Assistant {
            text: completion.text,
            calls: calls.clone(),
        });

        if calls.is_empty() {
            return Ok(StepOutcome::Finished(state));
        }

        for call in calls {
            let record = self.executor.execute(&call, allowed).await;
            let result = serde_json::to_value(&record.result)?;
            state.transcript.push(Turn::ToolResult { call, result });
            state.records.push(record);
        }

        if listening && observer.is_listening() {
            Ok(StepOutcome::Continue(state))
        } else {
            Ok(StepOutcome::Abandoned(state))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{Completion, ScriptedEngine, ToolCall};
    use crate::error::AssistantError;
    use crate::testing::{FixtureGateway, WALLET};
    use crate::tools::create_default_registry;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    fn price_call() -> ToolCall {
        ToolCall {
            id: "c1".to_string(),
            name: "price_lookup".to_string(),
            arguments: json!({"token": "SOL"}),
        }
    }

    fn tool_loop(engine: Arc<dyn CompletionEngine>, gateway: FixtureGateway) -> ToolLoop {
        let executor = CapabilityExecutor::new(
            create_default_registry(Arc::new(gateway)),
            Duration::from_secs(2),
        );
        ToolLoop::new(engine, Arc::new(executor), Arc::new(AuditLog::new()))
    }

    fn request(message: &str) -> LoopRequest {
        LoopRequest {
            session_id: None,
            persona: Persona::Solpilot,
            message: message.to_string(),
            history: Vec::new(),
            wallet: None,
        }
    }

    #[derive(Default)]
    struct Collecting {
        fragments: Mutex<Vec<String>>,
        hang_up_after: Option<usize>,
    }

    #[async_trait::async_trait]
    impl StepObserver for Collecting {
        async fn on_text(&self, text: &str) -> bool {
            let mut fragments = self.fragments.lock().unwrap();
            fragments.push(text.to_string());
            self.hang_up_after.map_or(true, |n| fragments.len() < n)
        }

        fn is_listening(&self) -> bool {
            true
        }
    }

    /// Never emits text; goes away after a fixed number of checks
    struct Leaving {
        checks_left: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl StepObserver for Leaving {
        async fn on_text(&self, _text: &str) -> bool {
            true
        }

        fn is_listening(&self) -> bool {
            let mut left = self.checks_left.lock().unwrap();
            if *left == 0 {
                return false;
            }
            *left -= 1;
            true
        }
    }

    #[tokio::test]
    async fn test_stops_at_step_ceiling() {
        let script = (0..10).map(|_| Ok(Completion::calls(vec![price_call()]))).collect();
        let engine = Arc::new(ScriptedEngine::new(script));
        let loop_ = tool_loop(engine.clone(), FixtureGateway::new());

        let outcome = loop_.run(&request("price?"), &NoopObserver).await.unwrap();
        assert_eq!(outcome.steps, 5);
        assert_eq!(engine.call_count(), 5);
        assert_eq!(outcome.records.len(), 5);
        assert_eq!(outcome.text, FALLBACK_RESPONSE);
    }

    #[tokio::test]
    async fn test_call_then_answer() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(Completion::calls(vec![price_call()])),
            Ok(Completion::text("SOL is $150.")),
        ]));
        let outcome = tool_loop(engine, FixtureGateway::new())
            .run(&request("price of SOL"), &NoopObserver)
            .await
            .unwrap();

        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.text, "SOL is $150.");
        assert!(outcome.records[0].result.success);
        assert!(outcome.audit_id.is_some());
    }

    #[tokio::test]
    async fn test_failed_call_does_not_abort() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(Completion::calls(vec![price_call()])),
            Ok(Completion::text("Price service is down, try later.")),
        ]));
        let outcome = tool_loop(engine, FixtureGateway::new().failing_on("token_price"))
            .run(&request("price of SOL"), &NoopObserver)
            .await
            .unwrap();

        assert_eq!(outcome.steps, 2);
        assert!(!outcome.records[0].result.success);
        assert_eq!(outcome.text, "Price service is down, try later.");
    }

    #[tokio::test]
    async fn test_engine_failure_aborts() {
        let engine = Arc::new(ScriptedEngine::new(vec![Err(AssistantError::CompletionEngine(
            "unreachable".to_string(),
        ))]));
        let result = tool_loop(engine, FixtureGateway::new())
            .run(&request("hello"), &NoopObserver)
            .await;
        assert!(matches!(result, Err(AssistantError::CompletionEngine(_))));
    }

    #[tokio::test]
    async fn test_observed_text_matches_final_text() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(Completion {
                text: "Checking.".to_string(),
                calls: vec![price_call()],
            }),
            Ok(Completion::text("SOL is $150.")),
        ]));
        let observer = Collecting::default();
        let outcome = tool_loop(engine, FixtureGateway::new())
            .run(&request("price"), &observer)
            .await
            .unwrap();

        let streamed: String = observer.fragments.lock().unwrap().concat();
        assert_eq!(streamed, outcome.text);
        assert_eq!(outcome.text, "Checking.\n\nSOL is $150.");
    }

    #[tokio::test]
    async fn test_observer_hangup_stops_after_current_step() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(Completion {
                text: "Working on it.".to_string(),
                calls: vec![price_call()],
            }),
            Ok(Completion::text("never requested")),
        ]));
        let observer = Collecting {
            hang_up_after: Some(1),
            ..Default::default()
        };
        let outcome = tool_loop(engine.clone(), FixtureGateway::new())
            .run(&request("price"), &observer)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_silent_steps_stop_once_observer_leaves() {
        let script = (0..5).map(|_| Ok(Completion::calls(vec![price_call()]))).collect();
        let engine = Arc::new(ScriptedEngine::new(script));
        let gateway = Arc::new(FixtureGateway::new());
        let executor = CapabilityExecutor::new(create_default_registry(gateway.clone()), Duration::from_secs(2));
        let loop_ = ToolLoop::new(engine.clone(), Arc::new(executor), Arc::new(AuditLog::new()));

        let observer = Leaving {
            checks_left: Mutex::new(0),
        };
        let outcome = loop_.run(&request("price?"), &observer).await.unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.steps, 1);
        assert_eq!(engine.call_count(), 1);
        assert_eq!(gateway.calls("token_price"), 1);
    }

    #[tokio::test]
    async fn test_calls_outside_persona_catalogue_are_refused() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok(Completion::calls(vec![ToolCall {
                id: "c1".to_string(),
                name: "news_search".to_string(),
                arguments: json!({"query": "solana"}),
            }])),
            Ok(Completion::text("done")),
        ]));
        let mut req = request("what's my balance");
        req.persona = Persona::Zerion;
        req.wallet = Some(WALLET.to_string());

        let outcome = tool_loop(engine, FixtureGateway::new())
            .run(&req, &NoopObserver)
            .await
            .unwrap();
        assert!(!outcome.records[0].result.success);
    }
}
