//! Message dispatcher
//!
//! TEXT → GATE CHECK → CLASSIFY → HANDLER | PERSONA (stream or not) → RECORD
//!
//! [`Assistant`] owns every long-lived handle (collaborators, stores, the
//! tool loop) and is the single entry point for the HTTP layer and the CLI.

pub mod tool_loop;

use crate::audit::{AuditLog, LoopAuditRecord};
use crate::chain::ChainGateway;
use crate::classifier::{IntentClassifier, IntentId};
use crate::completion::CompletionEngine;
use crate::config::LimitConfig;
use crate::error::AssistantError;
use crate::execution::CapabilityExecutor;
use crate::handlers::grammar::is_valid_address;
use crate::handlers::{create_default_handlers, HandlerContext, HandlerRegistry, Route, TaskHandler};
use crate::memory::{fallback_title, ChatStore, ChatSummary, TitleGenerator};
use crate::models::{ChatMessage, MessageType, SessionContext, ToolCallRecord};
use crate::persona::{Persona, PersonaRouter};
use crate::session::{ActionExecutor, ConfirmInput, Session, WalletHandoffExecutor};
use crate::state::{InMemorySessionStore, SessionHandle, SessionStore};
use crate::streaming::{spawn_stream, StreamEvent, STREAM_CHANNEL_CAPACITY};
use crate::tools::create_default_registry;
use crate::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tool_loop::{LoopRequest, NoopObserver, ToolLoop, ENGINE_FAILURE_MESSAGE};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const GENERIC_FAILURE_TEXT: &str = "❌ Failed to process request. Please try again.";
pub const STREAM_INTERRUPTED_TEXT: &str = "❌ The response was interrupted. Please try again.";

/// How the caller wants a persona answer delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Streaming,
    Complete,
}

/// Non-streaming result of one submitted message
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub messages: Vec<ChatMessage>,
    pub persona: Option<Persona>,
    pub tool_results: Vec<ToolCallRecord>,
    pub steps: usize,
}

pub enum Reply {
    Messages(ChatReply),
    Stream(mpsc::Receiver<StreamEvent>),
}

/// Stateless persona question, outside any session
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PersonaQuery {
    pub message: String,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PersonaResponse {
    pub success: bool,
    pub agent: Persona,
    pub response: String,
    pub tool_results: Vec<ToolCallRecord>,
    pub steps: usize,
}

/// Money-transfer phrasing goes through the transfer handler and the
/// non-streaming path, whatever the classifier would say.
///
/// "to" counts only as a whole word, so "send the token list" is not a
/// transfer. "sol" is still a substring match.
pub fn is_transfer_request(message: &str) -> bool {
    let text = message.to_lowercase();
    let verb = text.contains("send") || text.contains("transfer");
    let target = text.contains("sol")
        || text
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| word == "to");
    verb && target
}

pub struct Assistant {
    sessions: Arc<dyn SessionStore>,
    chats: Arc<ChatStore>,
    handlers: HandlerRegistry,
    router: PersonaRouter,
    tool_loop: Arc<ToolLoop>,
    actions: Arc<dyn ActionExecutor>,
    titles: TitleGenerator,
    audit: Arc<AuditLog>,
    history_window: usize,
}

impl Assistant {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        engine: Arc<dyn CompletionEngine>,
        chats: ChatStore,
        limits: &LimitConfig,
    ) -> Self {
        let audit = Arc::new(AuditLog::with_capacity(limits.audit_capacity));
        let executor = CapabilityExecutor::new(
            create_default_registry(gateway.clone()),
            limits.capability_timeout,
        );
        let tool_loop = ToolLoop::new(engine.clone(), Arc::new(executor), audit.clone())
            .with_max_steps(limits.max_tool_steps)
            .with_history_window(limits.history_window);

        Self {
            sessions: Arc::new(InMemorySessionStore::new()),
            chats: Arc::new(chats),
            handlers: create_default_handlers(gateway, engine.clone()),
            router: PersonaRouter::new(),
            tool_loop: Arc::new(tool_loop),
            actions: Arc::new(WalletHandoffExecutor),
            titles: TitleGenerator::new(engine, limits.title_timeout),
            audit,
            history_window: limits.history_window,
        }
    }

    pub fn with_action_executor(mut self, actions: Arc<dyn ActionExecutor>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Tool-loop runs of one session still held by the audit log, oldest first
    pub async fn audit_trail(&self, id: Uuid) -> Result<Vec<LoopAuditRecord>> {
        self.session(id).await?;
        self.audit.list_for_session(id).await
    }

    /// Drop live sessions untouched for `max_idle`. Busy sessions stay; the
    /// rest are restored from the chat store on their next request.
    pub async fn evict_idle_sessions(&self, max_idle: Duration) -> Result<usize> {
        let mut evicted = 0;
        for id in self.sessions.idle(max_idle).await {
            let Some(handle) = self.sessions.get(id).await? else {
                continue;
            };
            let busy = match handle.try_lock() {
                Ok(session) => session.is_in_flight(),
                Err(_) => true,
            };
            if busy {
                continue;
            }
            if self.sessions.remove(id).await? {
                evicted += 1;
            }
        }
        if evicted > 0 {
            let remaining = self.sessions.len().await;
            info!(evicted, remaining, "Idle sessions evicted");
        }
        Ok(evicted)
    }

    // =============================
    // Sessions
    // =============================

    pub async fn create_session(
        &self,
        wallet: Option<String>,
        auth_token: Option<String>,
        title: Option<String>,
    ) -> Result<ChatSummary> {
        if let Some(address) = wallet.as_deref() {
            if !is_valid_address(address) {
                return Err(AssistantError::InvalidRequest(format!(
                    "invalid wallet address: {}",
                    address
                )));
            }
        }

        let id = Uuid::new_v4();
        let context = SessionContext::new(self.history_window).with_wallet(wallet.clone());
        let mut session = Session::new(id, context);
        session.authenticate(auth_token);
        self.sessions.insert(session).await?;

        let summary = ChatSummary {
            id,
            title: title.unwrap_or_else(|| fallback_title("")),
            wallet_address: wallet,
            created_at: Utc::now(),
        };
        if let Err(e) = self.chats.create_chat(&summary).await {
            warn!(session_id = %id, error = %e, "Failed to persist chat record");
        }

        info!(session_id = %id, "Session created");
        Ok(summary)
    }

    /// Live session, restored from the chat store when not in memory
    async fn session(&self, id: Uuid) -> Result<SessionHandle> {
        if let Some(handle) = self.sessions.get(id).await? {
            return Ok(handle);
        }

        let summary = self
            .chats
            .chat(id)
            .await?
            .ok_or(AssistantError::SessionNotFound(id))?;
        let messages = self.chats.load_messages(id).await?;
        debug!(session_id = %id, messages = messages.len(), "Restoring session from chat store");

        let context = SessionContext::new(self.history_window).with_wallet(summary.wallet_address);
        self.sessions.insert(Session::restore(id, context, messages)).await
    }

    pub async fn connect_wallet(&self, id: Uuid, wallet: Option<String>) -> Result<()> {
        if let Some(address) = wallet.as_deref() {
            if !is_valid_address(address) {
                return Err(AssistantError::InvalidRequest(format!(
                    "invalid wallet address: {}",
                    address
                )));
            }
        }
        let handle = self.session(id).await?;
        handle.lock().await.connect_wallet(wallet.clone());

        // Restores read the wallet back from the chat record.
        match self.chats.chat(id).await {
            Ok(Some(mut summary)) => {
                summary.wallet_address = wallet;
                if let Err(e) = self.chats.create_chat(&summary).await {
                    warn!(session_id = %id, error = %e, "Failed to persist wallet change");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(session_id = %id, error = %e, "Failed to load chat record"),
        }
        Ok(())
    }

    pub async fn history(&self, id: Uuid) -> Result<Vec<ChatMessage>> {
        let handle = self.session(id).await?;
        let session = handle.lock().await;
        Ok(session.history().messages().to_vec())
    }

    pub async fn list_chats(&self, wallet: Option<&str>) -> Result<Vec<ChatSummary>> {
        self.chats.list_chats(wallet).await
    }

    async fn persist(&self, session: &Session) {
        if let Err(e) = self
            .chats
            .save_messages(session.id(), session.history().messages())
            .await
        {
            warn!(session_id = %session.id(), error = %e, "Failed to persist chat history");
        }
    }

    // =============================
    // Submission
    // =============================

    pub async fn submit(&self, id: Uuid, text: &str, mode: ResponseMode) -> Result<Reply> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AssistantError::InvalidRequest("message must not be empty".to_string()));
        }

        let handle = self.session(id).await?;
        let (prior, wallet) = {
            let mut session = handle.lock().await;
            session.begin_request()?;
            let prior = session.history().messages().to_vec();
            let wallet = session.context().wallet_address.clone();
            if let Err(e) = session.record(ChatMessage::user(text)) {
                session.end_request();
                return Err(e);
            }
            (prior, wallet)
        };

        let start = Instant::now();
        let (intent, route) = if is_transfer_request(text) {
            (IntentId::SendToken, self.handlers.route(IntentId::SendToken))
        } else {
            let intent = IntentClassifier::classify(text);
            (intent, self.handlers.route(intent))
        };

        info!(session_id = %id, intent = %intent, ?mode, "Message dispatched");

        let reply = match route {
            Route::Handler(handler) => {
                let ctx = HandlerContext {
                    intent,
                    message: text,
                    history: &prior,
                    wallet: wallet.as_deref(),
                };
                let messages = self.run_handler(handler.as_ref(), ctx).await;
                ChatReply {
                    messages,
                    persona: None,
                    tool_results: Vec::new(),
                    steps: 0,
                }
            }
            Route::Persona => {
                let request = LoopRequest {
                    session_id: Some(id),
                    persona: self.router.select(text),
                    message: text.to_string(),
                    history: prior,
                    wallet,
                };
                if mode == ResponseMode::Streaming {
                    return Ok(Reply::Stream(self.start_stream(handle, request).await));
                }
                self.run_complete(request).await
            }
        };

        let mut session = handle.lock().await;
        for message in &reply.messages {
            if let Err(e) = session.record(message.clone()) {
                warn!(session_id = %id, error = %e, "Dropped message produced after a gate");
            }
        }
        session.end_request();
        self.persist(&session).await;

        debug!(
            session_id = %id,
            messages = reply.messages.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Message handled"
        );
        Ok(Reply::Messages(reply))
    }

    async fn run_handler(&self, handler: &dyn TaskHandler, ctx: HandlerContext<'_>) -> Vec<ChatMessage> {
        let mut sink: Vec<ChatMessage> = Vec::new();
        if let Err(e) = handler.handle(ctx, &mut sink).await {
            warn!(handler = handler.name(), intent = %ctx.intent, error = %e, "Handler failed");
            sink.retain(|m| m.message_type != MessageType::Loading && !m.is_gating());
            sink.push(ChatMessage::error(GENERIC_FAILURE_TEXT).with_intent(ctx.intent));
        }
        sink
    }

    async fn run_complete(&self, request: LoopRequest) -> ChatReply {
        let persona = request.persona;
        match self.tool_loop.run(&request, &NoopObserver).await {
            Ok(outcome) => ChatReply {
                messages: vec![ChatMessage::new(persona.into(), MessageType::Text, outcome.text)],
                persona: Some(persona),
                tool_results: outcome.records,
                steps: outcome.steps,
            },
            Err(e) => {
                warn!(persona = %persona, error = %e, "Persona response failed");
                ChatReply {
                    messages: vec![ChatMessage::error(ENGINE_FAILURE_MESSAGE)],
                    persona: Some(persona),
                    tool_results: Vec::new(),
                    steps: 0,
                }
            }
        }
    }

    /// Relay the producer's events to the client while growing the
    /// session's streaming message. The request ends when the stream does.
    async fn start_stream(&self, handle: SessionHandle, request: LoopRequest) -> mpsc::Receiver<StreamEvent> {
        handle.lock().await.begin_stream(request.persona.into());

        let mut producer = spawn_stream(self.tool_loop.clone(), request);
        let (client_tx, client_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let chats = self.chats.clone();

        tokio::spawn(async move {
            let mut finished = false;

            while let Some(event) = producer.events.recv().await {
                {
                    let mut session = handle.lock().await;
                    match &event {
                        StreamEvent::Persona { .. } => {}
                        StreamEvent::TextDelta { content } => {
                            session.append_stream(content);
                        }
                        StreamEvent::Completion => {
                            session.finish_stream();
                            session.end_request();
                            save(&chats, &session).await;
                            finished = true;
                        }
                        StreamEvent::Error { error } => {
                            session.discard_stream();
                            if let Err(e) = session.record(ChatMessage::error(error.clone())) {
                                warn!(error = %e, "Failed to record stream error");
                            }
                            session.end_request();
                            save(&chats, &session).await;
                            finished = true;
                        }
                    }
                }

                if client_tx.send(event).await.is_err() {
                    debug!("Stream client disconnected");
                    break;
                }
                if finished {
                    break;
                }
            }

            if !finished {
                let mut session = handle.lock().await;
                session.discard_stream();
                if let Err(e) = session.record(ChatMessage::error(STREAM_INTERRUPTED_TEXT)) {
                    warn!(error = %e, "Failed to record stream interruption");
                }
                session.end_request();
                save(&chats, &session).await;

                let _ = client_tx
                    .send(StreamEvent::Error {
                        error: STREAM_INTERRUPTED_TEXT.to_string(),
                    })
                    .await;
            }
        });

        client_rx
    }

    // =============================
    // Gate resolution
    // =============================

    pub async fn confirm(&self, id: Uuid, input: ConfirmInput) -> Result<Vec<ChatMessage>> {
        let handle = self.session(id).await?;
        let mut session = handle.lock().await;
        let changed = session.confirm(input, self.actions.as_ref()).await?;
        self.persist(&session).await;
        Ok(changed)
    }

    pub async fn exit(&self, id: Uuid) -> Result<Vec<ChatMessage>> {
        let handle = self.session(id).await?;
        let mut session = handle.lock().await;
        let changed = session.exit()?;
        self.persist(&session).await;
        Ok(changed)
    }

    // =============================
    // Stateless helpers
    // =============================

    pub async fn ask_persona(&self, query: PersonaQuery) -> PersonaResponse {
        let persona = query
            .persona
            .as_deref()
            .and_then(Persona::parse)
            .unwrap_or_else(|| self.router.select(&query.message));

        let request = LoopRequest {
            session_id: None,
            persona,
            message: query.message,
            history: query.history,
            wallet: query.wallet_address,
        };

        match self.tool_loop.run(&request, &NoopObserver).await {
            Ok(outcome) => PersonaResponse {
                success: true,
                agent: persona,
                response: outcome.text,
                tool_results: outcome.records,
                steps: outcome.steps,
            },
            Err(e) => {
                warn!(persona = %persona, error = %e, "Persona query failed");
                PersonaResponse {
                    success: false,
                    agent: persona,
                    response: ENGINE_FAILURE_MESSAGE.to_string(),
                    tool_results: Vec::new(),
                    steps: 0,
                }
            }
        }
    }

    pub async fn title(&self, first_message: &str) -> String {
        self.titles.generate(first_message).await
    }
}

async fn save(chats: &ChatStore, session: &Session) {
    if let Err(e) = chats.save_messages(session.id(), session.history().messages()).await {
        warn!(session_id = %session.id(), error = %e, "Failed to persist chat history");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{Completion, ScriptedEngine, ToolCall};
    use crate::session::GateState;
    use crate::streaming::StreamAssembler;
    use crate::testing::{FixtureGateway, RECEIVER, WALLET};
    use serde_json::json;
    use tokio_test::assert_ok;

    fn assistant(gateway: FixtureGateway, script: Vec<Result<Completion>>) -> Assistant {
        Assistant::new(
            Arc::new(gateway),
            Arc::new(ScriptedEngine::new(script)),
            ChatStore::in_memory(),
            &LimitConfig::default(),
        )
    }

    fn messages(reply: Reply) -> ChatReply {
        match reply {
            Reply::Messages(reply) => reply,
            Reply::Stream(_) => panic!("expected a complete reply"),
        }
    }

    async fn collect(reply: Reply) -> StreamAssembler {
        let Reply::Stream(mut rx) = reply else {
            panic!("expected a stream");
        };
        let mut assembler = StreamAssembler::new();
        while let Some(event) = rx.recv().await {
            assembler.push(event).unwrap();
        }
        assembler
    }

    #[test]
    fn test_transfer_detection() {
        assert!(is_transfer_request("send 5 SOL to abc"));
        assert!(is_transfer_request("Transfer 3 usdc to my friend"));
        assert!(!is_transfer_request("swap 5 SOL to USDC"));
        assert!(!is_transfer_request("send me the news"));
        assert!(!is_transfer_request("send the token list"));
        assert!(is_transfer_request("send it to me"));
    }

    #[tokio::test]
    async fn test_transfer_gates_and_blocks_free_text() {
        let a = assistant(FixtureGateway::new(), vec![]);
        let chat = a.create_session(Some(WALLET.to_string()), None, None).await.unwrap();

        let reply = messages(
            a.submit(chat.id, &format!("Send 5 SOL to {}", RECEIVER), ResponseMode::Streaming)
                .await
                .unwrap(),
        );
        assert_eq!(reply.messages.last().unwrap().message_type, MessageType::SendToken);

        let blocked = a.submit(chat.id, "what's the price of SOL", ResponseMode::Complete).await;
        assert!(matches!(blocked, Err(AssistantError::ActionPending(_))));

        let closed = a.exit(chat.id).await.unwrap();
        assert_eq!(closed.last().unwrap().text, crate::session::CLOSED_MESSAGE);
        assert_ok!(a.submit(chat.id, "price of SOL", ResponseMode::Complete).await);
    }

    #[tokio::test]
    async fn test_self_transfer_creates_no_gate() {
        let a = assistant(FixtureGateway::new(), vec![]);
        let chat = a.create_session(Some(WALLET.to_string()), None, None).await.unwrap();

        let reply = messages(
            a.submit(chat.id, &format!("Send 5 SOL to {}", WALLET), ResponseMode::Complete)
                .await
                .unwrap(),
        );
        assert_eq!(reply.messages[0].message_type, MessageType::Error);

        let handle = a.session(chat.id).await.unwrap();
        assert_eq!(handle.lock().await.gate(), GateState::Free);
    }

    #[tokio::test]
    async fn test_swap_then_confirm() {
        let gateway = FixtureGateway::new();
        let a = assistant(gateway, vec![]);
        let chat = a.create_session(Some(WALLET.to_string()), None, None).await.unwrap();

        a.submit(chat.id, "Swap 50 SOL to USDT", ResponseMode::Complete).await.unwrap();
        let changed = a.confirm(chat.id, ConfirmInput::default()).await.unwrap();
        assert_eq!(changed[0].message_type, MessageType::Success);

        let history = a.history(chat.id).await.unwrap();
        let types: Vec<MessageType> = history.iter().map(|m| m.message_type).collect();
        assert_eq!(types, vec![MessageType::Text, MessageType::Success, MessageType::Success]);
    }

    #[tokio::test]
    async fn test_garbled_input_gets_persona_answer() {
        let a = assistant(FixtureGateway::new(), vec![Ok(Completion::text("Could you rephrase that?"))]);
        let chat = a.create_session(None, None, None).await.unwrap();

        let reply = messages(a.submit(chat.id, "zzqx vvbn", ResponseMode::Complete).await.unwrap());
        assert_eq!(reply.persona, Some(Persona::Solpilot));
        assert_eq!(reply.messages[0].text, "Could you rephrase that?");
    }

    #[tokio::test]
    async fn test_stream_and_complete_give_same_text() {
        let script = || {
            vec![
                Ok(Completion::calls(vec![ToolCall {
                    id: "c1".to_string(),
                    name: "network_metrics".to_string(),
                    arguments: json!({}),
                }])),
                Ok(Completion::text("Solana TVL is about $9.1B.")),
            ]
        };

        let a = assistant(FixtureGateway::new(), script());
        let chat = a.create_session(None, None, None).await.unwrap();
        let complete = messages(a.submit(chat.id, "hmm tell me something", ResponseMode::Complete).await.unwrap());

        let b = assistant(FixtureGateway::new(), script());
        let chat_b = b.create_session(None, None, None).await.unwrap();
        let streamed = collect(b.submit(chat_b.id, "hmm tell me something", ResponseMode::Streaming).await.unwrap()).await;

        assert_eq!(streamed.finished_text(), Some(complete.messages[0].text.as_str()));

        let history = b.history(chat_b.id).await.unwrap();
        assert_eq!(history.last().unwrap().text, complete.messages[0].text);
        assert_ok!(b.submit(chat_b.id, "zzqx", ResponseMode::Complete).await);
    }

    #[tokio::test]
    async fn test_engine_failure_on_stream_frees_session() {
        let a = assistant(
            FixtureGateway::new(),
            vec![Err(AssistantError::CompletionEngine("down".to_string()))],
        );
        let chat = a.create_session(None, None, None).await.unwrap();

        let assembler = collect(a.submit(chat.id, "zzqx", ResponseMode::Streaming).await.unwrap()).await;
        assert!(assembler.finished_text().is_none());

        let history = a.history(chat.id).await.unwrap();
        assert_eq!(history.last().unwrap().message_type, MessageType::Error);
        let handle = a.session(chat.id).await.unwrap();
        assert!(handle.lock().await.ensure_accepting_input().is_ok());
    }

    #[tokio::test]
    async fn test_session_restored_from_chat_store() {
        let store = ChatStore::in_memory();
        let id = Uuid::new_v4();
        store
            .create_chat(&ChatSummary {
                id,
                title: "old".to_string(),
                wallet_address: Some(WALLET.to_string()),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .save_messages(
                id,
                &[ChatMessage::new(crate::models::Sender::Ai, MessageType::Validators, "pick")],
            )
            .await
            .unwrap();

        let a = Assistant::new(
            Arc::new(FixtureGateway::new()),
            Arc::new(ScriptedEngine::new(vec![])),
            store,
            &LimitConfig::default(),
        );

        let blocked = a.submit(id, "hello", ResponseMode::Complete).await;
        assert!(matches!(blocked, Err(AssistantError::ActionPending(_))));
        assert!(matches!(
            a.history(Uuid::new_v4()).await,
            Err(AssistantError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_idle_session_evicted_and_restored() {
        let a = assistant(FixtureGateway::new(), vec![]);
        let chat = a.create_session(None, Some("token-1".to_string()), None).await.unwrap();
        a.connect_wallet(chat.id, Some(WALLET.to_string())).await.unwrap();
        a.submit(chat.id, "Swap 50 SOL to USDT", ResponseMode::Complete).await.unwrap();

        {
            let handle = a.session(chat.id).await.unwrap();
            let session = handle.lock().await;
            assert_eq!(session.context().auth_token.as_deref(), Some("token-1"));
        }

        assert_eq!(a.evict_idle_sessions(Duration::from_secs(3600)).await.unwrap(), 0);
        assert_eq!(a.evict_idle_sessions(Duration::ZERO).await.unwrap(), 1);
        assert_eq!(a.sessions.len().await, 0);

        // Gate and wallet come back from the chat store.
        let blocked = a.submit(chat.id, "hello", ResponseMode::Complete).await;
        assert!(matches!(blocked, Err(AssistantError::ActionPending(_))));
        let handle = a.session(chat.id).await.unwrap();
        assert_eq!(handle.lock().await.context().wallet(), Some(WALLET));
    }

    #[tokio::test]
    async fn test_in_flight_session_is_not_evicted() {
        let a = assistant(FixtureGateway::new(), vec![]);
        let chat = a.create_session(None, None, None).await.unwrap();
        let handle = a.session(chat.id).await.unwrap();
        let _held = handle.lock().await;

        assert_eq!(a.evict_idle_sessions(Duration::ZERO).await.unwrap(), 0);
        assert_eq!(a.sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_audit_trail_lists_session_runs() {
        let a = assistant(
            FixtureGateway::new(),
            vec![
                Ok(Completion::calls(vec![ToolCall {
                    id: "c1".to_string(),
                    name: "network_metrics".to_string(),
                    arguments: json!({}),
                }])),
                Ok(Completion::text("Solana TVL is about $9.1B.")),
            ],
        );
        let chat = a.create_session(None, None, None).await.unwrap();
        a.submit(chat.id, "hmm tell me something", ResponseMode::Complete).await.unwrap();

        let trail = a.audit_trail(chat.id).await.unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].tool_calls[0].capability, "network_metrics");
        assert!(matches!(
            a.audit_trail(Uuid::new_v4()).await,
            Err(AssistantError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ask_persona_explicit() {
        let a = assistant(FixtureGateway::new(), vec![Ok(Completion::text("Gm"))]);
        let response = a
            .ask_persona(PersonaQuery {
                message: "hi".to_string(),
                persona: Some("venice".to_string()),
                ..Default::default()
            })
            .await;
        assert!(response.success);
        assert_eq!(response.agent, Persona::Venice);
        assert_eq!(response.response, "Gm");
    }
}
