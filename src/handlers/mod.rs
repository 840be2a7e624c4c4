//! Task handlers
//!
//! Deterministic responders, one per intent. A handler composes collaborator
//! calls into chat messages pushed to a [`MessageSink`]. Precondition
//! failures become specific error messages; only unexpected failures are
//! returned as `Err`.

pub mod auction;
pub mod dialogue;
pub mod grammar;
pub mod info;
pub mod market;
pub mod portfolio;
pub mod staking;
pub mod swap;
pub mod transfer;

use crate::chain::ChainGateway;
use crate::classifier::IntentId;
use crate::completion::CompletionEngine;
use crate::error::AssistantError;
use crate::models::ChatMessage;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub const CONNECT_WALLET_TEXT: &str = "❌ Please connect your Solana wallet first.";

/// Everything a handler may read about the current request
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    pub intent: IntentId,
    pub message: &'a str,
    /// Messages before the current one
    pub history: &'a [ChatMessage],
    pub wallet: Option<&'a str>,
}

/// Where handlers put their output
pub trait MessageSink: Send {
    fn emit(&mut self, message: ChatMessage);
}

impl MessageSink for Vec<ChatMessage> {
    fn emit(&mut self, message: ChatMessage) {
        self.push(message);
    }
}

#[async_trait::async_trait]
pub trait TaskHandler: Send + Sync {
    fn name(&self) -> &'static str;
    /// Intents this handler answers
    fn intents(&self) -> &'static [IntentId];
    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()>;
}

/// Outcome of looking an intent up
#[derive(Clone)]
pub enum Route {
    Handler(Arc<dyn TaskHandler>),
    Persona,
}

pub struct HandlerRegistry {
    handlers: HashMap<IntentId, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) {
        for intent in handler.intents() {
            if self.handlers.insert(*intent, handler.clone()).is_some() {
                warn!(intent = %intent, handler = handler.name(), "Intent handler replaced");
            }
        }
    }

    /// Intents without a handler go to a persona
    pub fn route(&self, intent: IntentId) -> Route {
        match self.handlers.get(&intent) {
            Some(handler) => Route::Handler(handler.clone()),
            None => Route::Persona,
        }
    }

    pub fn handles(&self, intent: IntentId) -> bool {
        self.handlers.contains_key(&intent)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with every built-in handler
pub fn create_default_handlers(
    gateway: Arc<dyn ChainGateway>,
    engine: Arc<dyn CompletionEngine>,
) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(portfolio::MyPortfolioHandler::new(gateway.clone())));
    registry.register(Arc::new(portfolio::UserPortfolioHandler::new(gateway.clone())));
    registry.register(Arc::new(transfer::TransferHandler::new(gateway.clone())));
    registry.register(Arc::new(swap::SwapHandler::new(gateway.clone())));
    registry.register(Arc::new(staking::StakeHandler::new(gateway.clone())));
    registry.register(Arc::new(staking::UnstakeHandler::new(gateway.clone())));
    registry.register(Arc::new(auction::AuctionHandler::new(gateway.clone())));
    registry.register(Arc::new(auction::PlaceBidHandler::new(gateway.clone())));
    registry.register(Arc::new(market::PriceHandler::new(gateway.clone())));
    registry.register(Arc::new(market::TokenAnalysisHandler::new(gateway.clone())));
    registry.register(Arc::new(market::MetricsHandler::new(gateway.clone())));
    registry.register(Arc::new(info::GovernanceHandler::new(gateway.clone())));
    registry.register(Arc::new(info::NewsHandler::new(gateway.clone())));
    registry.register(Arc::new(info::TransactionSearchHandler::new(gateway)));
    registry.register(Arc::new(info::ForbiddenTopicsHandler));
    registry.register(Arc::new(dialogue::DialogueHandler::new(engine)));
    registry
}

/// Emit the wallet prompt and report whether a wallet is connected
pub(crate) fn require_wallet<'a>(
    ctx: &HandlerContext<'a>,
    sink: &mut dyn MessageSink,
) -> Option<&'a str> {
    if ctx.wallet.is_none() {
        sink.emit(ChatMessage::error(CONNECT_WALLET_TEXT).with_intent(ctx.intent));
    }
    ctx.wallet
}

/// Turn a collaborator error into one error message; anything else propagates
pub(crate) fn collaborator_failure(
    ctx: &HandlerContext<'_>,
    sink: &mut dyn MessageSink,
    what: &str,
    error: AssistantError,
) -> Result<()> {
    match error {
        AssistantError::Collaborator(_) | AssistantError::Http(_) => {
            warn!(intent = %ctx.intent, error = %error, "{} failed", what);
            sink.emit(
                ChatMessage::error(format!("❌ Failed to {}. Please try again later.", what))
                    .with_intent(ctx.intent),
            );
            Ok(())
        }
        other => Err(other),
    }
}
