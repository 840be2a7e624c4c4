//! Governance, news, transaction lookups and out-of-domain refusals

use super::grammar::extract_signature;
use super::{collaborator_failure, HandlerContext, MessageSink, TaskHandler};
use crate::chain::{ChainGateway, LAMPORTS_PER_SOL};
use crate::classifier::IntentId;
use crate::models::{ChatMessage, MessagePayload, MessageType, Sender};
use crate::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const FORBIDDEN_TOPICS_TEXT: &str = "🚫 I can only help with Solana: wallets, tokens, swaps, staking, auctions, governance and ecosystem news. Please ask me something about Solana.";
pub const INVALID_SIGNATURE_TEXT: &str =
    "❌ Invalid transaction signature. Please provide a valid Solana transaction signature.";
pub const TX_NOT_FOUND_TEXT: &str = "❌ Transaction not found. Please verify the signature and try again.";

const PROPOSAL_LIMIT: usize = 5;

pub struct GovernanceHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl GovernanceHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for GovernanceHandler {
    fn name(&self) -> &'static str {
        "governance"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::GetGovernanceProposals]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        sink.emit(ChatMessage::loading("🔍 Fetching Solana governance proposals...").with_intent(ctx.intent));

        let proposals = match self.gateway.governance_proposals(PROPOSAL_LIMIT).await {
            Ok(proposals) => proposals,
            Err(e) => return collaborator_failure(&ctx, sink, "fetch governance proposals", e),
        };

        if proposals.is_empty() {
            sink.emit(ChatMessage::ai_text("No governance proposals found right now.").with_intent(ctx.intent));
            return Ok(());
        }

        let mut text = String::from("🗳️ Recent Solana governance proposals:");
        for p in &proposals {
            text.push_str(&format!("\n- {} [{}]: {}", p.title, p.status, p.summary));
        }

        sink.emit(
            ChatMessage::new(Sender::Ai, MessageType::Proposals, text)
                .with_intent(ctx.intent)
                .with_payload(MessagePayload::Proposals(proposals)),
        );
        Ok(())
    }
}

pub struct NewsHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl NewsHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for NewsHandler {
    fn name(&self) -> &'static str {
        "news"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::SearchSolanaNews]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        sink.emit(
            ChatMessage::loading("Calling Venice to gather the latest Solana updates...")
                .with_sender(Sender::Venice)
                .with_intent(ctx.intent),
        );

        let digest = match self.gateway.search_news(ctx.message).await {
            Ok(digest) => digest,
            Err(e) => return collaborator_failure(&ctx, sink, "gather Solana news", e),
        };

        let mut text = digest.summary.trim().to_string();
        if !digest.sources.is_empty() {
            text.push_str("\n\nSources:");
            for source in &digest.sources {
                text.push_str(&format!("\n- {}", source));
            }
        }

        sink.emit(
            ChatMessage::new(Sender::Venice, MessageType::Text, text).with_intent(ctx.intent),
        );
        Ok(())
    }
}

pub struct TransactionSearchHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl TransactionSearchHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for TransactionSearchHandler {
    fn name(&self) -> &'static str {
        "tx_search"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::TxSearch]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        let Some(signature) = extract_signature(ctx.message) else {
            sink.emit(ChatMessage::error(INVALID_SIGNATURE_TEXT).with_intent(ctx.intent));
            return Ok(());
        };

        sink.emit(ChatMessage::loading("🔍 Looking up the transaction...").with_intent(ctx.intent));

        let tx = match self.gateway.transaction(&signature).await {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                sink.emit(ChatMessage::error(TX_NOT_FOUND_TEXT).with_intent(ctx.intent));
                return Ok(());
            }
            Err(e) => return collaborator_failure(&ctx, sink, "look up the transaction", e),
        };

        let block_time = tx
            .block_time
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "Unknown".to_string());

        let text = format!(
            "🔎 Transaction {}\nStatus: {}\nSlot: {}\nTime: {}\nFee: {:.6} SOL\n{}",
            tx.signature,
            if tx.succeeded { "✅ Success" } else { "❌ Failed" },
            tx.slot,
            block_time,
            tx.fee_lamports as f64 / LAMPORTS_PER_SOL,
            tx.explorer_url
        );
        sink.emit(ChatMessage::ai_text(text).with_intent(ctx.intent));
        Ok(())
    }
}

pub struct ForbiddenTopicsHandler;

#[async_trait::async_trait]
impl TaskHandler for ForbiddenTopicsHandler {
    fn name(&self) -> &'static str {
        "forbidden_topics"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::ForbiddenTopics]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        sink.emit(ChatMessage::ai_text(FORBIDDEN_TOPICS_TEXT).with_intent(ctx.intent));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixtureGateway, KNOWN_SIGNATURE};

    async fn run<H: TaskHandler>(handler: H, intent: IntentId, message: &str) -> Vec<ChatMessage> {
        let mut sink = Vec::new();
        handler
            .handle(
                HandlerContext {
                    intent,
                    message,
                    history: &[],
                    wallet: None,
                },
                &mut sink,
            )
            .await
            .unwrap();
        sink
    }

    #[tokio::test]
    async fn test_tx_lookup_with_explorer_link() {
        let message = format!("find transaction {}", KNOWN_SIGNATURE);
        let sink = run(
            TransactionSearchHandler::new(Arc::new(FixtureGateway::new())),
            IntentId::TxSearch,
            &message,
        )
        .await;

        let text = &sink.last().unwrap().text;
        assert!(text.contains("✅ Success"));
        assert!(text.contains("Fee: 0.000005 SOL"));
        assert!(text.contains("https://explorer.solana.com/tx/"));
    }

    #[tokio::test]
    async fn test_tx_lookup_without_signature() {
        let gateway = Arc::new(FixtureGateway::new());
        let sink = run(TransactionSearchHandler::new(gateway.clone()), IntentId::TxSearch, "find my tx").await;
        assert_eq!(sink[0].text, INVALID_SIGNATURE_TEXT);
        assert_eq!(gateway.calls("transaction"), 0);
    }

    #[tokio::test]
    async fn test_news_comes_from_venice() {
        let sink = run(
            NewsHandler::new(Arc::new(FixtureGateway::new())),
            IntentId::SearchSolanaNews,
            "latest Solana updates",
        )
        .await;

        let news = sink.last().unwrap();
        assert_eq!(news.sender, Sender::Venice);
        assert!(news.text.contains("Sources:"));
    }

    #[tokio::test]
    async fn test_governance_proposals_message() {
        let sink = run(
            GovernanceHandler::new(Arc::new(FixtureGateway::new())),
            IntentId::GetGovernanceProposals,
            "governance proposals",
        )
        .await;

        let message = sink.last().unwrap();
        assert_eq!(message.message_type, MessageType::Proposals);
        assert!(message.text.contains("Solana governance proposals coming soon [Pending Integration]"));
        match &message.payload {
            Some(MessagePayload::Proposals(proposals)) => {
                assert_eq!(proposals.len(), 1);
                assert_eq!(proposals[0].status, "Pending Integration");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_forbidden_topics_refusal() {
        let sink = run(ForbiddenTopicsHandler, IntentId::ForbiddenTopics, "write me a python script").await;
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].text, FORBIDDEN_TOPICS_TEXT);
    }
}
