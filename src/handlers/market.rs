//! Prices, token reports and network metrics

use super::grammar::extract_ticker;
use super::{collaborator_failure, HandlerContext, MessageSink, TaskHandler};
use crate::chain::{ChainGateway, TokenPrice};
use crate::classifier::IntentId;
use crate::models::{ChatMessage, MessagePayload, MessageType, Sender, TokenReport};
use crate::Result;
use std::sync::Arc;
use tracing::warn;

pub const NO_TICKER_TEXT: &str = "❌ Token ticker not detected. Please spell it as SOL, JUP, BONK, etc.";

const STOP_WORDS: &[&str] = &[
    "what", "whats", "is", "the", "of", "price", "current", "currently", "how", "much", "today",
    "now", "token", "worth", "value", "usd", "in", "for", "me", "show", "check", "tell", "get",
    "a", "an", "please", "right", "coin", "about", "analyze", "analyse", "analysis", "doing",
];

/// Ticker from the message: an upper-case word first, else the last
/// non-filler word
pub fn symbol_from_message(message: &str) -> Option<String> {
    if let Some(ticker) = extract_ticker(message) {
        return Some(ticker);
    }

    message
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '$')
        .map(|w| w.trim_start_matches('$'))
        .filter(|w| (2..=10).contains(&w.len()) && w.chars().all(|c| c.is_ascii_alphanumeric()))
        .filter(|w| !STOP_WORDS.contains(&w.to_lowercase().as_str()))
        .last()
        .map(str::to_uppercase)
}

fn price_line(price: &TokenPrice) -> String {
    let mut line = format!("💲 {} is trading at ${:.6} USD", price.symbol, price.usd);
    if let Some(change) = price.change_24h_pct {
        line.push_str(&format!(" ({:+.2}% 24h)", change));
    }
    line
}

pub struct PriceHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl PriceHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for PriceHandler {
    fn name(&self) -> &'static str {
        "price"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::GetPrice]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        let Some(symbol) = symbol_from_message(ctx.message) else {
            sink.emit(ChatMessage::error(NO_TICKER_TEXT).with_intent(ctx.intent));
            return Ok(());
        };

        sink.emit(ChatMessage::loading(format!("🔍 Fetching the {} price...", symbol)).with_intent(ctx.intent));

        match self.gateway.token_price(&symbol).await {
            Ok(Some(price)) => sink.emit(ChatMessage::ai_text(price_line(&price)).with_intent(ctx.intent)),
            Ok(None) => sink.emit(
                ChatMessage::error(format!("❌ No price found for {}.", symbol)).with_intent(ctx.intent),
            ),
            Err(e) => return collaborator_failure(&ctx, sink, "fetch the price", e),
        }
        Ok(())
    }
}

pub struct TokenAnalysisHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl TokenAnalysisHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for TokenAnalysisHandler {
    fn name(&self) -> &'static str {
        "token_analysis"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::AnalyzeToken]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        let Some(symbol) = extract_ticker(ctx.message) else {
            sink.emit(ChatMessage::error(NO_TICKER_TEXT).with_intent(ctx.intent));
            return Ok(());
        };

        sink.emit(ChatMessage::loading("Taking a quick look at that Solana token...").with_intent(ctx.intent));

        let metadata = match self.gateway.token_metadata(&symbol).await {
            Ok(metadata) => metadata,
            Err(e) => return collaborator_failure(&ctx, sink, "look up the token", e),
        };
        let price = self.gateway.token_price(&symbol).await.unwrap_or_else(|e| {
            warn!(symbol = %symbol, error = %e, "Price unavailable for token report");
            None
        });

        if metadata.is_none() && price.is_none() {
            sink.emit(
                ChatMessage::error(format!("❌ I couldn't find any data for {}.", symbol))
                    .with_intent(ctx.intent),
            );
            return Ok(());
        }

        let mut text = format!("📈 Token report for {}", symbol);
        if let Some(meta) = &metadata {
            text.push_str(&format!("\nName: {}\nMint: {}\nDecimals: {}", meta.name, meta.mint, meta.decimals));
        }
        match &price {
            Some(price) => text.push_str(&format!("\n{}", price_line(price))),
            None => text.push_str("\nPrice: unavailable right now"),
        }

        sink.emit(
            ChatMessage::new(Sender::Ai, MessageType::TokenMetadata, text)
                .with_intent(ctx.intent)
                .with_payload(MessagePayload::TokenReport(TokenReport {
                    symbol,
                    metadata,
                    price,
                })),
        );
        Ok(())
    }
}

pub struct MetricsHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl MetricsHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for MetricsHandler {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::GetMetrics]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        sink.emit(
            ChatMessage::loading("Checking current Solana protocol TVLs from DefiLlama...")
                .with_intent(ctx.intent),
        );

        let metrics = match self.gateway.network_metrics().await {
            Ok(metrics) => metrics,
            Err(e) => {
                warn!(error = %e, "Network metrics unavailable");
                sink.emit(
                    ChatMessage::error(
                        "Hmm, maybe there is a problem with Defillama endpoints currently. Please try again later.",
                    )
                    .with_intent(ctx.intent),
                );
                return Ok(());
            }
        };

        let mut text = format!("📊 {} TVL: ${:.2}B", metrics.chain, metrics.tvl_usd / 1e9);
        for (i, protocol) in metrics.top_protocols.iter().enumerate() {
            text.push_str(&format!(
                "\n{}. {} ({}) ${:.2}M",
                i + 1,
                protocol.name,
                protocol.category.as_deref().unwrap_or("Other"),
                protocol.tvl_usd / 1e6
            ));
        }

        sink.emit(
            ChatMessage::new(Sender::Ai, MessageType::Metrics, text)
                .with_intent(ctx.intent)
                .with_payload(MessagePayload::Metrics(metrics)),
        );
        Ok(())
    }
}
