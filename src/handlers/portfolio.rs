//! Wallet balance handlers

use super::grammar::extract_address;
use super::{collaborator_failure, require_wallet, HandlerContext, MessageSink, TaskHandler};
use crate::chain::{ChainGateway, WalletBalances};
use crate::classifier::IntentId;
use crate::models::{ChatMessage, MessagePayload, MessageType, PieSlice, Sender};
use crate::Result;
use std::sync::Arc;

fn balance_lines(balances: &WalletBalances) -> String {
    let mut out = String::new();
    for token in balances.tokens.iter().filter(|t| t.amount > 0.0) {
        match token.usd_value {
            Some(usd) => out.push_str(&format!("- {} {} (${:.2})\n", token.amount, token.symbol, usd)),
            None => out.push_str(&format!("- {} {}\n", token.amount, token.symbol)),
        }
    }
    out.push_str(&format!("Total: ${:.2}", balances.total_usd()));
    out
}

/// USD distribution across holdings, largest first; unpriced tokens are left out
pub fn pie_slices(balances: &WalletBalances) -> Vec<PieSlice> {
    let total = balances.total_usd();
    if total <= 0.0 {
        return Vec::new();
    }

    let mut slices: Vec<PieSlice> = balances
        .tokens
        .iter()
        .filter_map(|t| {
            let usd = t.usd_value.filter(|v| *v > 0.0)?;
            Some(PieSlice {
                label: t.symbol.clone(),
                value_usd: usd,
                share_pct: usd / total * 100.0,
            })
        })
        .collect();
    slices.sort_by(|a, b| b.value_usd.total_cmp(&a.value_usd));
    slices
}

pub struct MyPortfolioHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl MyPortfolioHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for MyPortfolioHandler {
    fn name(&self) -> &'static str {
        "my_portfolio"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::FetchMyPortfolio]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        let Some(wallet) = require_wallet(&ctx, sink) else {
            return Ok(());
        };

        sink.emit(ChatMessage::loading("🔍 Fetching your Solana token balances...").with_intent(ctx.intent));

        let balances = match self.gateway.balances(wallet).await {
            Ok(balances) => balances,
            Err(e) => return collaborator_failure(&ctx, sink, "fetch your balances", e),
        };

        if balances.is_empty() {
            sink.emit(ChatMessage::error("❌ No balances found in your wallet.").with_intent(ctx.intent));
            return Ok(());
        }

        sink.emit(
            ChatMessage::new(
                Sender::Ai,
                MessageType::Balance,
                format!("💰 Your wallet balances:\n{}", balance_lines(&balances)),
            )
            .with_intent(ctx.intent)
            .with_payload(MessagePayload::Balances(balances)),
        );
        Ok(())
    }
}

pub struct UserPortfolioHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl UserPortfolioHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for UserPortfolioHandler {
    fn name(&self) -> &'static str {
        "user_portfolio"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::FetchUserPortfolio]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        let Some(address) = extract_address(ctx.message).or_else(|| ctx.wallet.map(str::to_string))
        else {
            sink.emit(
                ChatMessage::error(
                    "❌ Please provide a valid Solana wallet address (or connect your wallet).",
                )
                .with_intent(ctx.intent),
            );
            return Ok(());
        };

        sink.emit(ChatMessage::loading("🔍 Fetching wallet balances on Solana...").with_intent(ctx.intent));

        let balances = match self.gateway.balances(&address).await {
            Ok(balances) => balances,
            Err(e) => return collaborator_failure(&ctx, sink, "fetch wallet balances", e),
        };

        if balances.is_empty() {
            sink.emit(ChatMessage::error("❌ No balances found for this Solana wallet.").with_intent(ctx.intent));
            return Ok(());
        }

        let slices = pie_slices(&balances);
        sink.emit(
            ChatMessage::new(
                Sender::Ai,
                MessageType::Balance,
                format!("💰 Balances for {}:\n{}", address, balance_lines(&balances)),
            )
            .with_intent(ctx.intent)
            .with_payload(MessagePayload::Balances(balances)),
        );

        if !slices.is_empty() {
            sink.emit(
                ChatMessage::new(Sender::Ai, MessageType::Pie, "📊 Portfolio distribution by USD value")
                    .with_intent(ctx.intent)
                    .with_payload(MessagePayload::Pie(slices)),
            );
        }
        Ok(())
    }
}
