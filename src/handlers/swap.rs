//! Swap quotes

use super::grammar::{parse_swap, ParseFailure};
use super::{collaborator_failure, HandlerContext, MessageSink, TaskHandler};
use crate::chain::{ChainGateway, SwapQuoteRequest, DEFAULT_SLIPPAGE_BPS};
use crate::classifier::IntentId;
use crate::models::{ChatMessage, MessagePayload, MessageType, Sender, SwapProposal};
use crate::Result;
use std::sync::Arc;

pub const SWAP_EXAMPLE_TEXT: &str =
    "❌ I couldn't read that swap. Please use a format like: 'Swap 1 SOL to USDC'.";

pub struct SwapHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl SwapHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for SwapHandler {
    fn name(&self) -> &'static str {
        "swap"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::SwapToken]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        let Ok(request) = parse_swap(ctx.message) else {
            sink.emit(ChatMessage::error(SWAP_EXAMPLE_TEXT).with_intent(ctx.intent));
            return Ok(());
        };

        if request.from == request.to {
            sink.emit(
                ChatMessage::error("❌ Input and output tokens must be different.").with_intent(ctx.intent),
            );
            return Ok(());
        }

        let mut resolved = Vec::with_capacity(2);
        for symbol in [&request.from, &request.to] {
            match self.gateway.token_metadata(symbol).await {
                Ok(Some(token)) => resolved.push(token),
                Ok(None) => {
                    let reason = ParseFailure::TokenUnknown(symbol.clone());
                    sink.emit(ChatMessage::error(reason.remediation()).with_intent(ctx.intent));
                    return Ok(());
                }
                Err(e) => return collaborator_failure(&ctx, sink, "look up the tokens", e),
            }
        }
        let output = resolved.pop();
        let input = resolved.pop();
        let (Some(input), Some(output)) = (input, output) else {
            return Ok(());
        };

        sink.emit(
            ChatMessage::loading(format!(
                "🔍 Finding the best route for {} {} → {}...",
                request.amount, input.symbol, output.symbol
            ))
            .with_intent(ctx.intent),
        );

        let quote_request = SwapQuoteRequest {
            input_mint: input.mint.clone(),
            output_mint: output.mint.clone(),
            amount: input.to_base_units(request.amount),
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
        };
        let quote = match self.gateway.swap_quote(&quote_request).await {
            Ok(quote) => quote,
            Err(e) => return collaborator_failure(&ctx, sink, "fetch a swap quote", e),
        };

        let proposal = SwapProposal {
            input,
            output,
            amount: request.amount,
            quote,
        };
        let text = format!(
            "Route: {} | Amount: {} {} ≈ {:.6} {}",
            proposal.quote.route_label,
            proposal.amount,
            proposal.input.symbol,
            proposal.estimated_output(),
            proposal.output.symbol
        );

        sink.emit(
            ChatMessage::new(Sender::Ai, MessageType::Swap, text)
                .with_intent(ctx.intent)
                .with_payload(MessagePayload::Swap(proposal)),
        );
        Ok(())
    }
}
