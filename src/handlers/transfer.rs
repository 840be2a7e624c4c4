//! Token transfer proposals

use super::grammar::{parse_transfer, ParseFailure};
use super::{collaborator_failure, require_wallet, HandlerContext, MessageSink, TaskHandler};
use crate::chain::ChainGateway;
use crate::classifier::IntentId;
use crate::models::{ChatMessage, MessagePayload, MessageType, Sender, TransferProposal};
use crate::Result;
use std::sync::Arc;
use tracing::debug;

pub const SELF_TRANSFER_TEXT: &str = "❌ You can't send tokens to yourself.";

pub struct TransferHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl TransferHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for TransferHandler {
    fn name(&self) -> &'static str {
        "transfer"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::SendToken]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        let Some(wallet) = require_wallet(&ctx, sink) else {
            return Ok(());
        };

        let request = match parse_transfer(ctx.message) {
            Ok(request) => request,
            Err(reason) => {
                debug!(reason = %reason, "Transfer prompt not understood");
                sink.emit(ChatMessage::error(reason.remediation()).with_intent(ctx.intent));
                return Ok(());
            }
        };

        if request.receiver == wallet {
            sink.emit(ChatMessage::error(SELF_TRANSFER_TEXT).with_intent(ctx.intent));
            return Ok(());
        }

        let token = match self.gateway.token_metadata(&request.symbol).await {
            Ok(Some(token)) => token,
            Ok(None) => {
                let reason = ParseFailure::TokenUnknown(request.symbol);
                sink.emit(ChatMessage::error(reason.remediation()).with_intent(ctx.intent));
                return Ok(());
            }
            Err(e) => return collaborator_failure(&ctx, sink, "look up the token", e),
        };

        sink.emit(
            ChatMessage::new(
                Sender::Ai,
                MessageType::SendToken,
                format!(
                    "You want to send {} {} to {}. Please confirm this transaction.",
                    request.amount, token.symbol, request.receiver
                ),
            )
            .with_intent(ctx.intent)
            .with_payload(MessagePayload::Transfer(TransferProposal {
                token,
                amount: request.amount,
                receiver: request.receiver,
            })),
        );
        Ok(())
    }
}
