//! SOL burn auction lookups and bids

use super::grammar::parse_round;
use super::{collaborator_failure, require_wallet, HandlerContext, MessageSink, TaskHandler};
use crate::chain::{AuctionInfo, ChainGateway};
use crate::classifier::IntentId;
use crate::models::{BidProposal, ChatMessage, MessagePayload, MessageType, Sender};
use crate::Result;
use std::sync::Arc;

pub const NO_ROUND_TEXT: &str = "❌ No valid Round found in your message.";

fn accepts_bids(auction: &AuctionInfo) -> bool {
    let status = auction.status.to_lowercase();
    auction.round.is_some() && !status.contains("closed") && !status.contains("coming soon")
}

pub struct AuctionHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl AuctionHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for AuctionHandler {
    fn name(&self) -> &'static str {
        "auction"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::GetLatestAuction, IntentId::GetAuction]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        let round = if ctx.intent == IntentId::GetAuction {
            let Some(round) = parse_round(ctx.message) else {
                sink.emit(ChatMessage::error(NO_ROUND_TEXT).with_intent(ctx.intent));
                return Ok(());
            };
            sink.emit(
                ChatMessage::loading(format!("🔍 Fetching SOL Burn Auction {} ...", round))
                    .with_intent(ctx.intent),
            );
            Some(round)
        } else {
            sink.emit(ChatMessage::loading("🔍 Fetching the latest SOL Burn Auction...").with_intent(ctx.intent));
            None
        };

        match self.gateway.auction(round).await {
            Ok(auction) => {
                sink.emit(ChatMessage::ai_text(auction.summary()).with_intent(ctx.intent));
                Ok(())
            }
            Err(e) => collaborator_failure(&ctx, sink, "fetch the auction", e),
        }
    }
}

pub struct PlaceBidHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl PlaceBidHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for PlaceBidHandler {
    fn name(&self) -> &'static str {
        "place_bid"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::PlaceBid]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        if require_wallet(&ctx, sink).is_none() {
            return Ok(());
        }

        sink.emit(ChatMessage::loading("🔍 Checking the current SOL Burn Auction...").with_intent(ctx.intent));

        let auction = match self.gateway.auction(None).await {
            Ok(auction) => auction,
            Err(e) => return collaborator_failure(&ctx, sink, "fetch the auction", e),
        };

        if !accepts_bids(&auction) {
            sink.emit(
                ChatMessage::ai_text(format!("Bidding is not open right now.\n{}", auction.summary()))
                    .with_intent(ctx.intent),
            );
            return Ok(());
        }

        let text = format!(
            "{}\nEnter the amount of SOL you want to bid.",
            auction.summary()
        );
        sink.emit(
            ChatMessage::new(Sender::Ai, MessageType::PlaceBidAmount, text)
                .with_intent(ctx.intent)
                .with_payload(MessagePayload::Bid(BidProposal {
                    round: auction.round,
                    status: auction.status,
                })),
        );
        Ok(())
    }
}
