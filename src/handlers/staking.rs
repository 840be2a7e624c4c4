//! Stake and unstake entry points
//!
//! Both end in a gating message; the actual delegation or withdrawal is
//! prepared only on confirm.

use super::{collaborator_failure, require_wallet, HandlerContext, MessageSink, TaskHandler};
use crate::chain::ChainGateway;
use crate::classifier::IntentId;
use crate::models::{ChatMessage, MessagePayload, MessageType, Sender};
use crate::Result;
use std::sync::Arc;

const VALIDATOR_LIMIT: usize = 10;

pub struct StakeHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl StakeHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for StakeHandler {
    fn name(&self) -> &'static str {
        "stake"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::StakeSol]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        if require_wallet(&ctx, sink).is_none() {
            return Ok(());
        }

        sink.emit(ChatMessage::loading("🔍 Fetching current Solana validators...").with_intent(ctx.intent));

        let validators = match self.gateway.validators(VALIDATOR_LIMIT).await {
            Ok(list) => list.into_iter().filter(|v| !v.delinquent).collect::<Vec<_>>(),
            Err(e) => return collaborator_failure(&ctx, sink, "fetch validators", e),
        };

        if validators.is_empty() {
            sink.emit(ChatMessage::error("⚠️ No validators found on Solana right now.").with_intent(ctx.intent));
            return Ok(());
        }

        let mut text = String::from("Select a validator to stake your SOL with:\n");
        for (i, v) in validators.iter().enumerate() {
            text.push_str(&format!(
                "{}. {} | commission {}% | stake {:.0} SOL\n",
                i + 1,
                v.moniker(),
                v.commission,
                v.activated_stake_sol
            ));
        }

        sink.emit(
            ChatMessage::new(Sender::Ai, MessageType::Validators, text.trim_end())
                .with_intent(ctx.intent)
                .with_payload(MessagePayload::Validators(validators)),
        );
        Ok(())
    }
}

pub struct UnstakeHandler {
    gateway: Arc<dyn ChainGateway>,
}

impl UnstakeHandler {
    pub fn new(gateway: Arc<dyn ChainGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait::async_trait]
impl TaskHandler for UnstakeHandler {
    fn name(&self) -> &'static str {
        "unstake"
    }

    fn intents(&self) -> &'static [IntentId] {
        &[IntentId::UnstakeSol]
    }

    async fn handle(&self, ctx: HandlerContext<'_>, sink: &mut dyn MessageSink) -> Result<()> {
        let Some(wallet) = require_wallet(&ctx, sink) else {
            return Ok(());
        };

        sink.emit(ChatMessage::loading("🔍 Gathering your Solana staking positions...").with_intent(ctx.intent));

        let positions = match self.gateway.stake_positions(wallet).await {
            Ok(positions) => positions,
            Err(e) => return collaborator_failure(&ctx, sink, "fetch your stake accounts", e),
        };

        if positions.is_empty() {
            sink.emit(
                ChatMessage::ai_text("It looks like you do not have any staked SOL positions right now.")
                    .with_intent(ctx.intent),
            );
            return Ok(());
        }

        sink.emit(
            ChatMessage::new(
                Sender::Ai,
                MessageType::Unstake,
                "Here are your current Solana staking positions.",
            )
            .with_intent(ctx.intent)
            .with_payload(MessagePayload::StakePositions(positions)),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixtureGateway, STAKE_ACCOUNT, VALIDATOR_A, WALLET};

    fn ctx(intent: IntentId, wallet: Option<&str>) -> HandlerContext<'_> {
        HandlerContext {
            intent,
            message: "stake",
            history: &[],
            wallet,
        }
    }

    #[tokio::test]
    async fn test_stake_lists_validators_as_gate() {
        let mut sink = Vec::new();
        StakeHandler::new(Arc::new(FixtureGateway::new()))
            .handle(ctx(IntentId::StakeSol, Some(WALLET)), &mut sink)
            .await
            .unwrap();

        let gate = sink.last().unwrap();
        assert_eq!(gate.message_type, MessageType::Validators);
        match &gate.payload {
            Some(MessagePayload::Validators(list)) => assert_eq!(list[0].vote_account, VALIDATOR_A),
            other => panic!("expected validators, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stake_without_wallet_skips_lookup() {
        let gateway = Arc::new(FixtureGateway::new());
        let mut sink = Vec::new();
        StakeHandler::new(gateway.clone())
            .handle(ctx(IntentId::StakeSol, None), &mut sink)
            .await
            .unwrap();
        assert_eq!(gateway.calls("validators"), 0);
        assert_eq!(sink[0].message_type, MessageType::Error);
    }

    #[tokio::test]
    async fn test_unstake_lists_positions() {
        let mut sink = Vec::new();
        UnstakeHandler::new(Arc::new(FixtureGateway::new()))
            .handle(ctx(IntentId::UnstakeSol, Some(WALLET)), &mut sink)
            .await
            .unwrap();

        let gate = sink.last().unwrap();
        assert_eq!(gate.message_type, MessageType::Unstake);
        match &gate.payload {
            Some(MessagePayload::StakePositions(list)) => assert_eq!(list[0].stake_account, STAKE_ACCOUNT),
            other => panic!("expected positions, got {:?}", other),
        }
    }
}
