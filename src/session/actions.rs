//! Confirmed action execution
//!
//! The assistant never signs or submits transactions itself. A confirmed
//! pending action is handed to an [`ActionExecutor`]; the shipped
//! [`WalletHandoffExecutor`] prepares the parameters the user's wallet
//! needs and reports that a signature is awaited.

use super::{ConfirmInput, GateKind};
use crate::chain::{TokenMetadata, LAMPORTS_PER_SOL};
use crate::error::AssistantError;
use crate::models::{ChatMessage, ExecutionReceipt, MessagePayload, ReceiptStatus};
use crate::Result;
use serde_json::json;

/// Everything an executor may need to carry out one pending action
pub struct ActionRequest<'a> {
    pub kind: GateKind,
    pub wallet: &'a str,
    pub pending: &'a ChatMessage,
    pub input: &'a ConfirmInput,
}

#[async_trait::async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, request: ActionRequest<'_>) -> Result<ExecutionReceipt>;
}

pub struct WalletHandoffExecutor;

#[async_trait::async_trait]
impl ActionExecutor for WalletHandoffExecutor {
    async fn execute(&self, request: ActionRequest<'_>) -> Result<ExecutionReceipt> {
        let (summary, details) = match (&request.kind, &request.pending.payload) {
            (GateKind::Swap, Some(MessagePayload::Swap(swap))) => (
                format!(
                    "Swap of {} {} to {} is ready to sign in your wallet.",
                    swap.amount, swap.input.symbol, swap.output.symbol
                ),
                json!({
                    "owner": request.wallet,
                    "input_mint": swap.input.mint,
                    "output_mint": swap.output.mint,
                    "in_amount": swap.quote.in_amount,
                    "out_amount": swap.quote.out_amount,
                    "route": swap.quote.route_label,
                    "slippage_bps": swap.quote.slippage_bps,
                }),
            ),
            (GateKind::SendToken, Some(MessagePayload::Transfer(transfer))) => (
                format!(
                    "Transfer of {} {} to {} is ready to sign in your wallet.",
                    transfer.amount, transfer.token.symbol, transfer.receiver
                ),
                json!({
                    "from": request.wallet,
                    "to": transfer.receiver,
                    "mint": transfer.token.mint,
                    "native": transfer.token.is_native,
                    "base_units": transfer.token.to_base_units(transfer.amount),
                }),
            ),
            (GateKind::StakeAmount, Some(MessagePayload::Stake(stake))) => {
                let amount = required_amount(request.input)?;
                (
                    format!(
                        "Stake of {} SOL with validator {} is ready to sign in your wallet.",
                        amount,
                        stake.validator.moniker()
                    ),
                    json!({
                        "owner": request.wallet,
                        "vote_account": stake.validator.vote_account,
                        "lamports": (amount * LAMPORTS_PER_SOL) as u64,
                    }),
                )
            }
            (GateKind::PlaceBidAmount, Some(MessagePayload::Bid(bid))) => {
                let amount = required_amount(request.input)?;
                let round = bid
                    .round
                    .map(|r| format!("round {}", r))
                    .unwrap_or_else(|| "the current round".to_string());
                (
                    format!("Bid of {} SOL for {} is ready to sign in your wallet.", amount, round),
                    json!({
                        "bidder": request.wallet,
                        "round": bid.round,
                        "lamports": TokenMetadata::sol().to_base_units(amount),
                    }),
                )
            }
            (GateKind::Unstake, Some(MessagePayload::StakePositions(_))) => {
                let account = request.input.stake_account.as_deref().ok_or_else(|| {
                    AssistantError::InvalidRequest("no stake account selected".to_string())
                })?;
                (
                    format!("Unstake of {} is ready to sign in your wallet.", account),
                    json!({
                        "owner": request.wallet,
                        "stake_account": account,
                    }),
                )
            }
            (kind, _) => {
                return Err(AssistantError::InvalidRequest(format!(
                    "pending {} message carries no matching payload",
                    kind
                )))
            }
        };

        Ok(ExecutionReceipt {
            action: request.kind,
            status: ReceiptStatus::AwaitingSignature,
            summary,
            details,
        })
    }
}

fn required_amount(input: &ConfirmInput) -> Result<f64> {
    input
        .amount
        .filter(|a| a.is_finite() && *a > 0.0)
        .ok_or_else(|| AssistantError::InvalidRequest("amount must be positive".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BidProposal, MessageType, Sender};

    #[tokio::test]
    async fn test_bid_receipt_carries_lamports() {
        let pending = ChatMessage::new(Sender::Ai, MessageType::PlaceBidAmount, "bid")
            .with_payload(MessagePayload::Bid(BidProposal {
                round: Some(7),
                status: "Open".to_string(),
            }));
        let input = ConfirmInput {
            amount: Some(1.5),
            ..Default::default()
        };

        let receipt = WalletHandoffExecutor
            .execute(ActionRequest {
                kind: GateKind::PlaceBidAmount,
                wallet: "wallet",
                pending: &pending,
                input: &input,
            })
            .await
            .unwrap();

        assert_eq!(receipt.details["lamports"], 1_500_000_000u64);
        assert_eq!(receipt.details["round"], 7);
        assert!(receipt.summary.contains("round 7"));
    }

    #[tokio::test]
    async fn test_payload_mismatch_is_rejected() {
        let pending = ChatMessage::new(Sender::Ai, MessageType::Swap, "swap");
        let result = WalletHandoffExecutor
            .execute(ActionRequest {
                kind: GateKind::Swap,
                wallet: "wallet",
                pending: &pending,
                input: &ConfirmInput::default(),
            })
            .await;
        assert!(matches!(result, Err(AssistantError::InvalidRequest(_))));
    }
}
