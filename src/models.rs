//! Core data models for the chain assistant

use crate::chain::{
    NetworkMetrics, ProposalSummary, StakePosition, SwapQuote, TokenMetadata, TokenPrice,
    ValidatorInfo, WalletBalances,
};
use crate::classifier::IntentId;
use crate::persona::Persona;
use crate::session::GateKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Who authored a chat message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
    System,
    Solpilot,
    Sonia,
    Zerion,
    Venice,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
            Sender::System => "system",
            Sender::Solpilot => "solpilot",
            Sender::Sonia => "sonia",
            Sender::Zerion => "zerion",
            Sender::Venice => "venice",
        }
    }
}

impl From<Persona> for Sender {
    fn from(persona: Persona) -> Self {
        match persona {
            Persona::Solpilot => Sender::Solpilot,
            Persona::Sonia => Sender::Sonia,
            Persona::Zerion => Sender::Zerion,
            Persona::Venice => Sender::Venice,
        }
    }
}

/// Closed set of message kinds the client knows how to render
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Loading,
    Error,
    Success,
    Balance,
    Validators,
    Swap,
    SendToken,
    StakeAmount,
    PlaceBidAmount,
    Unstake,
    Metrics,
    Proposals,
    Pie,
    TokenMetadata,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Loading => "loading",
            MessageType::Error => "error",
            MessageType::Success => "success",
            MessageType::Balance => "balance",
            MessageType::Validators => "validators",
            MessageType::Swap => "swap",
            MessageType::SendToken => "send_token",
            MessageType::StakeAmount => "stake_amount",
            MessageType::PlaceBidAmount => "place_bid_amount",
            MessageType::Unstake => "unstake",
            MessageType::Metrics => "metrics",
            MessageType::Proposals => "proposals",
            MessageType::Pie => "pie",
            MessageType::TokenMetadata => "token_metadata",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        serde_json::from_value(Value::String(value.to_string())).ok()
    }

    /// Gating kinds put the session into a pending-action state when they
    /// land as the last history entry.
    pub fn is_gating(&self) -> bool {
        GateKind::from_message_type(*self).is_some()
    }
}

/// A single entry of the chat history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender: Sender,
    pub text: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePayload>,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender: Sender, message_type: MessageType, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            text: text.into(),
            message_type,
            intent: None,
            payload: None,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, MessageType::Text, text)
    }

    pub fn ai_text(text: impl Into<String>) -> Self {
        Self::new(Sender::Ai, MessageType::Text, text)
    }

    pub fn loading(text: impl Into<String>) -> Self {
        Self::new(Sender::Ai, MessageType::Loading, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Sender::Ai, MessageType::Error, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(Sender::Ai, MessageType::Success, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Sender::System, MessageType::Text, text)
    }

    pub fn with_intent(mut self, intent: IntentId) -> Self {
        self.intent = Some(intent);
        self
    }

    pub fn with_payload(mut self, payload: MessagePayload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_sender(mut self, sender: Sender) -> Self {
        self.sender = sender;
        self
    }

    pub fn is_gating(&self) -> bool {
        self.message_type.is_gating()
    }
}

/// Structured data attached to rich messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum MessagePayload {
    Balances(WalletBalances),
    Pie(Vec<PieSlice>),
    Validators(Vec<ValidatorInfo>),
    Swap(SwapProposal),
    Transfer(TransferProposal),
    Stake(StakeProposal),
    Bid(BidProposal),
    StakePositions(Vec<StakePosition>),
    Metrics(NetworkMetrics),
    Proposals(Vec<ProposalSummary>),
    TokenReport(TokenReport),
    Receipt(ExecutionReceipt),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwapProposal {
    pub input: TokenMetadata,
    pub output: TokenMetadata,
    pub amount: f64,
    pub quote: SwapQuote,
}

impl SwapProposal {
    /// Quoted output in whole output-token units
    pub fn estimated_output(&self) -> f64 {
        self.quote.out_amount as f64 / 10f64.powi(self.output.decimals as i32)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransferProposal {
    pub token: TokenMetadata,
    pub amount: f64,
    pub receiver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StakeProposal {
    pub validator: ValidatorInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BidProposal {
    pub round: Option<u64>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub value_usd: f64,
    pub share_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenReport {
    pub symbol: String,
    pub metadata: Option<TokenMetadata>,
    pub price: Option<TokenPrice>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    AwaitingSignature,
    Submitted,
}

/// Outcome of a confirmed pending action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionReceipt {
    pub action: GateKind,
    pub status: ReceiptStatus,
    pub summary: String,
    pub details: Value,
}

/// Uniform result envelope every capability returns to the tool loop
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolOutput {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
}

impl ToolOutput {
    pub fn ok(data: Value, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            error: None,
            message: message.into(),
        }
    }

    pub fn failure(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(error.into()),
            message: message.into(),
        }
    }
}

/// One capability invocation made during a tool-loop run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRecord {
    pub capability: String,
    pub arguments: Value,
    pub result: ToolOutput,
    pub duration_ms: u64,
}

/// Per-session context; only connect / authenticate mutate it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionContext {
    pub wallet_address: Option<String>,
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
    pub history_window: usize,
}

impl SessionContext {
    pub fn new(history_window: usize) -> Self {
        Self {
            wallet_address: None,
            auth_token: None,
            history_window,
        }
    }

    pub fn with_wallet(mut self, wallet: Option<String>) -> Self {
        self.wallet_address = wallet;
        self
    }

    pub fn wallet(&self) -> Option<&str> {
        self.wallet_address.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_wire_names() {
        let msg = ChatMessage::new(Sender::Ai, MessageType::PlaceBidAmount, "bid");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "place_bid_amount");
        assert_eq!(json["sender"], "ai");
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn test_gating_types() {
        let gating = [
            MessageType::Swap,
            MessageType::SendToken,
            MessageType::StakeAmount,
            MessageType::PlaceBidAmount,
            MessageType::Validators,
            MessageType::Unstake,
        ];
        for kind in gating {
            assert!(kind.is_gating(), "{} should gate", kind.as_str());
        }

        for kind in [MessageType::Text, MessageType::Balance, MessageType::Metrics, MessageType::Pie] {
            assert!(!kind.is_gating());
        }
    }

    #[test]
    fn test_message_type_parse_matches_as_str() {
        assert_eq!(MessageType::parse("token_metadata"), Some(MessageType::TokenMetadata));
        assert_eq!(MessageType::parse(MessageType::SendToken.as_str()), Some(MessageType::SendToken));
        assert_eq!(MessageType::parse("nonsense"), None);
    }

    #[test]
    fn test_tool_output_failure_envelope() {
        let out = ToolOutput::failure("timeout", "Failed to fetch balance");
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "timeout");
        assert!(json["data"].is_null());
    }
}
