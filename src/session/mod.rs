//! Per-session pending-action gate
//!
//! A session is either free or gated on exactly one pending action. The
//! gate is an explicit state value; it changes only through [`Session::record`]
//! (a gating message lands), [`Session::confirm`] and [`Session::exit`].

pub mod actions;

use crate::chain::{StakePosition, ValidatorInfo};
use crate::error::AssistantError;
use crate::memory::ChatHistory;
use crate::models::{
    ChatMessage, MessagePayload, MessageType, Sender, SessionContext, StakeProposal,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};
use uuid::Uuid;

pub use actions::{ActionExecutor, ActionRequest, WalletHandoffExecutor};

pub const CLOSED_MESSAGE: &str = "Tool closed successfully.";
pub const CONNECT_WALLET_MESSAGE: &str = "❌ Please connect your wallet first.";
pub const INVALID_AMOUNT_MESSAGE: &str = "❌ Please enter a valid amount greater than 0.";
pub const SELECT_VALIDATOR_MESSAGE: &str =
    "❌ Please select a validator from the list before confirming.";
pub const SELECT_STAKE_ACCOUNT_MESSAGE: &str =
    "❌ Please select one of your stake accounts before confirming.";

/// Kinds of action that block free-text input until resolved
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    Swap,
    SendToken,
    StakeAmount,
    PlaceBidAmount,
    Validators,
    Unstake,
}

impl GateKind {
    pub fn from_message_type(message_type: MessageType) -> Option<Self> {
        match message_type {
            MessageType::Swap => Some(GateKind::Swap),
            MessageType::SendToken => Some(GateKind::SendToken),
            MessageType::StakeAmount => Some(GateKind::StakeAmount),
            MessageType::PlaceBidAmount => Some(GateKind::PlaceBidAmount),
            MessageType::Validators => Some(GateKind::Validators),
            MessageType::Unstake => Some(GateKind::Unstake),
            _ => None,
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            GateKind::Swap => MessageType::Swap,
            GateKind::SendToken => MessageType::SendToken,
            GateKind::StakeAmount => MessageType::StakeAmount,
            GateKind::PlaceBidAmount => MessageType::PlaceBidAmount,
            GateKind::Validators => MessageType::Validators,
            GateKind::Unstake => MessageType::Unstake,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.message_type().as_str()
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", content = "action", rename_all = "snake_case")]
pub enum GateState {
    Free,
    Gated(GateKind),
}

impl GateState {
    pub fn is_free(&self) -> bool {
        matches!(self, GateState::Free)
    }

    pub fn pending(&self) -> Option<GateKind> {
        match self {
            GateState::Free => None,
            GateState::Gated(kind) => Some(*kind),
        }
    }
}

/// User input accompanying a confirm
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfirmInput {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub validator: Option<String>,
    #[serde(default)]
    pub stake_account: Option<String>,
}

pub struct Session {
    id: Uuid,
    context: SessionContext,
    history: ChatHistory,
    gate: GateState,
    in_flight: bool,
}

impl Session {
    pub fn new(id: Uuid, context: SessionContext) -> Self {
        Self {
            id,
            context,
            history: ChatHistory::new(),
            gate: GateState::Free,
            in_flight: false,
        }
    }

    /// Rebuild from persisted messages; a gating last message re-arms the gate
    pub fn restore(id: Uuid, context: SessionContext, messages: Vec<ChatMessage>) -> Self {
        let gate = messages
            .last()
            .and_then(|m| GateKind::from_message_type(m.message_type))
            .map_or(GateState::Free, GateState::Gated);

        Self {
            id,
            context,
            history: ChatHistory::from_messages(messages),
            gate,
            in_flight: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn gate(&self) -> GateState {
        self.gate
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn connect_wallet(&mut self, wallet: Option<String>) {
        info!(session_id = %self.id, connected = wallet.is_some(), "Wallet context updated");
        self.context.wallet_address = wallet;
    }

    pub fn authenticate(&mut self, token: Option<String>) {
        self.context.auth_token = token;
    }

    // =============================
    // Request lifecycle
    // =============================

    pub fn ensure_accepting_input(&self) -> Result<()> {
        if let GateState::Gated(kind) = self.gate {
            return Err(AssistantError::ActionPending(kind));
        }
        if self.in_flight {
            return Err(AssistantError::RequestInFlight);
        }
        Ok(())
    }

    pub fn begin_request(&mut self) -> Result<()> {
        self.ensure_accepting_input()?;
        self.in_flight = true;
        Ok(())
    }

    pub fn end_request(&mut self) {
        self.in_flight = false;
    }

    /// Append one message. A gating message arms the gate; nothing may
    /// follow it until the gate resolves.
    pub fn record(&mut self, message: ChatMessage) -> Result<()> {
        if let GateState::Gated(kind) = self.gate {
            return Err(AssistantError::GateConflict(format!(
                "cannot append a {} message while a {} action is pending",
                message.message_type.as_str(),
                kind
            )));
        }

        if message.message_type != MessageType::Loading {
            self.history.resolve_loading();
        }

        let gate = GateKind::from_message_type(message.message_type);
        self.history.push(message);

        if let Some(kind) = gate {
            info!(session_id = %self.id, gate = %kind, "Session gated");
            self.gate = GateState::Gated(kind);
        }
        Ok(())
    }

    // =============================
    // Streaming slot
    // =============================

    pub fn begin_stream(&mut self, sender: Sender) -> Uuid {
        self.history.begin_stream(sender)
    }

    pub fn append_stream(&mut self, delta: &str) -> bool {
        self.history.append_stream(delta)
    }

    pub fn finish_stream(&mut self) -> Option<ChatMessage> {
        self.history.finish_stream().cloned()
    }

    pub fn discard_stream(&mut self) {
        self.history.discard_stream();
    }

    // =============================
    // Gate resolution
    // =============================

    /// Cancel the pending action. Returns the rewritten pending message and
    /// the closing system message.
    pub fn exit(&mut self) -> Result<Vec<ChatMessage>> {
        let kind = self.gate.pending().ok_or(AssistantError::NoPendingAction)?;

        let mut changed = self.release(MessageType::Text);
        let closed = ChatMessage::system(CLOSED_MESSAGE);
        self.history.push(closed.clone());
        changed.push(closed);

        info!(session_id = %self.id, gate = %kind, "Pending action closed");
        Ok(changed)
    }

    /// Confirm the pending action. A missing precondition or executor
    /// failure releases the gate with a remediation message instead of
    /// leaving it armed.
    pub async fn confirm(
        &mut self,
        input: ConfirmInput,
        executor: &dyn ActionExecutor,
    ) -> Result<Vec<ChatMessage>> {
        let kind = self.gate.pending().ok_or(AssistantError::NoPendingAction)?;
        if self.in_flight {
            return Err(AssistantError::RequestInFlight);
        }

        let pending = self
            .history
            .last()
            .cloned()
            .ok_or(AssistantError::NoPendingAction)?;

        if kind == GateKind::Validators {
            return self.confirm_validator(&pending, &input);
        }

        if let Some(remediation) = self.precondition_failure(kind, &pending, &input) {
            return Ok(self.remediate(kind, remediation));
        }

        let Some(wallet) = self.context.wallet_address.clone() else {
            return Ok(self.remediate(kind, CONNECT_WALLET_MESSAGE.to_string()));
        };

        let request = ActionRequest {
            kind,
            wallet: &wallet,
            pending: &pending,
            input: &input,
        };

        match executor.execute(request).await {
            Ok(receipt) => {
                let mut changed = self.release(MessageType::Success);
                let done = ChatMessage::success(format!("✅ {}", receipt.summary))
                    .with_payload(MessagePayload::Receipt(receipt));
                self.history.push(done.clone());
                changed.push(done);

                info!(session_id = %self.id, gate = %kind, "Pending action confirmed");
                Ok(changed)
            }
            Err(e) => {
                warn!(session_id = %self.id, gate = %kind, error = %e, "Action executor failed");
                Ok(self.remediate(
                    kind,
                    format!("❌ Failed to complete the {} action. Please try again.", kind),
                ))
            }
        }
    }

    fn confirm_validator(
        &mut self,
        pending: &ChatMessage,
        input: &ConfirmInput,
    ) -> Result<Vec<ChatMessage>> {
        let listed: &[ValidatorInfo] = match &pending.payload {
            Some(MessagePayload::Validators(list)) => list,
            _ => &[],
        };

        let selected = input
            .validator
            .as_deref()
            .and_then(|vote| listed.iter().find(|v| v.vote_account == vote))
            .cloned();

        let Some(validator) = selected else {
            return Ok(self.remediate(GateKind::Validators, SELECT_VALIDATOR_MESSAGE.to_string()));
        };

        let mut changed = self.release(MessageType::Success);
        let prompt = ChatMessage::new(
            Sender::Ai,
            MessageType::StakeAmount,
            format!(
                "You selected validator {} ({}% commission). Enter the amount of SOL to stake.",
                validator.moniker(),
                validator.commission
            ),
        )
        .with_payload(MessagePayload::Stake(StakeProposal { validator }));

        self.record(prompt.clone())?;
        changed.push(prompt);
        Ok(changed)
    }

    fn precondition_failure(
        &self,
        kind: GateKind,
        pending: &ChatMessage,
        input: &ConfirmInput,
    ) -> Option<String> {
        if self.context.wallet_address.is_none() {
            return Some(CONNECT_WALLET_MESSAGE.to_string());
        }

        match kind {
            GateKind::StakeAmount | GateKind::PlaceBidAmount => match input.amount {
                Some(amount) if amount.is_finite() && amount > 0.0 => None,
                _ => Some(INVALID_AMOUNT_MESSAGE.to_string()),
            },
            GateKind::Unstake => {
                let positions: &[StakePosition] = match &pending.payload {
                    Some(MessagePayload::StakePositions(list)) => list,
                    _ => &[],
                };
                let listed = input
                    .stake_account
                    .as_deref()
                    .is_some_and(|acct| positions.iter().any(|p| p.stake_account == acct));
                (!listed).then(|| SELECT_STAKE_ACCOUNT_MESSAGE.to_string())
            }
            GateKind::Swap | GateKind::SendToken | GateKind::Validators => None,
        }
    }

    /// Release the gate with the pending message rewritten to `resolved`
    fn release(&mut self, resolved: MessageType) -> Vec<ChatMessage> {
        self.gate = GateState::Free;
        self.history
            .rewrite_last_type(resolved)
            .cloned()
            .into_iter()
            .collect()
    }

    fn remediate(&mut self, kind: GateKind, text: String) -> Vec<ChatMessage> {
        info!(session_id = %self.id, gate = %kind, "Pending action released without execution");
        let mut changed = self.release(MessageType::Text);
        let remediation = ChatMessage::error(text);
        self.history.push(remediation.clone());
        changed.push(remediation);
        changed
    }
}
