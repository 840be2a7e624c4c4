//! Chain collaborators
//!
//! Everything the assistant learns about the outside world (balances,
//! prices, quotes, validators, metrics, auctions, news, DEX activity and
//! portfolio analytics) comes through the [`ChainGateway`] trait.
//! [`HttpChainGateway`] is the production implementation over public HTTP
//! APIs.

pub mod http;

use crate::Result;
use serde::{Deserialize, Serialize};

pub use http::HttpChainGateway;

pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;
pub const DEFAULT_SLIPPAGE_BPS: u16 = 50;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenMetadata {
    pub symbol: String,
    pub name: String,
    pub mint: String,
    pub decimals: u8,
    pub is_native: bool,
}

impl TokenMetadata {
    pub fn sol() -> Self {
        Self {
            symbol: "SOL".to_string(),
            name: "Solana".to_string(),
            mint: SOL_MINT.to_string(),
            decimals: 9,
            is_native: true,
        }
    }

    /// Whole-token amount converted to base units, rounded down
    pub fn to_base_units(&self, amount: f64) -> u64 {
        (amount * 10f64.powi(self.decimals as i32)).floor().max(0.0) as u64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenBalance {
    pub symbol: String,
    pub mint: String,
    pub amount: f64,
    pub usd_value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletBalances {
    pub address: String,
    pub tokens: Vec<TokenBalance>,
}

impl WalletBalances {
    pub fn is_empty(&self) -> bool {
        self.tokens.iter().all(|t| t.amount <= 0.0)
    }

    pub fn total_usd(&self) -> f64 {
        self.tokens.iter().filter_map(|t| t.usd_value).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenPrice {
    pub symbol: String,
    pub usd: f64,
    pub change_24h_pct: Option<f64>,
    pub market_cap_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwapQuoteRequest {
    pub input_mint: String,
    pub output_mint: String,
    /// Input amount in base units
    pub amount: u64,
    pub slippage_bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SwapQuote {
    pub in_amount: u64,
    pub out_amount: u64,
    pub price_impact_pct: f64,
    pub route_label: String,
    pub slippage_bps: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatorInfo {
    pub vote_account: String,
    pub node_account: String,
    pub commission: u8,
    pub activated_stake_sol: f64,
    pub delinquent: bool,
}

impl ValidatorInfo {
    /// Short display label derived from the vote account
    pub fn moniker(&self) -> String {
        let va = &self.vote_account;
        if va.chars().count() <= 10 {
            return va.clone();
        }
        let head: String = va.chars().take(4).collect();
        let tail: String = va.chars().skip(va.chars().count() - 4).collect();
        format!("{}...{}", head, tail)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StakePosition {
    pub stake_account: String,
    pub validator: Option<String>,
    pub amount_sol: f64,
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolTvl {
    pub name: String,
    pub category: Option<String>,
    pub tvl_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkMetrics {
    pub chain: String,
    pub tvl_usd: f64,
    pub top_protocols: Vec<ProtocolTvl>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuctionInfo {
    pub round: Option<u64>,
    pub status: String,
    pub highest_bid_sol: Option<f64>,
    pub ends_at: Option<String>,
    pub note: Option<String>,
}

impl AuctionInfo {
    pub fn summary(&self) -> String {
        let mut out = match self.round {
            Some(round) => format!("🔥 SOL Burn Auction #{}: {}", round, self.status),
            None => format!("🔥 Latest SOL Burn Auction: {}", self.status),
        };
        if let Some(bid) = self.highest_bid_sol {
            out.push_str(&format!(" | Highest bid: {} SOL", bid));
        }
        if let Some(ends) = &self.ends_at {
            out.push_str(&format!(" | Ends: {}", ends));
        }
        if let Some(note) = &self.note {
            out.push_str(&format!("\n{}", note));
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProposalSummary {
    pub id: String,
    pub title: String,
    pub status: String,
    pub summary: String,
}

impl ProposalSummary {
    /// Informational entry served until a governance source is wired in
    pub fn pending_integration() -> Self {
        Self {
            id: "0".to_string(),
            title: "Solana governance proposals coming soon".to_string(),
            status: "Pending Integration".to_string(),
            summary: "We are wiring up Solana governance sources (Realms, Squads, SPL Governance) \
and will surface live proposals here shortly."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionSummary {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub fee_lamports: u64,
    pub succeeded: bool,
    pub explorer_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsDigest {
    pub summary: String,
    pub sources: Vec<String>,
}

/// A token ranked by distinct buyers over the last hour of DEX trades
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendingToken {
    pub name: String,
    pub symbol: String,
    pub mint: String,
    pub price_usd: f64,
    pub dex: String,
    pub buyers: u64,
    pub sellers: u64,
    pub trades: u64,
    pub volume: f64,
}

impl TrendingToken {
    /// Buyers per seller; `None` without sellers
    pub fn buyer_ratio(&self) -> Option<f64> {
        (self.sellers > 0).then(|| self.buyers as f64 / self.sellers as f64)
    }
}

/// A recently launched pump.fun token, aggregated over its recent trades
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LaunchedToken {
    pub name: String,
    pub symbol: String,
    pub mint: String,
    pub price_usd: f64,
    pub launched_at: String,
    pub platform: String,
    pub trades: u64,
    pub volume: f64,
}

/// Look-back window for buy/sell pressure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PressureWindow {
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[default]
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    OneDay,
}

impl PressureWindow {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "5m" => Some(PressureWindow::FiveMinutes),
            "15m" => Some(PressureWindow::FifteenMinutes),
            "1h" => Some(PressureWindow::OneHour),
            "24h" => Some(PressureWindow::OneDay),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PressureWindow::FiveMinutes => "5m",
            PressureWindow::FifteenMinutes => "15m",
            PressureWindow::OneHour => "1h",
            PressureWindow::OneDay => "24h",
        }
    }

    pub fn minutes(&self) -> i64 {
        match self {
            PressureWindow::FiveMinutes => 5,
            PressureWindow::FifteenMinutes => 15,
            PressureWindow::OneHour => 60,
            PressureWindow::OneDay => 1440,
        }
    }
}

/// Buy and sell activity on one token over a window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenPressure {
    pub mint: String,
    pub window: PressureWindow,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub buyers: u64,
    pub sellers: u64,
    pub buy_trades: u64,
    pub sell_trades: u64,
    pub total_trades: u64,
}

impl TokenPressure {
    /// Buy share of traded volume in percent; 50 when nothing traded
    pub fn buy_pressure_pct(&self) -> f64 {
        let total = self.buy_volume + self.sell_volume;
        if total > 0.0 {
            self.buy_volume / total * 100.0
        } else {
            50.0
        }
    }

    pub fn sentiment(&self) -> &'static str {
        let buy = self.buy_pressure_pct();
        if buy > 60.0 {
            "Bullish"
        } else if buy > 55.0 {
            "Slightly Bullish"
        } else if buy < 40.0 {
            "Bearish"
        } else if buy < 45.0 {
            "Slightly Bearish"
        } else {
            "Neutral"
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} sentiment - {:.1}% buy pressure",
            self.sentiment(),
            self.buy_pressure_pct()
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionPnl {
    pub asset: String,
    /// Position value at the start of the window
    pub invested_usd: f64,
    pub current_usd: f64,
}

impl PositionPnl {
    pub fn pnl_usd(&self) -> f64 {
        self.current_usd - self.invested_usd
    }
}

/// Wallet profit and loss over the last 24 hours
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PortfolioPnl {
    pub address: String,
    pub positions: Vec<PositionPnl>,
}

impl PortfolioPnl {
    pub fn total_invested_usd(&self) -> f64 {
        self.positions.iter().map(|p| p.invested_usd).sum()
    }

    pub fn total_current_usd(&self) -> f64 {
        self.positions.iter().map(|p| p.current_usd).sum()
    }

    pub fn total_pnl_usd(&self) -> f64 {
        self.total_current_usd() - self.total_invested_usd()
    }

    /// `0` when nothing was invested
    pub fn total_pnl_pct(&self) -> f64 {
        let invested = self.total_invested_usd();
        if invested > 0.0 {
            self.total_pnl_usd() / invested * 100.0
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> String {
        let pnl = self.total_pnl_usd();
        format!(
            "PnL for {}: {}${:.2} ({:.2}%)",
            self.address,
            if pnl >= 0.0 { "+" } else { "-" },
            pnl.abs(),
            self.total_pnl_pct()
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetTransfer {
    pub from: Option<String>,
    pub to: Option<String>,
    pub asset: String,
    pub quantity: f64,
    pub value_usd: f64,
}

/// A decoded wallet transaction (swap, transfer, approval, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletTransaction {
    pub hash: String,
    pub kind: String,
    pub status: String,
    pub timestamp: Option<String>,
    pub fee_usd: f64,
    pub chain: String,
    pub transfers: Vec<AssetTransfer>,
}

pub fn explorer_tx_url(signature: &str) -> String {
    format!("https://explorer.solana.com/tx/{}", signature)
}

/// Read-only view of the chain and its surrounding market services
#[async_trait::async_trait]
pub trait ChainGateway: Send + Sync {
    /// `None` when the symbol is not a known token
    async fn token_metadata(&self, symbol: &str) -> Result<Option<TokenMetadata>>;
    async fn balances(&self, address: &str) -> Result<WalletBalances>;
    async fn token_price(&self, symbol: &str) -> Result<Option<TokenPrice>>;
    async fn swap_quote(&self, request: &SwapQuoteRequest) -> Result<SwapQuote>;
    /// Sorted by activated stake, largest first
    async fn validators(&self, limit: usize) -> Result<Vec<ValidatorInfo>>;
    async fn stake_positions(&self, owner: &str) -> Result<Vec<StakePosition>>;
    async fn network_metrics(&self) -> Result<NetworkMetrics>;
    async fn auction(&self, round: Option<u64>) -> Result<AuctionInfo>;
    async fn governance_proposals(&self, limit: usize) -> Result<Vec<ProposalSummary>>;
    async fn transaction(&self, signature: &str) -> Result<Option<TransactionSummary>>;
    async fn search_news(&self, query: &str) -> Result<NewsDigest>;
    /// Ordered by distinct buyers; tokens under `min_buyers` are dropped
    async fn trending_tokens(&self, limit: usize, min_buyers: u64) -> Result<Vec<TrendingToken>>;
    /// Newest launch first; tokens under `min_trades` are dropped
    async fn new_pumpfun_tokens(&self, limit: usize, min_trades: u64) -> Result<Vec<LaunchedToken>>;
    /// `None` when the token did not trade in the window
    async fn token_pressure(&self, mint: &str, window: PressureWindow) -> Result<Option<TokenPressure>>;
    async fn portfolio_pnl(&self, address: &str) -> Result<PortfolioPnl>;
    /// Most recent first
    async fn wallet_transactions(&self, address: &str, limit: usize) -> Result<Vec<WalletTransaction>>;
}
