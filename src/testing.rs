//! Shared fixtures for unit tests

use crate::chain::{
    explorer_tx_url, AssetTransfer, AuctionInfo, ChainGateway, LaunchedToken, NetworkMetrics,
    NewsDigest, PortfolioPnl, PositionPnl, PressureWindow, ProposalSummary, ProtocolTvl,
    StakePosition, SwapQuote, SwapQuoteRequest, TokenBalance, TokenMetadata, TokenPressure,
    TokenPrice, TransactionSummary, TrendingToken, ValidatorInfo, WalletBalances,
    WalletTransaction, SOL_MINT,
};
use crate::error::AssistantError;
use crate::Result;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub const WALLET: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
pub const RECEIVER: &str = "HN7cABqLq46Es1jh92dQQisAq662SmxELLLsHHe4YWrH";
pub const VALIDATOR_A: &str = "CertusDeBmqN8ZawdkxK5kFGMwBXdudvWHYwtNgNhvLu";
pub const VALIDATOR_B: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
pub const STAKE_ACCOUNT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";
pub const BONK_MINT: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
pub const KNOWN_SIGNATURE: &str =
    "5VERv8NMvzbJMEkV8xnrLkEaWRtSz9CosKDYjCJjBRnbJLgp8uirBgmQpjKhoR4tjF3ZpRzrFmBV6UjKdiSZkQUW";

fn token(symbol: &str, name: &str, mint: &str, decimals: u8) -> TokenMetadata {
    TokenMetadata {
        symbol: symbol.to_string(),
        name: name.to_string(),
        mint: mint.to_string(),
        decimals,
        is_native: mint == SOL_MINT,
    }
}

fn fixture_tokens() -> Vec<(TokenMetadata, f64)> {
    vec![
        (TokenMetadata::sol(), 150.0),
        (token("USDC", "USD Coin", "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", 6), 1.0),
        (token("USDT", "USDT", "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", 6), 1.0),
        (token("BONK", "Bonk", "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263", 5), 0.00002),
    ]
}

/// Deterministic gateway with per-method call counters and failure switches
pub struct FixtureGateway {
    tokens: Vec<(TokenMetadata, f64)>,
    calls: Mutex<HashMap<&'static str, usize>>,
    failing: Mutex<HashSet<&'static str>>,
    last_quote: Mutex<Option<SwapQuoteRequest>>,
}

impl FixtureGateway {
    pub fn new() -> Self {
        Self {
            tokens: fixture_tokens(),
            calls: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            last_quote: Mutex::new(None),
        }
    }

    pub fn failing_on(self, method: &'static str) -> Self {
        self.failing.lock().unwrap().insert(method);
        self
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn quote_calls(&self) -> usize {
        self.calls("swap_quote")
    }

    pub fn last_quote_amount(&self) -> Option<u64> {
        self.last_quote.lock().unwrap().as_ref().map(|q| q.amount)
    }

    fn enter(&self, method: &'static str) -> Result<()> {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
        if self.failing.lock().unwrap().contains(method) {
            return Err(AssistantError::Collaborator(format!("{} unavailable", method)));
        }
        Ok(())
    }

    fn by_symbol(&self, symbol: &str) -> Option<&(TokenMetadata, f64)> {
        self.tokens
            .iter()
            .find(|(t, _)| t.symbol.eq_ignore_ascii_case(symbol.trim()))
    }

    fn by_mint(&self, mint: &str) -> Option<&(TokenMetadata, f64)> {
        self.tokens.iter().find(|(t, _)| t.mint == mint)
    }
}

#[async_trait::async_trait]
impl ChainGateway for FixtureGateway {
    async fn token_metadata(&self, symbol: &str) -> Result<Option<TokenMetadata>> {
        self.enter("token_metadata")?;
        Ok(self.by_symbol(symbol).map(|(t, _)| t.clone()))
    }

    async fn balances(&self, address: &str) -> Result<WalletBalances> {
        self.enter("balances")?;
        Ok(WalletBalances {
            address: address.to_string(),
            tokens: vec![
                TokenBalance {
                    symbol: "SOL".to_string(),
                    mint: SOL_MINT.to_string(),
                    amount: 2.5,
                    usd_value: Some(375.0),
                },
                TokenBalance {
                    symbol: "USDC".to_string(),
                    mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
                    amount: 125.0,
                    usd_value: Some(125.0),
                },
            ],
        })
    }

    async fn token_price(&self, symbol: &str) -> Result<Option<TokenPrice>> {
        self.enter("token_price")?;
        Ok(self.by_symbol(symbol).map(|(t, usd)| TokenPrice {
            symbol: t.symbol.clone(),
            usd: *usd,
            change_24h_pct: Some(1.5),
            market_cap_usd: None,
            volume_24h_usd: None,
        }))
    }

    async fn swap_quote(&self, request: &SwapQuoteRequest) -> Result<SwapQuote> {
        self.enter("swap_quote")?;
        *self.last_quote.lock().unwrap() = Some(request.clone());

        let (input, in_price) = self
            .by_mint(&request.input_mint)
            .ok_or_else(|| AssistantError::Collaborator("unknown input mint".to_string()))?;
        let (output, out_price) = self
            .by_mint(&request.output_mint)
            .ok_or_else(|| AssistantError::Collaborator("unknown output mint".to_string()))?;

        let whole_in = request.amount as f64 / 10f64.powi(input.decimals as i32);
        let whole_out = whole_in * in_price / out_price;

        Ok(SwapQuote {
            in_amount: request.amount,
            out_amount: (whole_out * 10f64.powi(output.decimals as i32)) as u64,
            price_impact_pct: 0.01,
            route_label: "Whirlpool".to_string(),
            slippage_bps: request.slippage_bps,
        })
    }

    async fn validators(&self, limit: usize) -> Result<Vec<ValidatorInfo>> {
        self.enter("validators")?;
        let all = vec![
            ValidatorInfo {
                vote_account: VALIDATOR_A.to_string(),
                node_account: "node-a".to_string(),
                commission: 5,
                activated_stake_sol: 1_200_000.0,
                delinquent: false,
            },
            ValidatorInfo {
                vote_account: VALIDATOR_B.to_string(),
                node_account: "node-b".to_string(),
                commission: 7,
                activated_stake_sol: 800_000.0,
                delinquent: false,
            },
        ];
        Ok(all.into_iter().take(limit).collect())
    }

    async fn stake_positions(&self, _owner: &str) -> Result<Vec<StakePosition>> {
        self.enter("stake_positions")?;
        Ok(vec![StakePosition {
            stake_account: STAKE_ACCOUNT.to_string(),
            validator: Some(VALIDATOR_A.to_string()),
            amount_sol: 10.0,
            state: "delegated".to_string(),
        }])
    }

    async fn network_metrics(&self) -> Result<NetworkMetrics> {
        self.enter("network_metrics")?;
        Ok(NetworkMetrics {
            chain: "Solana".to_string(),
            tvl_usd: 9_100_000_000.0,
            top_protocols: vec![
                ProtocolTvl {
                    name: "Jito".to_string(),
                    category: Some("Liquid Staking".to_string()),
                    tvl_usd: 2_500_000_000.0,
                },
                ProtocolTvl {
                    name: "Raydium".to_string(),
                    category: Some("Dexes".to_string()),
                    tvl_usd: 1_800_000_000.0,
                },
            ],
        })
    }

    async fn auction(&self, round: Option<u64>) -> Result<AuctionInfo> {
        self.enter("auction")?;
        Ok(AuctionInfo {
            round: Some(round.unwrap_or(7)),
            status: if round.is_some() { "Closed" } else { "Open" }.to_string(),
            highest_bid_sol: Some(42.0),
            ends_at: None,
            note: None,
        })
    }

    async fn governance_proposals(&self, limit: usize) -> Result<Vec<ProposalSummary>> {
        self.enter("governance_proposals")?;
        Ok(std::iter::once(ProposalSummary::pending_integration())
            .take(limit)
            .collect())
    }

    async fn transaction(&self, signature: &str) -> Result<Option<TransactionSummary>> {
        self.enter("transaction")?;
        if signature != KNOWN_SIGNATURE {
            return Ok(None);
        }
        Ok(Some(TransactionSummary {
            signature: signature.to_string(),
            slot: 250_000_000,
            block_time: Some(1_700_000_000),
            fee_lamports: 5000,
            succeeded: true,
            explorer_url: explorer_tx_url(signature),
        }))
    }

    async fn search_news(&self, query: &str) -> Result<NewsDigest> {
        self.enter("search_news")?;
        Ok(NewsDigest {
            summary: format!("- Solana news for: {}", query),
            sources: vec!["https://solana.com/news".to_string()],
        })
    }

    async fn trending_tokens(&self, limit: usize, min_buyers: u64) -> Result<Vec<TrendingToken>> {
        self.enter("trending_tokens")?;
        let all = vec![
            TrendingToken {
                name: "Bonk".to_string(),
                symbol: "BONK".to_string(),
                mint: BONK_MINT.to_string(),
                price_usd: 0.00002,
                dex: "Raydium".to_string(),
                buyers: 420,
                sellers: 210,
                trades: 1800,
                volume: 2_500_000.0,
            },
            TrendingToken {
                name: "Quiet".to_string(),
                symbol: "QT".to_string(),
                mint: "QT11111111111111111111111111111111111111111".to_string(),
                price_usd: 0.5,
                dex: "Orca".to_string(),
                buyers: 2,
                sellers: 1,
                trades: 3,
                volume: 40.0,
            },
        ];
        Ok(all
            .into_iter()
            .filter(|t| t.buyers >= min_buyers)
            .take(limit)
            .collect())
    }

    async fn new_pumpfun_tokens(&self, limit: usize, min_trades: u64) -> Result<Vec<LaunchedToken>> {
        self.enter("new_pumpfun_tokens")?;
        let all = vec![LaunchedToken {
            name: "Moon Cat".to_string(),
            symbol: "MCAT".to_string(),
            mint: "MCAT1111111111111111111111111111111111pump".to_string(),
            price_usd: 0.0004,
            launched_at: "2025-01-01T00:00:00Z".to_string(),
            platform: "pump".to_string(),
            trades: 12,
            volume: 90_000.0,
        }];
        Ok(all
            .into_iter()
            .filter(|t| t.trades >= min_trades)
            .take(limit)
            .collect())
    }

    async fn token_pressure(&self, mint: &str, window: PressureWindow) -> Result<Option<TokenPressure>> {
        self.enter("token_pressure")?;
        if mint != BONK_MINT {
            return Ok(None);
        }
        Ok(Some(TokenPressure {
            mint: mint.to_string(),
            window,
            buy_volume: 650.0,
            sell_volume: 350.0,
            buyers: 40,
            sellers: 25,
            buy_trades: 90,
            sell_trades: 60,
            total_trades: 150,
        }))
    }

    async fn portfolio_pnl(&self, address: &str) -> Result<PortfolioPnl> {
        self.enter("portfolio_pnl")?;
        Ok(PortfolioPnl {
            address: address.to_string(),
            positions: vec![
                PositionPnl {
                    asset: "SOL".to_string(),
                    invested_usd: 350.0,
                    current_usd: 375.0,
                },
                PositionPnl {
                    asset: "USDC".to_string(),
                    invested_usd: 125.0,
                    current_usd: 125.0,
                },
            ],
        })
    }

    async fn wallet_transactions(&self, address: &str, limit: usize) -> Result<Vec<WalletTransaction>> {
        self.enter("wallet_transactions")?;
        let all = vec![WalletTransaction {
            hash: KNOWN_SIGNATURE.to_string(),
            kind: "send".to_string(),
            status: "confirmed".to_string(),
            timestamp: Some("2025-01-01T00:00:00Z".to_string()),
            fee_usd: 0.001,
            chain: "solana".to_string(),
            transfers: vec![AssetTransfer {
                from: Some(address.to_string()),
                to: Some(RECEIVER.to_string()),
                asset: "SOL".to_string(),
                quantity: 1.0,
                value_usd: 150.0,
            }],
        }];
        Ok(all.into_iter().take(limit).collect())
    }
}
