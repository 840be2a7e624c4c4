//! Capability trait and registry
//!
//! Capabilities are the read-only operations a persona may ask the
//! completion engine to call. Nothing in here moves funds: transfers, swaps
//! and stakes only happen through the confirm flow of a pending action.

use crate::chain::{ChainGateway, PressureWindow, SwapQuoteRequest, DEFAULT_SLIPPAGE_BPS};
use crate::completion::CapabilitySpec;
use crate::error::AssistantError;
use crate::models::ToolOutput;
use crate::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for a single capability
#[async_trait::async_trait]
pub trait Capability: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the arguments object
    fn parameters(&self) -> Value;
    async fn execute(&self, arguments: &Value) -> Result<ToolOutput>;

    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Capability registry for lookup by name
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
        }
    }

    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities
            .insert(capability.name().to_string(), capability);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.capabilities.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Specs for the named capabilities that are registered, in the given order
    pub fn catalogue(&self, names: &[&str]) -> Vec<CapabilitySpec> {
        names
            .iter()
            .filter_map(|name| self.capabilities.get(*name))
            .map(|capability| capability.spec())
            .collect()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_object_arguments(arguments: &Value) -> Result<()> {
    if arguments.is_object() || arguments.is_null() {
        Ok(())
    } else {
        Err(AssistantError::InvalidCapabilityInput(
            "arguments must be a JSON object".to_string(),
        ))
    }
}

fn require_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str> {
    ensure_object_arguments(arguments)?;
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AssistantError::InvalidCapabilityInput(format!("Expected '{}'", key)))
}

fn optional_u64(arguments: &Value, key: &str) -> Option<u64> {
    arguments.get(key).and_then(|v| {
        v.as_u64()
            .or_else(|| v.as_f64().map(|f| f.max(0.0) as u64))
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    })
}

fn positive_amount(arguments: &Value, key: &str) -> Result<f64> {
    let amount = arguments
        .get(key)
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
        .ok_or_else(|| AssistantError::InvalidCapabilityInput(format!("Expected numeric '{}'", key)))?;

    if amount > 0.0 && amount.is_finite() {
        Ok(amount)
    } else {
        Err(AssistantError::InvalidCapabilityInput(format!(
            "'{}' must be greater than zero",
            key
        )))
    }
}

pub struct BalanceLookup {
    gateway: Arc<dyn ChainGateway>,
}

#[async_trait::async_trait]
impl Capability for BalanceLookup {
    fn name(&self) -> &'static str {
        "balance_lookup"
    }

    fn description(&self) -> &'static str {
        "Fetch SOL and SPL token balances (with USD values) for a Solana address"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"address": {"type": "string", "description": "Base58 Solana address"}},
            "required": ["address"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        let address = require_str(arguments, "address")?;
        let balances = self.gateway.balances(address).await?;
        let count = balances.tokens.len();
        Ok(ToolOutput::ok(
            serde_json::to_value(balances)?,
            format!("Fetched {} token balances", count),
        ))
    }
}

pub struct PriceLookup {
    gateway: Arc<dyn ChainGateway>,
}

#[async_trait::async_trait]
impl Capability for PriceLookup {
    fn name(&self) -> &'static str {
        "price_lookup"
    }

    fn description(&self) -> &'static str {
        "Fetch the current USD price, 24h change and market cap of a token by symbol"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"token": {"type": "string", "description": "Token symbol, e.g. SOL"}},
            "required": ["token"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        let token = require_str(arguments, "token")?;
        match self.gateway.token_price(token).await? {
            Some(price) => Ok(ToolOutput::ok(
                serde_json::to_value(&price)?,
                format!("1 {} = ${:.4}", price.symbol, price.usd),
            )),
            None => Ok(ToolOutput::failure(
                format!("unknown token {}", token),
                "Failed to fetch token price",
            )),
        }
    }
}

pub struct SwapQuoteLookup {
    gateway: Arc<dyn ChainGateway>,
}

#[async_trait::async_trait]
impl Capability for SwapQuoteLookup {
    fn name(&self) -> &'static str {
        "swap_quote"
    }

    fn description(&self) -> &'static str {
        "Get a Jupiter swap quote between two tokens. Quote only; never executes a swap"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input_token": {"type": "string"},
                "output_token": {"type": "string"},
                "amount": {"type": "number", "description": "Whole input-token amount"},
                "slippage_bps": {"type": "integer"}
            },
            "required": ["input_token", "output_token", "amount"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        let input_symbol = require_str(arguments, "input_token")?;
        let output_symbol = require_str(arguments, "output_token")?;
        let amount = positive_amount(arguments, "amount")?;

        let Some(input) = self.gateway.token_metadata(input_symbol).await? else {
            return Ok(ToolOutput::failure(
                format!("unknown token {}", input_symbol),
                "Failed to fetch swap quote",
            ));
        };
        let Some(output) = self.gateway.token_metadata(output_symbol).await? else {
            return Ok(ToolOutput::failure(
                format!("unknown token {}", output_symbol),
                "Failed to fetch swap quote",
            ));
        };

        let slippage_bps = optional_u64(arguments, "slippage_bps")
            .map(|v| v.min(10_000) as u16)
            .unwrap_or(DEFAULT_SLIPPAGE_BPS);

        let quote = self
            .gateway
            .swap_quote(&SwapQuoteRequest {
                input_mint: input.mint.clone(),
                output_mint: output.mint.clone(),
                amount: input.to_base_units(amount),
                slippage_bps,
            })
            .await?;

        let out = quote.out_amount as f64 / 10f64.powi(output.decimals as i32);
        Ok(ToolOutput::ok(
            json!({"input": input, "output": output, "amount": amount, "quote": quote}),
            format!("{} {} ≈ {:.6} {}", amount, input.symbol, out, output.symbol),
        ))
    }
}

pub struct ValidatorList {
    gateway: Arc<dyn ChainGateway>,
}

#[async_trait::async_trait]
impl Capability for ValidatorList {
    fn name(&self) -> &'static str {
        "validator_list"
    }

    fn description(&self) -> &'static str {
        "List Solana validators by activated stake with their commission"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"limit": {"type": "integer", "description": "Max validators, default 10"}}
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        ensure_object_arguments(arguments)?;
        let limit = optional_u64(arguments, "limit").unwrap_or(10).clamp(1, 50) as usize;
        let validators = self.gateway.validators(limit).await?;
        let count = validators.len();
        Ok(ToolOutput::ok(
            serde_json::to_value(validators)?,
            format!("Fetched {} validators", count),
        ))
    }
}

pub struct NetworkMetricsLookup {
    gateway: Arc<dyn ChainGateway>,
}

#[async_trait::async_trait]
impl Capability for NetworkMetricsLookup {
    fn name(&self) -> &'static str {
        "network_metrics"
    }

    fn description(&self) -> &'static str {
        "Fetch Solana total value locked and the top DeFi protocols by TVL"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        ensure_object_arguments(arguments)?;
        let metrics = self.gateway.network_metrics().await?;
        let message = format!("Solana TVL ${:.0}", metrics.tvl_usd);
        Ok(ToolOutput::ok(serde_json::to_value(metrics)?, message))
    }
}

pub struct NewsSearch {
    gateway: Arc<dyn ChainGateway>,
}

#[async_trait::async_trait]
impl Capability for NewsSearch {
    fn name(&self) -> &'static str {
        "news_search"
    }

    fn description(&self) -> &'static str {
        "Search recent Solana ecosystem news and return a short digest with sources"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        let query = require_str(arguments, "query")?;
        let digest = self.gateway.search_news(query).await?;
        Ok(ToolOutput::ok(serde_json::to_value(digest)?, "News digest ready"))
    }
}

pub struct AuctionLookup {
    gateway: Arc<dyn ChainGateway>,
}

#[async_trait::async_trait]
impl Capability for AuctionLookup {
    fn name(&self) -> &'static str {
        "auction_info"
    }

    fn description(&self) -> &'static str {
        "Fetch the latest SOL burn auction, or a specific round when given"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"round": {"type": "integer"}}
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        ensure_object_arguments(arguments)?;
        let info = self.gateway.auction(optional_u64(arguments, "round")).await?;
        let message = info.summary();
        Ok(ToolOutput::ok(serde_json::to_value(info)?, message))
    }
}

pub struct TokenSearch {
    gateway: Arc<dyn ChainGateway>,
}

#[async_trait::async_trait]
impl Capability for TokenSearch {
    fn name(&self) -> &'static str {
        "token_search"
    }

    fn description(&self) -> &'static str {
        "Resolve a token symbol to its mint address, name and decimals"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"symbol": {"type": "string"}},
            "required": ["symbol"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        let symbol = require_str(arguments, "symbol")?;
        match self.gateway.token_metadata(symbol).await? {
            Some(meta) => {
                let message = format!("{} ({}) mint {}", meta.symbol, meta.name, meta.mint);
                Ok(ToolOutput::ok(serde_json::to_value(meta)?, message))
            }
            None => Ok(ToolOutput::failure(
                format!("unknown token {}", symbol),
                "Token not found",
            )),
        }
    }
}

pub struct TrendingTokens {
    gateway: Arc<dyn ChainGateway>,
}

#[async_trait::async_trait]
impl Capability for TrendingTokens {
    fn name(&self) -> &'static str {
        "trending_tokens"
    }

    fn description(&self) -> &'static str {
        "Get trending Solana DEX tokens over the last hour, ranked by distinct buyers"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {"type": "integer", "description": "Max tokens, default 20"},
                "min_buyers": {"type": "integer", "description": "Minimum distinct buyers, default 5"}
            }
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        ensure_object_arguments(arguments)?;
        let limit = optional_u64(arguments, "limit").unwrap_or(20).clamp(1, 50) as usize;
        let min_buyers = optional_u64(arguments, "min_buyers").unwrap_or(5);
        let tokens = self.gateway.trending_tokens(limit, min_buyers).await?;
        let message = format!("Found {} trending tokens in the last hour", tokens.len());
        Ok(ToolOutput::ok(
            json!({"tokens": tokens, "count": tokens.len(), "timeframe": "1 hour"}),
            message,
        ))
    }
}

pub struct TokenPressureLookup {
    gateway: Arc<dyn ChainGateway>,
}

#[async_trait::async_trait]
impl Capability for TokenPressureLookup {
    fn name(&self) -> &'static str {
        "token_pressure"
    }

    fn description(&self) -> &'static str {
        "Analyse buy/sell pressure on a Solana token: volume split, buyer and seller counts, sentiment"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "token_address": {"type": "string", "description": "Token mint address"},
                "timeframe": {"type": "string", "enum": ["5m", "15m", "1h", "24h"]}
            },
            "required": ["token_address"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        let mint = require_str(arguments, "token_address")?;
        let window = match arguments.get("timeframe").and_then(Value::as_str) {
            None => PressureWindow::default(),
            Some(raw) => PressureWindow::parse(raw).ok_or_else(|| {
                AssistantError::InvalidCapabilityInput(format!("Unsupported timeframe '{}'", raw))
            })?,
        };

        match self.gateway.token_pressure(mint, window).await? {
            Some(pressure) => {
                let message = pressure.summary();
                let mut data = serde_json::to_value(&pressure)?;
                data["buy_pressure_pct"] = json!(pressure.buy_pressure_pct());
                data["sentiment"] = json!(pressure.sentiment());
                Ok(ToolOutput::ok(data, message))
            }
            None => Ok(ToolOutput::failure(
                format!("no trades for {} in the last {}", mint, window.as_str()),
                "No trading data found for this token",
            )),
        }
    }
}

pub struct NewPumpfunTokens {
    gateway: Arc<dyn ChainGateway>,
}

#[async_trait::async_trait]
impl Capability for NewPumpfunTokens {
    fn name(&self) -> &'static str {
        "new_pumpfun_tokens"
    }

    fn description(&self) -> &'static str {
        "Get the latest tokens launched on Pump.fun with launch time and early trading activity"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {"type": "integer", "description": "Max tokens, default 10, at most 50"},
                "min_trades": {"type": "integer", "description": "Minimum trades, default 0"}
            }
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        ensure_object_arguments(arguments)?;
        let limit = optional_u64(arguments, "limit").unwrap_or(10).clamp(1, 50) as usize;
        let min_trades = optional_u64(arguments, "min_trades").unwrap_or(0);
        let tokens = self.gateway.new_pumpfun_tokens(limit, min_trades).await?;
        let message = if tokens.is_empty() {
            "No new Pump.fun tokens found in recent blocks. Try again in a few moments.".to_string()
        } else {
            format!("Found {} Pump.fun tokens", tokens.len())
        };
        Ok(ToolOutput::ok(json!({"tokens": tokens, "count": tokens.len()}), message))
    }
}

pub struct PortfolioPnlLookup {
    gateway: Arc<dyn ChainGateway>,
}

#[async_trait::async_trait]
impl Capability for PortfolioPnlLookup {
    fn name(&self) -> &'static str {
        "portfolio_pnl"
    }

    fn description(&self) -> &'static str {
        "Get 24h profit and loss for a wallet, per position and in total, in USD"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"address": {"type": "string", "description": "Wallet address"}},
            "required": ["address"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        let address = require_str(arguments, "address")?;
        let pnl = self.gateway.portfolio_pnl(address).await?;
        let message = pnl.summary();
        let mut data = serde_json::to_value(&pnl)?;
        data["total_invested_usd"] = json!(pnl.total_invested_usd());
        data["total_current_usd"] = json!(pnl.total_current_usd());
        data["total_pnl_usd"] = json!(pnl.total_pnl_usd());
        data["total_pnl_pct"] = json!(pnl.total_pnl_pct());
        Ok(ToolOutput::ok(data, message))
    }
}

pub struct WalletTransactions {
    gateway: Arc<dyn ChainGateway>,
}

#[async_trait::async_trait]
impl Capability for WalletTransactions {
    fn name(&self) -> &'static str {
        "wallet_transactions"
    }

    fn description(&self) -> &'static str {
        "Get decoded transaction history (swaps, transfers, approvals) for a wallet"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "address": {"type": "string", "description": "Wallet address"},
                "limit": {"type": "integer", "description": "Max transactions, default 20, at most 100"}
            },
            "required": ["address"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<ToolOutput> {
        let address = require_str(arguments, "address")?;
        let limit = optional_u64(arguments, "limit").unwrap_or(20).clamp(1, 100) as usize;
        let transactions = self.gateway.wallet_transactions(address, limit).await?;
        let message = format!("Found {} transactions for {}", transactions.len(), address);
        Ok(ToolOutput::ok(serde_json::to_value(transactions)?, message))
    }
}

/// Registry with every read-only capability wired to one gateway
pub fn create_default_registry(gateway: Arc<dyn ChainGateway>) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();

    registry.register(Arc::new(BalanceLookup { gateway: gateway.clone() }));
    registry.register(Arc::new(PriceLookup { gateway: gateway.clone() }));
    registry.register(Arc::new(SwapQuoteLookup { gateway: gateway.clone() }));
    registry.register(Arc::new(ValidatorList { gateway: gateway.clone() }));
    registry.register(Arc::new(NetworkMetricsLookup { gateway: gateway.clone() }));
    registry.register(Arc::new(NewsSearch { gateway: gateway.clone() }));
    registry.register(Arc::new(AuctionLookup { gateway: gateway.clone() }));
    registry.register(Arc::new(TokenSearch { gateway: gateway.clone() }));
    registry.register(Arc::new(TrendingTokens { gateway: gateway.clone() }));
    registry.register(Arc::new(TokenPressureLookup { gateway: gateway.clone() }));
    registry.register(Arc::new(NewPumpfunTokens { gateway: gateway.clone() }));
    registry.register(Arc::new(PortfolioPnlLookup { gateway: gateway.clone() }));
    registry.register(Arc::new(WalletTransactions { gateway }));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::Persona;
    use crate::testing::{FixtureGateway, BONK_MINT, WALLET};

    fn registry() -> (Arc<FixtureGateway>, CapabilityRegistry) {
        let gateway = Arc::new(FixtureGateway::new());
        let registry = create_default_registry(gateway.clone());
        (gateway, registry)
    }

    #[test]
    fn test_no_money_moving_capabilities() {
        let (_, registry) = registry();
        for name in registry.list() {
            for verb in ["send", "transfer", "stake", "sign", "execute", "bid"] {
                assert!(!name.contains(verb), "{} looks money-moving", name);
            }
        }
    }

    #[test]
    fn test_persona_catalogues_resolve() {
        let (_, registry) = registry();
        for persona in [Persona::Solpilot, Persona::Sonia, Persona::Zerion, Persona::Venice] {
            let specs = registry.catalogue(persona.capabilities());
            assert_eq!(specs.len(), persona.capabilities().len());
            assert!(specs.iter().all(|s| s.parameters["type"] == "object"));
        }
    }

    #[tokio::test]
    async fn test_swap_quote_uses_base_units() {
        let (gateway, registry) = registry();
        let capability = registry.get("swap_quote").unwrap();
        let out = capability
            .execute(&json!({"input_token": "SOL", "output_token": "USDT", "amount": 2}))
            .await
            .unwrap();

        assert!(out.success);
        assert_eq!(gateway.last_quote_amount(), Some(2_000_000_000));
        assert_eq!(gateway.quote_calls(), 1);
    }

    #[tokio::test]
    async fn test_unknown_token_is_failure_envelope() {
        let (_, registry) = registry();
        let out = registry
            .get("price_lookup")
            .unwrap()
            .execute(&json!({"token": "NOPE"}))
            .await
            .unwrap();
        assert!(!out.success);
        assert!(out.error.unwrap().contains("NOPE"));
    }

    #[tokio::test]
    async fn test_missing_argument_is_invalid_input() {
        let (_, registry) = registry();
        let result = registry.get("balance_lookup").unwrap().execute(&json!({})).await;
        tokio_test::assert_err!(&result);
        assert!(matches!(result, Err(AssistantError::InvalidCapabilityInput(_))));
    }

    #[tokio::test]
    async fn test_trending_filters_by_buyers() {
        let (gateway, registry) = registry();
        let out = registry
            .get("trending_tokens")
            .unwrap()
            .execute(&json!({"limit": 5}))
            .await
            .unwrap();

        assert!(out.success);
        assert_eq!(out.data["count"], 1);
        assert_eq!(out.data["tokens"][0]["symbol"], "BONK");
        assert_eq!(out.message, "Found 1 trending tokens in the last hour");
        assert_eq!(gateway.calls("trending_tokens"), 1);
    }

    #[tokio::test]
    async fn test_token_pressure_reports_sentiment() {
        let (_, registry) = registry();
        let capability = registry.get("token_pressure").unwrap();

        let out = capability
            .execute(&json!({"token_address": BONK_MINT, "timeframe": "15m"}))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.message, "Bullish sentiment - 65.0% buy pressure");
        assert_eq!(out.data["window"], "15m");

        let quiet = capability.execute(&json!({"token_address": "unknown-mint"})).await.unwrap();
        assert!(!quiet.success);

        let bad = capability
            .execute(&json!({"token_address": BONK_MINT, "timeframe": "2d"}))
            .await;
        assert!(matches!(bad, Err(AssistantError::InvalidCapabilityInput(_))));
    }

    #[tokio::test]
    async fn test_new_pumpfun_tokens_respects_min_trades() {
        let (_, registry) = registry();
        let capability = registry.get("new_pumpfun_tokens").unwrap();

        let out = capability.execute(&json!({})).await.unwrap();
        assert_eq!(out.message, "Found 1 Pump.fun tokens");

        let none = capability.execute(&json!({"min_trades": 100})).await.unwrap();
        assert!(none.success);
        assert_eq!(none.data["count"], 0);
        assert!(none.message.starts_with("No new Pump.fun tokens"));
    }

    #[tokio::test]
    async fn test_portfolio_pnl_totals() {
        let (_, registry) = registry();
        let out = registry
            .get("portfolio_pnl")
            .unwrap()
            .execute(&json!({"address": WALLET}))
            .await
            .unwrap();

        assert!(out.success);
        assert_eq!(out.data["total_pnl_usd"], 25.0);
        assert!(out.message.contains("+$25.00"));
    }

    #[tokio::test]
    async fn test_wallet_transactions_need_address() {
        let (gateway, registry) = registry();
        let capability = registry.get("wallet_transactions").unwrap();

        let out = capability.execute(&json!({"address": WALLET, "limit": 3})).await.unwrap();
        assert_eq!(out.data[0]["transfers"][0]["asset"], "SOL");
        assert_eq!(out.message, format!("Found 1 transactions for {}", WALLET));

        tokio_test::assert_err!(capability.execute(&json!({"limit": 3})).await);
        assert_eq!(gateway.calls("wallet_transactions"), 1);
    }
}
