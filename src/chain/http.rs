//! HTTP-backed chain gateway
//!
//! Solana JSON-RPC for balances, validators, stake accounts and
//! transactions; Jupiter for the token list, quotes and SPL prices;
//! CoinGecko for headline prices; DefiLlama for TVL; Venice for web-search
//! backed news digests; Bitquery for DEX activity; Zerion for wallet
//! analytics.

use super::{
    explorer_tx_url, AssetTransfer, AuctionInfo, ChainGateway, LaunchedToken, NetworkMetrics,
    NewsDigest, PortfolioPnl, PositionPnl, PressureWindow, ProposalSummary, ProtocolTvl,
    StakePosition, SwapQuote, SwapQuoteRequest, TokenBalance, TokenMetadata, TokenPressure,
    TokenPrice, TrendingToken, TransactionSummary, ValidatorInfo, WalletBalances, WalletTransaction,
    LAMPORTS_PER_SOL, SOL_MINT,
};
use crate::config::EndpointConfig;
use crate::error::AssistantError;
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
const STAKE_PROGRAM_ID: &str = "Stake11111111111111111111111111111111111111";
const TOP_PROTOCOLS: usize = 10;
const MAX_DEX_TOKENS: usize = 50;
const MAX_WALLET_TRANSACTIONS: usize = 100;
const PUMPFUN_PROTOCOLS: &[&str] = &["pump", "pump_amm", "pumpfun"];

const TRENDING_QUERY: &str = r#"query TrendingTokens($limit: Int!, $since: DateTime) {
  Solana(dataset: realtime) {
    DEXTradeByTokens(
      limit: {count: $limit}
      orderBy: {descending: buyers}
      where: {Block: {Time: {since: $since}}, Transaction: {Result: {Success: true}}}
    ) {
      Trade { Currency { Name Symbol MintAddress } PriceInUSD Dex { ProtocolName } }
      buyers: count(distinct: Trade_Account_Buyer)
      sellers: count(distinct: Trade_Account_Seller)
      trades: count
      volume: sum(of: Trade_Amount)
    }
  }
}"#;

const PUMPFUN_QUERY: &str = r#"query PumpFunNewTokens($limit: Int!, $protocols: [String!]) {
  Solana(dataset: realtime) {
    DEXTradeByTokens(
      limit: {count: $limit}
      orderBy: {descending: Block_Time}
      where: {Trade: {Dex: {ProtocolName: {in: $protocols}}}, Transaction: {Result: {Success: true}}}
    ) {
      Trade { Currency { Name Symbol MintAddress } PriceInUSD Amount Dex { ProtocolName } }
      Block { Time }
    }
  }
}"#;

const PRESSURE_QUERY: &str = r#"query TokenPressure($tokenAddress: String!, $since: DateTime) {
  Solana(dataset: realtime) {
    DEXTradeByTokens(
      where: {
        Trade: {Currency: {MintAddress: {is: $tokenAddress}}}
        Block: {Time: {since: $since}}
        Transaction: {Result: {Success: true}}
      }
    ) {
      buyVolume: sum(of: Trade_Amount, if: {Trade: {Side: {Type: {is: buy}}}})
      sellVolume: sum(of: Trade_Amount, if: {Trade: {Side: {Type: {is: sell}}}})
      buyers: count(distinct: Trade_Account_Buyer)
      sellers: count(distinct: Trade_Account_Seller)
      buyTrades: count(if: {Trade: {Side: {Type: {is: buy}}}})
      sellTrades: count(if: {Trade: {Side: {Type: {is: sell}}}})
      totalTrades: count
    }
  }
}"#;

/// Symbol → CoinGecko id for the tokens people ask about most
const COINGECKO_IDS: &[(&str, &str)] = &[
    ("SOL", "solana"),
    ("USDC", "usd-coin"),
    ("USDT", "tether"),
    ("BONK", "bonk"),
    ("JUP", "jupiter-exchange-solana"),
    ("RAY", "raydium"),
    ("ORCA", "orca"),
    ("PYTH", "pyth-network"),
    ("WIF", "dogwifcoin"),
    ("JTO", "jito-governance-token"),
    ("MSOL", "msol"),
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
];

const NEWS_INSTRUCTIONS: &str = "You are a research assistant. Search the web for the most recent \
Solana ecosystem news relevant to the user's request. Answer with a short bulleted digest, \
each bullet with a date when known.";

pub struct HttpChainGateway {
    client: Client,
    endpoints: EndpointConfig,
    token_list: OnceCell<Vec<TokenMetadata>>,
}

impl HttpChainGateway {
    pub fn new(endpoints: EndpointConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoints,
            token_list: OnceCell::new(),
        })
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self.client.get(url).send().await.map_err(|e| {
            AssistantError::Collaborator(format!("GET {} failed: {}", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssistantError::Collaborator(format!(
                "GET {} returned {}",
                url, status
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AssistantError::Collaborator(format!("Invalid JSON from {}: {}", url, e)))
    }

    async fn rpc(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.endpoints.solana_rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Collaborator(format!("RPC {} failed: {}", method, e)))?;

        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| AssistantError::Collaborator(format!("Invalid RPC response: {}", e)))?;

        if let Some(err) = payload.get("error") {
            return Err(AssistantError::Collaborator(format!(
                "RPC {} returned error: {}",
                method, err
            )));
        }

        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Rows of `Solana.DEXTradeByTokens` for a Bitquery GraphQL query
    async fn bitquery(&self, query: &str, variables: Value) -> Result<Vec<Value>> {
        let api_key = self.endpoints.bitquery_api_key.as_deref().ok_or_else(|| {
            AssistantError::Collaborator("BITQUERY_API_KEY is not configured".to_string())
        })?;

        let response = self
            .client
            .post(&self.endpoints.bitquery_url)
            .bearer_auth(api_key)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| AssistantError::Collaborator(format!("Bitquery request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AssistantError::Collaborator(format!(
                "Bitquery returned {}",
                response.status()
            )));
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|e| AssistantError::Collaborator(format!("Invalid Bitquery response: {}", e)))?;

        if let Some(err) = payload["errors"].as_array().and_then(|e| e.first()) {
            return Err(AssistantError::Collaborator(format!(
                "Bitquery query error: {}",
                err["message"].as_str().unwrap_or("unknown")
            )));
        }

        Ok(payload["data"]["Solana"]["DEXTradeByTokens"]
            .as_array()
            .cloned()
            .unwrap_or_default())
    }

    async fn zerion(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let api_key = self.endpoints.zerion_api_key.as_deref().ok_or_else(|| {
            AssistantError::Collaborator("ZERION_API_KEY is not configured".to_string())
        })?;

        let url = format!("{}{}", self.endpoints.zerion_url.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .basic_auth(api_key, Some(""))
            .query(params)
            .send()
            .await
            .map_err(|e| AssistantError::Collaborator(format!("Zerion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Collaborator(format!(
                "Zerion API error: {} - {}",
                status, body
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AssistantError::Collaborator(format!("Invalid Zerion response: {}", e)))
    }

    async fn tokens(&self) -> Result<&Vec<TokenMetadata>> {
        self.token_list
            .get_or_try_init(|| async {
                let raw = self.get_json(&self.endpoints.jupiter_token_list_url).await?;
                let entries: Vec<JupiterToken> = serde_json::from_value(raw)?;
                debug!(count = entries.len(), "Token list loaded");
                Ok::<_, AssistantError>(
                    entries
                        .into_iter()
                        .map(|t| TokenMetadata {
                            is_native: t.address == SOL_MINT,
                            symbol: t.symbol,
                            name: t.name,
                            mint: t.address,
                            decimals: t.decimals,
                        })
                        .collect(),
                )
            })
            .await
    }

    async fn prices_by_mint(&self, mints: &[String]) -> Result<HashMap<String, f64>> {
        if mints.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}?ids={}", self.endpoints.jupiter_price_url, mints.join(","));
        let raw = self.get_json(&url).await?;

        let mut prices = HashMap::new();
        if let Some(data) = raw.get("data").and_then(|d| d.as_object()) {
            for (mint, entry) in data {
                if let Some(price) = entry.get("price").and_then(number_like) {
                    prices.insert(mint.clone(), price);
                }
            }
        }
        Ok(prices)
    }
}

#[async_trait::async_trait]
impl ChainGateway for HttpChainGateway {
    async fn token_metadata(&self, symbol: &str) -> Result<Option<TokenMetadata>> {
        let wanted = symbol.trim().to_uppercase();
        if wanted == "SOL" {
            return Ok(Some(TokenMetadata::sol()));
        }

        let tokens = self.tokens().await?;
        Ok(tokens
            .iter()
            .find(|t| t.symbol.eq_ignore_ascii_case(&wanted))
            .cloned())
    }

    async fn balances(&self, address: &str) -> Result<WalletBalances> {
        let lamports = self
            .rpc("getBalance", json!([address]))
            .await?
            .get("value")
            .and_then(Value::as_u64)
            .unwrap_or(0);

        let accounts = self
            .rpc(
                "getTokenAccountsByOwner",
                json!([address, {"programId": TOKEN_PROGRAM_ID}, {"encoding": "jsonParsed"}]),
            )
            .await?;

        let symbols: HashMap<String, String> = match self.tokens().await {
            Ok(list) => list.iter().map(|t| (t.mint.clone(), t.symbol.clone())).collect(),
            Err(e) => {
                warn!(error = %e, "Token list unavailable; showing raw mints");
                HashMap::new()
            }
        };

        let mut spl = Vec::new();
        for entry in accounts.get("value").and_then(Value::as_array).into_iter().flatten() {
            let info = &entry["account"]["data"]["parsed"]["info"];
            let mint = info["mint"].as_str().unwrap_or_default().to_string();
            let amount = info["tokenAmount"]["uiAmount"].as_f64().unwrap_or(0.0);
            if mint.is_empty() || amount <= 0.0 {
                continue;
            }
            let symbol = symbols
                .get(&mint)
                .cloned()
                .unwrap_or_else(|| format!("{}…", &mint[..mint.len().min(6)]));
            spl.push((symbol, mint, amount));
        }

        let sol_price = match self.token_price("SOL").await {
            Ok(price) => price.map(|p| p.usd),
            Err(e) => {
                warn!(error = %e, "SOL price unavailable");
                None
            }
        };

        let mints: Vec<String> = spl.iter().map(|(_, mint, _)| mint.clone()).collect();
        let spl_prices = self.prices_by_mint(&mints).await.unwrap_or_else(|e| {
            warn!(error = %e, "SPL prices unavailable");
            HashMap::new()
        });

        let sol_amount = lamports as f64 / LAMPORTS_PER_SOL;
        let mut tokens = vec![TokenBalance {
            symbol: "SOL".to_string(),
            mint: SOL_MINT.to_string(),
            amount: sol_amount,
            usd_value: sol_price.map(|p| p * sol_amount),
        }];

        tokens.extend(spl.into_iter().map(|(symbol, mint, amount)| TokenBalance {
            usd_value: spl_prices.get(&mint).map(|p| p * amount),
            symbol,
            mint,
            amount,
        }));

        Ok(WalletBalances {
            address: address.to_string(),
            tokens,
        })
    }

    async fn token_price(&self, symbol: &str) -> Result<Option<TokenPrice>> {
        let wanted = symbol.trim().to_uppercase();

        if let Some((_, id)) = COINGECKO_IDS.iter().find(|(s, _)| *s == wanted) {
            let url = format!(
                "{}/simple/price?ids={}&vs_currencies=usd&include_market_cap=true&include_24hr_vol=true&include_24hr_change=true",
                self.endpoints.coingecko_url, id
            );
            let raw = self.get_json(&url).await?;
            let entry = &raw[*id];
            return Ok(entry["usd"].as_f64().map(|usd| TokenPrice {
                symbol: wanted.clone(),
                usd,
                change_24h_pct: entry["usd_24h_change"].as_f64(),
                market_cap_usd: entry["usd_market_cap"].as_f64(),
                volume_24h_usd: entry["usd_24h_vol"].as_f64(),
            }));
        }

        let Some(meta) = self.token_metadata(&wanted).await? else {
            return Ok(None);
        };

        let prices = self.prices_by_mint(&[meta.mint.clone()]).await?;
        Ok(prices.get(&meta.mint).map(|usd| TokenPrice {
            symbol: meta.symbol.clone(),
            usd: *usd,
            change_24h_pct: None,
            market_cap_usd: None,
            volume_24h_usd: None,
        }))
    }

    async fn swap_quote(&self, request: &SwapQuoteRequest) -> Result<SwapQuote> {
        let url = format!(
            "{}?inputMint={}&outputMint={}&amount={}&slippageBps={}",
            self.endpoints.jupiter_quote_url,
            request.input_mint,
            request.output_mint,
            request.amount,
            request.slippage_bps
        );
        let raw = self.get_json(&url).await?;
        let quote: JupiterQuote = serde_json::from_value(raw)
            .map_err(|e| AssistantError::Collaborator(format!("Unexpected quote shape: {}", e)))?;

        let labels: Vec<String> = quote
            .route_plan
            .iter()
            .filter_map(|step| step.swap_info.label.clone())
            .collect();

        Ok(SwapQuote {
            in_amount: quote.in_amount.parse().unwrap_or(request.amount),
            out_amount: quote.out_amount.parse().map_err(|_| {
                AssistantError::Collaborator(format!("Invalid outAmount: {}", quote.out_amount))
            })?,
            price_impact_pct: quote.price_impact_pct.parse().unwrap_or(0.0),
            route_label: if labels.is_empty() {
                "Jupiter".to_string()
            } else {
                labels.join(" → ")
            },
            slippage_bps: quote.slippage_bps.unwrap_or(request.slippage_bps),
        })
    }

    async fn validators(&self, limit: usize) -> Result<Vec<ValidatorInfo>> {
        let raw = self.rpc("getVoteAccounts", json!([])).await?;
        let accounts: VoteAccounts = serde_json::from_value(raw)
            .map_err(|e| AssistantError::Collaborator(format!("Unexpected vote accounts: {}", e)))?;

        let mut validators: Vec<ValidatorInfo> = accounts
            .current
            .into_iter()
            .map(|v| v.into_info(false))
            .chain(accounts.delinquent.into_iter().map(|v| v.into_info(true)))
            .collect();

        validators.sort_by(|a, b| {
            b.activated_stake_sol
                .partial_cmp(&a.activated_stake_sol)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        validators.truncate(limit);
        Ok(validators)
    }

    async fn stake_positions(&self, owner: &str) -> Result<Vec<StakePosition>> {
        let raw = self
            .rpc(
                "getProgramAccounts",
                json!([
                    STAKE_PROGRAM_ID,
                    {
                        "encoding": "jsonParsed",
                        "filters": [{"memcmp": {"offset": 12, "bytes": owner}}]
                    }
                ]),
            )
            .await?;

        let positions = raw
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|entry| {
                let pubkey = entry["pubkey"].as_str()?.to_string();
                let lamports = entry["account"]["lamports"].as_u64().unwrap_or(0);
                let parsed = &entry["account"]["data"]["parsed"];
                let delegation = &parsed["info"]["stake"]["delegation"];
                Some(StakePosition {
                    stake_account: pubkey,
                    validator: delegation["voter"].as_str().map(str::to_string),
                    amount_sol: lamports as f64 / LAMPORTS_PER_SOL,
                    state: parsed["type"].as_str().unwrap_or("unknown").to_string(),
                })
            })
            .collect();

        Ok(positions)
    }

    async fn network_metrics(&self) -> Result<NetworkMetrics> {
        let chains = self
            .get_json(&format!("{}/v2/chains", self.endpoints.defillama_url))
            .await?;
        let tvl_usd = chains
            .as_array()
            .into_iter()
            .flatten()
            .find(|c| c["name"].as_str() == Some("Solana"))
            .and_then(|c| c["tvl"].as_f64())
            .ok_or_else(|| AssistantError::Collaborator("Solana missing from chain list".to_string()))?;

        let protocols = self
            .get_json(&format!("{}/protocols", self.endpoints.defillama_url))
            .await?;

        let mut top: Vec<ProtocolTvl> = protocols
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|p| {
                let tvl = p["chainTvls"]["Solana"].as_f64()?;
                Some(ProtocolTvl {
                    name: p["name"].as_str()?.to_string(),
                    category: p["category"].as_str().map(str::to_string),
                    tvl_usd: tvl,
                })
            })
            .collect();

        top.sort_by(|a, b| b.tvl_usd.partial_cmp(&a.tvl_usd).unwrap_or(std::cmp::Ordering::Equal));
        top.truncate(TOP_PROTOCOLS);

        Ok(NetworkMetrics {
            chain: "Solana".to_string(),
            tvl_usd,
            top_protocols: top,
        })
    }

    async fn auction(&self, round: Option<u64>) -> Result<AuctionInfo> {
        let Some(base) = &self.endpoints.auction_api_url else {
            return Ok(AuctionInfo {
                round,
                status: "Coming Soon".to_string(),
                highest_bid_sol: None,
                ends_at: None,
                note: Some("Live auction data is not available yet. Stay tuned!".to_string()),
            });
        };

        let url = match round {
            Some(round) => format!("{}/auctions/{}", base.trim_end_matches('/'), round),
            None => format!("{}/auctions/latest", base.trim_end_matches('/')),
        };
        let raw = self.get_json(&url).await?;

        Ok(AuctionInfo {
            round: raw["round"].as_u64().or(round),
            status: raw["status"].as_str().unwrap_or("unknown").to_string(),
            highest_bid_sol: raw["highest_bid_sol"].as_f64(),
            ends_at: raw["ends_at"].as_str().map(str::to_string),
            note: None,
        })
    }

    async fn governance_proposals(&self, limit: usize) -> Result<Vec<ProposalSummary>> {
        // TODO: read live proposals from the Realms API once an indexer is chosen.
        Ok(std::iter::once(ProposalSummary::pending_integration())
            .take(limit)
            .collect())
    }

    async fn transaction(&self, signature: &str) -> Result<Option<TransactionSummary>> {
        let raw = self
            .rpc(
                "getTransaction",
                json!([signature, {"encoding": "json", "maxSupportedTransactionVersion": 0}]),
            )
            .await?;

        if raw.is_null() {
            return Ok(None);
        }

        Ok(Some(TransactionSummary {
            signature: signature.to_string(),
            slot: raw["slot"].as_u64().unwrap_or(0),
            block_time: raw["blockTime"].as_i64(),
            fee_lamports: raw["meta"]["fee"].as_u64().unwrap_or(0),
            succeeded: raw["meta"]["err"].is_null(),
            explorer_url: explorer_tx_url(signature),
        }))
    }

    async fn search_news(&self, query: &str) -> Result<NewsDigest> {
        let api_key = self.endpoints.venice_api_key.as_deref().ok_or_else(|| {
            AssistantError::Collaborator("VENICE_API_KEY is not configured".to_string())
        })?;

        let body = json!({
            "model": self.endpoints.venice_model,
            "messages": [
                {"role": "system", "content": NEWS_INSTRUCTIONS},
                {"role": "user", "content": query},
            ],
            "venice_parameters": {
                "enable_web_search": "on",
                "include_venice_system_prompt": false,
            },
        });

        let url = format!("{}/chat/completions", self.endpoints.venice_base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Collaborator(format!("News search failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AssistantError::Collaborator(format!(
                "News search returned {}",
                response.status()
            )));
        }

        let raw = response
            .json::<Value>()
            .await
            .map_err(|e| AssistantError::Collaborator(format!("Invalid news response: {}", e)))?;

        let summary = raw["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();

        let sources = raw["venice_parameters"]["web_search_citations"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|c| c["url"].as_str().map(str::to_string))
            .collect();

        Ok(NewsDigest { summary, sources })
    }

    async fn trending_tokens(&self, limit: usize, min_buyers: u64) -> Result<Vec<TrendingToken>> {
        let since = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
        let rows = self
            .bitquery(
                TRENDING_QUERY,
                json!({ "limit": limit.clamp(1, MAX_DEX_TOKENS), "since": since }),
            )
            .await?;

        Ok(rows
            .iter()
            .filter_map(trending_from_row)
            .filter(|t| t.buyers >= min_buyers)
            .collect())
    }

    async fn new_pumpfun_tokens(&self, limit: usize, min_trades: u64) -> Result<Vec<LaunchedToken>> {
        let rows = self
            .bitquery(
                PUMPFUN_QUERY,
                json!({ "limit": limit.clamp(1, MAX_DEX_TOKENS), "protocols": PUMPFUN_PROTOCOLS }),
            )
            .await?;

        let mut launched = group_launches(&rows);
        launched.retain(|t| t.trades >= min_trades);
        debug!(rows = rows.len(), tokens = launched.len(), "Pump.fun trades grouped");
        Ok(launched)
    }

    async fn token_pressure(&self, mint: &str, window: PressureWindow) -> Result<Option<TokenPressure>> {
        let since = (chrono::Utc::now() - chrono::Duration::minutes(window.minutes())).to_rfc3339();
        let rows = self
            .bitquery(PRESSURE_QUERY, json!({ "tokenAddress": mint, "since": since }))
            .await?;

        Ok(rows.first().and_then(|row| pressure_from_row(mint, window, row)))
    }

    async fn portfolio_pnl(&self, address: &str) -> Result<PortfolioPnl> {
        let raw = self
            .zerion(
                &format!("/wallets/{}/positions", address),
                &[
                    ("currency", "usd".to_string()),
                    ("filter[positions]", "only_simple".to_string()),
                ],
            )
            .await?;

        let positions = raw["data"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|position| {
                let attrs = &position["attributes"];
                let current = attrs["value"].as_f64().unwrap_or(0.0);
                let change = attrs["changes"]["absolute_1d"].as_f64().unwrap_or(0.0);
                PositionPnl {
                    asset: attrs["fungible_info"]["symbol"]
                        .as_str()
                        .unwrap_or("Unknown")
                        .to_string(),
                    invested_usd: current - change,
                    current_usd: current,
                }
            })
            .collect();

        Ok(PortfolioPnl {
            address: address.to_string(),
            positions,
        })
    }

    async fn wallet_transactions(&self, address: &str, limit: usize) -> Result<Vec<WalletTransaction>> {
        let raw = self
            .zerion(
                &format!("/wallets/{}/transactions", address),
                &[
                    ("currency", "usd".to_string()),
                    (
                        "page[size]",
                        limit.clamp(1, MAX_WALLET_TRANSACTIONS).to_string(),
                    ),
                ],
            )
            .await?;

        Ok(raw["data"]
            .as_array()
            .into_iter()
            .flatten()
            .map(transaction_from_zerion)
            .collect())
    }
}

fn text_or(value: &Value, fallback: &str) -> String {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn count(value: &Value) -> u64 {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(0)
}

fn trending_from_row(row: &Value) -> Option<TrendingToken> {
    let trade = &row["Trade"];
    Some(TrendingToken {
        mint: trade["Currency"]["MintAddress"].as_str()?.to_string(),
        name: text_or(&trade["Currency"]["Name"], "Unknown"),
        symbol: text_or(&trade["Currency"]["Symbol"], "N/A"),
        price_usd: number_like(&trade["PriceInUSD"]).unwrap_or(0.0),
        dex: text_or(&trade["Dex"]["ProtocolName"], "unknown"),
        buyers: count(&row["buyers"]),
        sellers: count(&row["sellers"]),
        trades: count(&row["trades"]),
        volume: number_like(&row["volume"]).unwrap_or(0.0),
    })
}

/// One entry per mint, keeping the newest trade's price and time
fn group_launches(rows: &[Value]) -> Vec<LaunchedToken> {
    let mut launched: Vec<LaunchedToken> = Vec::new();
    for row in rows {
        let trade = &row["Trade"];
        let Some(mint) = trade["Currency"]["MintAddress"].as_str() else {
            continue;
        };
        let amount = number_like(&trade["Amount"]).unwrap_or(0.0);

        match launched.iter_mut().find(|t| t.mint == mint) {
            Some(existing) => {
                existing.trades += 1;
                existing.volume += amount;
            }
            None => launched.push(LaunchedToken {
                name: text_or(&trade["Currency"]["Name"], "Unknown"),
                symbol: text_or(&trade["Currency"]["Symbol"], "N/A"),
                mint: mint.to_string(),
                price_usd: number_like(&trade["PriceInUSD"]).unwrap_or(0.0),
                launched_at: text_or(&row["Block"]["Time"], ""),
                platform: text_or(&trade["Dex"]["ProtocolName"], "pump"),
                trades: 1,
                volume: amount,
            }),
        }
    }
    // RFC 3339 timestamps in one zone sort lexically
    launched.sort_by(|a, b| b.launched_at.cmp(&a.launched_at));
    launched
}

fn pressure_from_row(mint: &str, window: PressureWindow, row: &Value) -> Option<TokenPressure> {
    let total_trades = count(&row["totalTrades"]);
    if total_trades == 0 {
        return None;
    }
    Some(TokenPressure {
        mint: mint.to_string(),
        window,
        buy_volume: number_like(&row["buyVolume"]).unwrap_or(0.0),
        sell_volume: number_like(&row["sellVolume"]).unwrap_or(0.0),
        buyers: count(&row["buyers"]),
        sellers: count(&row["sellers"]),
        buy_trades: count(&row["buyTrades"]),
        sell_trades: count(&row["sellTrades"]),
        total_trades,
    })
}

fn transaction_from_zerion(tx: &Value) -> WalletTransaction {
    let attrs = &tx["attributes"];
    WalletTransaction {
        hash: text_or(&attrs["hash"], tx["id"].as_str().unwrap_or_default()),
        kind: text_or(&attrs["operation_type"], "unknown"),
        status: text_or(&attrs["status"], "unknown"),
        timestamp: attrs["mined_at"].as_str().map(str::to_string),
        fee_usd: attrs["fee"]["value"].as_f64().unwrap_or(0.0),
        chain: text_or(&tx["relationships"]["chain"]["data"]["id"], "unknown"),
        transfers: attrs["transfers"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|t| AssetTransfer {
                from: t["sender"].as_str().map(str::to_string),
                to: t["recipient"].as_str().map(str::to_string),
                asset: t["fungible_info"]["symbol"]
                    .as_str()
                    .or_else(|| t["nft_info"]["name"].as_str())
                    .unwrap_or("Unknown")
                    .to_string(),
                quantity: number_like(&t["quantity"]["numeric"]).unwrap_or(0.0),
                value_usd: t["value"].as_f64().unwrap_or(0.0),
            })
            .collect(),
    }
}

fn number_like(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

#[derive(Debug, Deserialize)]
struct JupiterToken {
    address: String,
    symbol: String,
    #[serde(default)]
    name: String,
    decimals: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JupiterQuote {
    in_amount: String,
    out_amount: String,
    #[serde(default)]
    price_impact_pct: String,
    slippage_bps: Option<u16>,
    #[serde(default)]
    route_plan: Vec<RoutePlanStep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutePlanStep {
    swap_info: SwapInfo,
}

#[derive(Debug, Deserialize)]
struct SwapInfo {
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoteAccounts {
    #[serde(default)]
    current: Vec<VoteAccount>,
    #[serde(default)]
    delinquent: Vec<VoteAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteAccount {
    vote_pubkey: String,
    node_pubkey: String,
    commission: u8,
    activated_stake: u64,
}

impl VoteAccount {
    fn into_info(self, delinquent: bool) -> ValidatorInfo {
        ValidatorInfo {
            vote_account: self.vote_pubkey,
            node_account: self.node_pubkey,
            commission: self.commission,
            activated_stake_sol: self.activated_stake as f64 / LAMPORTS_PER_SOL,
            delinquent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_shape_parses() {
        let raw = json!({
            "inAmount": "50000000000",
            "outAmount": "7512345678",
            "priceImpactPct": "0.0012",
            "slippageBps": 50,
            "routePlan": [
                {"swapInfo": {"label": "Whirlpool"}},
                {"swapInfo": {"label": "Raydium"}}
            ]
        });
        let quote: JupiterQuote = serde_json::from_value(raw).unwrap();
        assert_eq!(quote.route_plan.len(), 2);
        assert_eq!(quote.out_amount, "7512345678");
    }

    #[test]
    fn test_vote_account_conversion() {
        let raw = json!({
            "current": [{"votePubkey": "v1", "nodePubkey": "n1", "commission": 7, "activatedStake": 2_000_000_000u64}],
            "delinquent": []
        });
        let accounts: VoteAccounts = serde_json::from_value(raw).unwrap();
        let info = accounts.current.into_iter().next().unwrap().into_info(false);
        assert_eq!(info.activated_stake_sol, 2.0);
        assert_eq!(info.commission, 7);
        assert!(!info.delinquent);
    }

    #[test]
    fn test_number_like_accepts_strings() {
        assert_eq!(number_like(&json!("1.25")), Some(1.25));
        assert_eq!(number_like(&json!(3.0)), Some(3.0));
        assert_eq!(number_like(&json!(null)), None);
    }

    #[tokio::test]
    async fn test_auction_placeholder_without_feed() {
        let gateway = HttpChainGateway::new(EndpointConfig::default(), Duration::from_secs(1)).unwrap();
        let info = gateway.auction(Some(4)).await.unwrap();
        assert_eq!(info.round, Some(4));
        assert_eq!(info.status, "Coming Soon");
    }

    #[test]
    fn test_pumpfun_rows_group_by_mint() {
        let rows = vec![
            json!({"Trade": {"Currency": {"Name": "Cat", "Symbol": "CAT", "MintAddress": "m1"}, "PriceInUSD": 0.002, "Amount": "100", "Dex": {"ProtocolName": "pump"}}, "Block": {"Time": "2025-01-01T00:00:05Z"}}),
            json!({"Trade": {"Currency": {"Name": "", "Symbol": "", "MintAddress": "m2"}, "PriceInUSD": 0.01, "Amount": 5, "Dex": {"ProtocolName": "pump_amm"}}, "Block": {"Time": "2025-01-01T00:00:09Z"}}),
            json!({"Trade": {"Currency": {"Name": "Cat", "Symbol": "CAT", "MintAddress": "m1"}, "PriceInUSD": 0.001, "Amount": 50, "Dex": {"ProtocolName": "pump"}}, "Block": {"Time": "2025-01-01T00:00:01Z"}}),
        ];
        let launched = group_launches(&rows);
        assert_eq!(launched.len(), 2);
        assert_eq!(launched[0].mint, "m2");
        assert_eq!(launched[0].name, "Unknown");
        assert_eq!(launched[0].symbol, "N/A");
        assert_eq!(launched[1].trades, 2);
        assert_eq!(launched[1].volume, 150.0);
        assert_eq!(launched[1].price_usd, 0.002);
    }

    #[test]
    fn test_pressure_row_without_trades_is_none() {
        let quiet = json!({"buyVolume": 0, "sellVolume": 0, "totalTrades": "0"});
        assert!(pressure_from_row("m", PressureWindow::OneHour, &quiet).is_none());

        let busy = json!({"buyVolume": "75", "sellVolume": 25.0, "buyers": 9, "sellers": "3", "buyTrades": 12, "sellTrades": 4, "totalTrades": 16});
        let pressure = pressure_from_row("m", PressureWindow::FiveMinutes, &busy).unwrap();
        assert_eq!(pressure.buy_pressure_pct(), 75.0);
        assert_eq!(pressure.sellers, 3);
        assert_eq!(pressure.window, PressureWindow::FiveMinutes);
    }

    #[test]
    fn test_zerion_transaction_decoding() {
        let raw = json!({
            "id": "tx-1",
            "attributes": {
                "operation_type": "trade",
                "status": "confirmed",
                "mined_at": "2025-01-01T00:00:00Z",
                "fee": {"value": 0.0012},
                "transfers": [
                    {"sender": "a", "recipient": "b", "fungible_info": {"symbol": "SOL"}, "quantity": {"numeric": "1.5"}, "value": 225.0},
                    {"recipient": "a", "nft_info": {"name": "Mad Lad #1"}, "quantity": {"numeric": "1"}}
                ]
            },
            "relationships": {"chain": {"data": {"id": "solana"}}}
        });
        let tx = transaction_from_zerion(&raw);
        assert_eq!(tx.hash, "tx-1");
        assert_eq!(tx.kind, "trade");
        assert_eq!(tx.chain, "solana");
        assert_eq!(tx.transfers[0].quantity, 1.5);
        assert_eq!(tx.transfers[1].asset, "Mad Lad #1");
        assert!(tx.transfers[1].from.is_none());
    }

    #[tokio::test]
    async fn test_governance_is_single_placeholder() {
        let gateway = HttpChainGateway::new(EndpointConfig::default(), Duration::from_secs(1)).unwrap();
        let proposals = gateway.governance_proposals(10).await.unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].status, "Pending Integration");
        assert!(proposals[0].title.contains("coming soon"));
    }

    #[tokio::test]
    async fn test_market_services_require_keys() {
        let gateway = HttpChainGateway::new(EndpointConfig::default(), Duration::from_secs(1)).unwrap();
        let trending = gateway.trending_tokens(10, 5).await;
        assert!(matches!(trending, Err(AssistantError::Collaborator(ref m)) if m.contains("BITQUERY")));
        let pnl = gateway.portfolio_pnl("wallet").await;
        assert!(matches!(pnl, Err(AssistantError::Collaborator(ref m)) if m.contains("ZERION")));
    }

    #[tokio::test]
    async fn test_news_requires_key() {
        let gateway = HttpChainGateway::new(EndpointConfig::default(), Duration::from_secs(1)).unwrap();
        let result = gateway.search_news("solana").await;
        assert!(matches!(result, Err(AssistantError::Collaborator(_))));
    }
}
