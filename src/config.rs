//! Runtime configuration
//!
//! Everything is read once from the environment (after `.env` is loaded by the
//! binary) and handed down as plain values; no component reads `env` itself.

use crate::error::AssistantError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_TOOL_STEPS: usize = 5;
pub const DEFAULT_HISTORY_WINDOW: usize = 5;
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub database_url: Option<String>,
    pub endpoints: EndpointConfig,
    pub limits: LimitConfig,
}

/// Base URLs of the chain collaborators
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    pub solana_rpc_url: String,
    pub jupiter_quote_url: String,
    pub jupiter_token_list_url: String,
    pub jupiter_price_url: String,
    pub coingecko_url: String,
    pub defillama_url: String,
    pub venice_base_url: String,
    pub venice_api_key: Option<String>,
    pub venice_model: String,
    pub auction_api_url: Option<String>,
    pub bitquery_url: String,
    pub bitquery_api_key: Option<String>,
    pub zerion_url: String,
    pub zerion_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LimitConfig {
    pub max_tool_steps: usize,
    pub history_window: usize,
    pub capability_timeout: Duration,
    pub completion_timeout: Duration,
    pub title_timeout: Duration,
    /// Live sessions untouched this long are dropped from memory
    pub session_idle_ttl: Duration,
    /// Tool-loop runs kept in the audit log before the oldest is dropped
    pub audit_capacity: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            solana_rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            jupiter_quote_url: "https://quote-api.jup.ag/v6/quote".to_string(),
            jupiter_token_list_url: "https://token.jup.ag/strict".to_string(),
            jupiter_price_url: "https://api.jup.ag/price/v2".to_string(),
            coingecko_url: "https://api.coingecko.com/api/v3".to_string(),
            defillama_url: "https://api.llama.fi".to_string(),
            venice_base_url: "https://api.venice.ai/api/v1".to_string(),
            venice_api_key: None,
            venice_model: "llama-3.3-70b".to_string(),
            auction_api_url: None,
            bitquery_url: "https://streaming.bitquery.io/eap".to_string(),
            bitquery_api_key: None,
            zerion_url: "https://api.zerion.io/v1".to_string(),
            zerion_api_key: None,
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_tool_steps: DEFAULT_MAX_TOOL_STEPS,
            history_window: DEFAULT_HISTORY_WINDOW,
            capability_timeout: Duration::from_secs(10),
            completion_timeout: Duration::from_secs(30),
            title_timeout: Duration::from_secs(10),
            session_idle_ttl: Duration::from_secs(30 * 60),
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = EndpointConfig::default();
        let limit_defaults = LimitConfig::default();

        let port = match optional("PORT").or_else(|| optional("API_PORT")) {
            Some(raw) => parse_value("PORT", &raw)?,
            None => 8080,
        };

        let endpoints = EndpointConfig {
            solana_rpc_url: optional("SOLANA_RPC_URL").unwrap_or(defaults.solana_rpc_url),
            jupiter_quote_url: optional("JUPITER_QUOTE_URL").unwrap_or(defaults.jupiter_quote_url),
            jupiter_token_list_url: optional("JUPITER_TOKEN_LIST_URL")
                .unwrap_or(defaults.jupiter_token_list_url),
            jupiter_price_url: optional("JUPITER_PRICE_URL").unwrap_or(defaults.jupiter_price_url),
            coingecko_url: optional("COINGECKO_URL").unwrap_or(defaults.coingecko_url),
            defillama_url: optional("DEFILLAMA_URL").unwrap_or(defaults.defillama_url),
            venice_base_url: optional("VENICE_BASE_URL").unwrap_or(defaults.venice_base_url),
            venice_api_key: optional("VENICE_API_KEY"),
            venice_model: optional("VENICE_MODEL").unwrap_or(defaults.venice_model),
            auction_api_url: optional("AUCTION_API_URL"),
            bitquery_url: optional("BITQUERY_API_URL").unwrap_or(defaults.bitquery_url),
            bitquery_api_key: optional("BITQUERY_API_KEY"),
            zerion_url: optional("ZERION_API_URL").unwrap_or(defaults.zerion_url),
            zerion_api_key: optional("ZERION_API_KEY"),
        };

        let limits = LimitConfig {
            max_tool_steps: parse_or("MAX_TOOL_STEPS", limit_defaults.max_tool_steps)?,
            history_window: parse_or("HISTORY_WINDOW", limit_defaults.history_window)?,
            capability_timeout: seconds_or("CAPABILITY_TIMEOUT_SECS", limit_defaults.capability_timeout)?,
            completion_timeout: seconds_or("COMPLETION_TIMEOUT_SECS", limit_defaults.completion_timeout)?,
            title_timeout: seconds_or("TITLE_TIMEOUT_SECS", limit_defaults.title_timeout)?,
            session_idle_ttl: seconds_or("SESSION_IDLE_TTL_SECS", limit_defaults.session_idle_ttl)?,
            audit_capacity: parse_or("AUDIT_CAPACITY", limit_defaults.audit_capacity)?,
        };

        if limits.audit_capacity == 0 {
            return Err(AssistantError::Config(
                "AUDIT_CAPACITY must be at least 1".to_string(),
            ));
        }

        if limits.max_tool_steps == 0 {
            return Err(AssistantError::Config(
                "MAX_TOOL_STEPS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            port,
            gemini_api_key: optional("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: optional("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            database_url: optional("POSTGRES_URL").or_else(|| optional("DATABASE_URL")),
            endpoints,
            limits,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| AssistantError::Config(format!("{} has an invalid value: {:?}", key, raw)))
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match optional(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn seconds_or(key: &str, default: Duration) -> Result<Duration> {
    match optional(key) {
        Some(raw) => parse_value::<u64>(key, &raw).map(Duration::from_secs),
        None => Ok(default),
    }
}
