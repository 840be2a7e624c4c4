//! Persona Router
//!
//! Free-form messages that no task handler owns are answered by one of a
//! few personas. Selection is an ordered rule table: the first rule whose
//! predicate holds wins, and no match falls back to the general persona.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    Solpilot,
    Sonia,
    Zerion,
    Venice,
}

impl Persona {
    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Solpilot => "solpilot",
            Persona::Sonia => "sonia",
            Persona::Zerion => "zerion",
            Persona::Venice => "venice",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "solpilot" => Some(Persona::Solpilot),
            "sonia" => Some(Persona::Sonia),
            "zerion" => Some(Persona::Zerion),
            "venice" | "venicia" => Some(Persona::Venice),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Persona::Solpilot => "Solpilot",
            Persona::Sonia => "Sonia",
            Persona::Zerion => "Zerion",
            Persona::Venice => "Venice",
        }
    }

    /// Names of the capabilities this persona may call
    pub fn capabilities(&self) -> &'static [&'static str] {
        match self {
            Persona::Solpilot => &[
                "balance_lookup",
                "price_lookup",
                "swap_quote",
                "validator_list",
                "network_metrics",
                "auction_info",
                "token_search",
            ],
            Persona::Sonia => &[
                "price_lookup",
                "token_search",
                "network_metrics",
                "trending_tokens",
                "token_pressure",
                "new_pumpfun_tokens",
            ],
            Persona::Zerion => &[
                "balance_lookup",
                "price_lookup",
                "token_search",
                "portfolio_pnl",
                "wallet_transactions",
            ],
            Persona::Venice => &["news_search", "price_lookup"],
        }
    }

    /// System instructions handed to the completion engine
    pub fn instructions(&self) -> &'static str {
        match self {
            Persona::Solpilot => SOLPILOT_INSTRUCTIONS,
            Persona::Sonia => SONIA_INSTRUCTIONS,
            Persona::Zerion => ZERION_INSTRUCTIONS,
            Persona::Venice => VENICE_INSTRUCTIONS,
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SOLPILOT_INSTRUCTIONS: &str = r#"You are Solpilot, a friendly assistant for the Solana blockchain.

Guidelines:
- Answer questions about Solana, its ecosystem, wallets, staking and DeFi
- Use the available tools for live balances, prices, quotes, validators and metrics
- Never claim to have moved funds; transfers, swaps and stakes are confirmed by the user in the app
- When a wallet address is provided as context, use it for wallet-specific questions
- Be concise and format numbers clearly"#;

const SONIA_INSTRUCTIONS: &str = r#"You are Sonia, a sharp token analyst focused on Solana tokens.

Guidelines:
- Analyse tokens using live prices, market data and ecosystem metrics from your tools
- Discuss trends, buy and sell pressure, and new or trending launches with clear caveats
- Never give guaranteed predictions; highlight risk
- Keep answers structured and brief"#;

const ZERION_INSTRUCTIONS: &str = r#"You are Zerion, a portfolio analytics assistant for Solana wallets.

Guidelines:
- Explain balances, holdings, positions and profit or loss for the user's wallet
- Always look up live balances and prices with your tools before answering
- If no wallet address is available, ask the user to connect one
- Present holdings as short lists with USD values"#;

const VENICE_INSTRUCTIONS: &str = r#"You are Venice, a research assistant for Solana news.

Guidelines:
- Use the news search tool to find recent announcements, partnerships and updates
- Summarise findings with dates and sources when available
- Separate facts from speculation"#;

/// One row of the routing table
pub struct RoutingRule {
    pub name: &'static str,
    pub persona: Persona,
    pub matches: fn(&str) -> bool,
}

const ZERION_TERMS: &[&str] = &[
    "portfolio", "my balance", "my wallet", "transaction history", "pnl", "profit", "loss",
    "defi position", "my nft",
];

const VENICE_TERMS: &[&str] = &[
    "news", "research", "latest update", "what happened", "partnership", "announcement",
];

const VENICE_GUARDS: &[&str] = &["auction", "price", "swap", "buy", "sell", "token", "pump"];

const SONIA_MARKET_TERMS: &[&str] = &[
    "pump.fun", "pumpfun", "pump fun", "buy pressure", "sell pressure", "buy/sell",
];

fn any_of(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| text.contains(t))
}

fn wants_portfolio_analytics(text: &str) -> bool {
    any_of(text, ZERION_TERMS)
}

fn wants_news(text: &str) -> bool {
    any_of(text, VENICE_TERMS) && !any_of(text, VENICE_GUARDS)
}

fn wants_token_analysis(text: &str) -> bool {
    text.contains("token") && (text.contains("analyze") || text.contains("analysis"))
}

fn wants_token_market(text: &str) -> bool {
    any_of(text, SONIA_MARKET_TERMS)
        || (text.contains("token")
            && (text.contains("new") || text.contains("latest") || text.contains("trending")))
}

/// Evaluated top to bottom; first hit wins.
pub const ROUTING_RULES: &[RoutingRule] = &[
    RoutingRule {
        name: "portfolio-analytics",
        persona: Persona::Zerion,
        matches: wants_portfolio_analytics,
    },
    RoutingRule {
        name: "news-research",
        persona: Persona::Venice,
        matches: wants_news,
    },
    RoutingRule {
        name: "token-analysis",
        persona: Persona::Sonia,
        matches: wants_token_analysis,
    },
    RoutingRule {
        name: "token-market",
        persona: Persona::Sonia,
        matches: wants_token_market,
    },
];

pub struct PersonaRouter {
    rules: &'static [RoutingRule],
    fallback: Persona,
}

impl PersonaRouter {
    pub fn new() -> Self {
        Self {
            rules: ROUTING_RULES,
            fallback: Persona::Solpilot,
        }
    }

    pub fn select(&self, message: &str) -> Persona {
        let text = message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| (rule.matches)(&text))
            .map(|rule| {
                tracing::debug!(rule = rule.name, persona = %rule.persona, "Persona rule matched");
                rule.persona
            })
            .unwrap_or(self.fallback)
    }
}

impl Default for PersonaRouter {
    fn default() -> Self {
        Self::new()
    }
}
