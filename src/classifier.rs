//! Intent Classifier
//!
//! Maps a raw user message onto one intent of a fixed catalogue by counting
//! keyword phrases. Deterministic and allocation-light; no model involved.
//!
//! Scoring per phrase found (case-insensitive):
//! - on word boundaries: `2 × words(phrase)`
//! - only inside a larger word: `1 × words(phrase)`
//! - phrases of two characters or fewer only count on word boundaries
//!
//! The highest total wins, ties go to the intent declared first, and a
//! message with no hits at all falls back to [`IntentId::Default`].

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IntentId {
    SwapToken,
    StakeSol,
    PlaceBid,
    SendToken,
    GetPrice,
    GetLatestAuction,
    GetAuction,
    TxSearch,
    UnstakeSol,
    FetchMyPortfolio,
    FetchUserPortfolio,
    AnalyzeToken,
    SearchSolanaNews,
    ForbiddenTopics,
    TalkBetweenAgents,
    GetMetrics,
    GetGovernanceProposals,
    Default,
}

impl IntentId {
    pub fn as_str(&self) -> &'static str {
        catalogue_entry(*self).name
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalogue entry
#[derive(Debug)]
pub struct Intent {
    pub id: IntentId,
    pub name: &'static str,
    pub description: &'static str,
    pub examples: &'static [&'static str],
    pub keywords: &'static [&'static str],
}

/// Declaration order is the tie-break order.
pub const INTENTS: &[Intent] = &[
    Intent {
        id: IntentId::SwapToken,
        name: "swap_token",
        description: "Executes a token swap using Jupiter routes.",
        examples: &["I want to trade SOL for USDT.", "Swap 50 SOL to BNB.", "Convert my SOL into ETH."],
        keywords: &[
            "swap", "exchange", "convert", "trade", "swap tokens", "exchange tokens",
            "convert tokens", "trade tokens", "swap SOL", "swap to USDT", "trade for",
            "convert my", "exchange my", "where can I swap", "how to swap",
        ],
    },
    Intent {
        id: IntentId::StakeSol,
        name: "stake_sol",
        description: "Provides staking information for Solana (SOL).",
        examples: &["I want to stake my SOL tokens for rewards.", "How do I delegate SOL?"],
        keywords: &[
            "stake", "staking", "earn rewards", "delegate", "validator", "stake SOL",
            "staking rewards", "staking pool",
        ],
    },
    Intent {
        id: IntentId::PlaceBid,
        name: "place_bid",
        description: "Places a bid in the latest Solana burn auction.",
        examples: &["I want to place a bid for the latest burn auction.", "Place a bid for me in the latest auction."],
        keywords: &[
            "bid", "place bid", "burn auction", "latest auction bid", "join auction",
            "participate auction", "Solana auction bid", "current auction bid",
            "bidding in auction", "auction entry",
        ],
    },
    Intent {
        id: IntentId::SendToken,
        name: "send_token",
        description: "Handles token transfers to another Solana address.",
        examples: &["Send 5 SOL to my friend.", "Transfer SOL to this wallet."],
        keywords: &[
            "send", "transfer", "move", "send SOL", "transfer USDT", "send funds",
            "move tokens", "send crypto", "send to address",
        ],
    },
    Intent {
        id: IntentId::GetPrice,
        name: "get_price",
        description: "Fetches the estimated USD price for a given token on Solana.",
        examples: &["What is the current price of SOL?", "How much is 1 SOL worth in USDT?"],
        keywords: &["price", "current value", "worth", "token price", "how much is"],
    },
    Intent {
        id: IntentId::GetLatestAuction,
        name: "get_latest_auction",
        description: "Fetches and displays the latest auction on Solana.",
        examples: &["Show me the newest Solana auction.", "Fetch the latest Solana auction details."],
        keywords: &[
            "auction", "Solana auction", "latest auction", "current auction", "new auction",
            "Solana bidding", "auction event", "bidding round", "active auction", "auction update",
        ],
    },
    Intent {
        id: IntentId::GetAuction,
        name: "get_auction",
        description: "Fetches auction details for a specific auction round.",
        examples: &["Show me the auction info from round 5.", "What happened in auction round 7?"],
        keywords: &[
            "auction round", "specific auction", "auction number", "auction details",
            "auction info", "bidding round", "round of auction", "auction at round",
        ],
    },
    Intent {
        id: IntentId::TxSearch,
        name: "tx_search",
        description: "Searches for a transaction on the Solana explorer.",
        examples: &["Find this transaction hash on Solana."],
        keywords: &["tx", "transaction", "hash", "explorer", "txid", "transaction ID"],
    },
    Intent {
        id: IntentId::UnstakeSol,
        name: "unstake_sol",
        description: "Unstakes SOL from a validator.",
        examples: &["I want to unstake my SOL tokens.", "Withdraw my SOL from staking."],
        keywords: &[
            "unstake", "unstaking", "undelegate", "withdraw stake", "unstake SOL", "remove stake",
            "stop staking", "withdraw staked SOL", "unstake my tokens", "how to unstake",
            "unstake from validator", "unstake rewards", "withdraw from staking", "exit staking",
        ],
    },
    Intent {
        id: IntentId::FetchMyPortfolio,
        name: "fetch_my_portfolio",
        description: "Retrieves the connected wallet's own balances.",
        examples: &["Check my wallet balance.", "What assets do I currently hold?"],
        keywords: &[
            "my balance", "my wallet balance", "my portfolio", "my funds", "check my balance",
            "how much SOL do I have", "show my holdings", "fetch my assets",
            "retrieve my portfolio", "my Solana tokens", "list my tokens", "my Solana wallet",
            "check my funds",
        ],
    },
    Intent {
        id: IntentId::FetchUserPortfolio,
        name: "fetch_user_portfolio",
        description: "Retrieves balances and asset distribution of any Solana address.",
        examples: &["What assets does this Solana wallet hold?", "Show me the token distribution for this address."],
        keywords: &[
            "portfolio", "holdings", "wallet assets", "token balances", "show portfolio",
            "fetch holdings", "Solana wallet details", "wallet portfolio", "asset overview",
            "retrieve portfolio", "this user", "this address", "full wallet details",
            "token distribution", "analyze holdings", "portfolio analysis",
            "fetch address portfolio", "another wallet", "Solana address assets", "wallet scan",
        ],
    },
    Intent {
        id: IntentId::AnalyzeToken,
        name: "analyze_token",
        description: "Analyses a token: price, market data and liquidity.",
        examples: &["Analyze SOL for me.", "Show me the liquidity and volume of NINJA."],
        keywords: &[
            "analyze", "analysis", "market trends", "token insights", "price analysis",
            "liquidity", "volume", "market cap", "supply", "token metrics", "SOL analysis",
            "detailed report on", "what is happening with",
        ],
    },
    Intent {
        id: IntentId::SearchSolanaNews,
        name: "search_solana_news",
        description: "Finds the latest Solana news.",
        examples: &["What's the latest news about Solana?"],
        keywords: &[
            "Solana news", "latest Solana updates", "Solana twitter", "recent Solana posts",
            "Solana social media", "news", "updates",
        ],
    },
    Intent {
        id: IntentId::ForbiddenTopics,
        name: "forbidden_topics",
        description: "Detects and restricts discussions on prohibited topics.",
        examples: &["How do I write a Python script?", "Tell me about AI and machine learning."],
        keywords: &[
            "code", "programming", "script", "AI", "machine learning", "stock market",
            "finance", "Bitcoin", "Ethereum", "Solana", "crypto outside Solana", "trading bots",
            "automated trading", "smart contract outside Solana", "blockchain other than Solana",
            "ML", "chatbot development", "OpenAI", "Llama", "GPT",
        ],
    },
    Intent {
        id: IntentId::TalkBetweenAgents,
        name: "talk_between_agents",
        description: "Starts a multi-turn conversation between Solpilot and Sonia.",
        examples: &["Let Solpilot and Sonia have a debate about Solana."],
        keywords: &[
            "talk", "discuss", "debate", "chat", "conversation", "between Solpilot and Sonia",
            "Solpilot and Sonia talk", "make Solpilot talk to Sonia", "make Sonia reply",
            "tell a joke about Sonia", "what does Solpilot think of", "what does Sonia think of",
        ],
    },
    Intent {
        id: IntentId::GetMetrics,
        name: "get_metrics",
        description: "Fetches Solana ecosystem TVL and top protocols.",
        examples: &["Show me the total TVL of Solana.", "List the top protocols on Solana by TVL."],
        keywords: &[
            "TVL", "Solana TVL", "total value locked", "protocol TVL", "top TVL protocols",
            "Solana ecosystem TVL", "defi TVL", "biggest protocols by TVL", "tvl details",
            "Solana defi rankings",
        ],
    },
    Intent {
        id: IntentId::GetGovernanceProposals,
        name: "get_governance_proposals",
        description: "Fetches recent Solana governance proposals.",
        examples: &["Show me the Solana governance proposals.", "List current proposals."],
        keywords: &[
            "proposal", "proposals", "governance", "Solana governance", "latest proposals",
            "recent proposals", "active proposals", "governance update", "governance list",
            "Solana proposals", "governance activity", "see proposals", "get proposals",
            "show proposals", "fetch proposals", "display proposals", "proposals of Solana",
            "current proposals", "governance overview",
        ],
    },
    Intent {
        id: IntentId::Default,
        name: "default",
        description: "General Solana questions, greetings and polite interactions.",
        examples: &["Hey there!", "Tell me about Solana.", "Thanks for your help!"],
        keywords: &[
            "Solana", "blockchain", "crypto basics", "how does Solana work", "explain Solana",
            "what is Solana", "learn about Solana", "getting started with Solana",
            "understanding Solana", "tell me about Solana", "why use Solana",
            "benefits of Solana", "hello", "hi", "hey", "good morning", "good evening",
            "what's up", "thank you", "thanks", "appreciate it", "grateful", "cheers",
        ],
    },
];

fn catalogue_entry(id: IntentId) -> &'static Intent {
    // The catalogue is exhaustive over IntentId; Default is last.
    INTENTS
        .iter()
        .find(|intent| intent.id == id)
        .unwrap_or(&INTENTS[INTENTS.len() - 1])
}

/// Intent classifier
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn classify(message: &str) -> IntentId {
        let scores = Self::scores(message);

        let mut best: Option<(IntentId, usize)> = None;
        for (id, score) in scores {
            // Strict comparison keeps the earlier declaration on ties.
            if score > 0 && best.map_or(true, |(_, top)| score > top) {
                best = Some((id, score));
            }
        }

        best.map(|(id, _)| id).unwrap_or(IntentId::Default)
    }

    /// Per-intent scores in declaration order
    pub fn scores(message: &str) -> Vec<(IntentId, usize)> {
        let text = normalize(message);
        INTENTS
            .iter()
            .map(|intent| {
                let score = intent
                    .keywords
                    .iter()
                    .map(|kw| phrase_score(&text, &normalize(kw)))
                    .sum();
                (intent.id, score)
            })
            .collect()
    }
}

fn normalize(value: &str) -> String {
    value.to_lowercase().replace('\u{2019}', "'")
}

fn phrase_score(text: &str, phrase: &str) -> usize {
    if phrase.is_empty() {
        return 0;
    }

    let words = phrase.split_whitespace().count().max(1);
    let mut partial = false;

    for (start, _) in text.match_indices(phrase) {
        let end = start + phrase.len();
        let before_ok = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());

        if before_ok && after_ok {
            return words * 2;
        }
        partial = true;
    }

    if partial && phrase.chars().count() > 2 {
        words
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_covers_every_intent_once() {
        let ids = [
            IntentId::SwapToken, IntentId::StakeSol, IntentId::PlaceBid, IntentId::SendToken,
            IntentId::GetPrice, IntentId::GetLatestAuction, IntentId::GetAuction, IntentId::TxSearch,
            IntentId::UnstakeSol, IntentId::FetchMyPortfolio, IntentId::FetchUserPortfolio,
            IntentId::AnalyzeToken, IntentId::SearchSolanaNews, IntentId::ForbiddenTopics,
            IntentId::TalkBetweenAgents, IntentId::GetMetrics, IntentId::GetGovernanceProposals,
            IntentId::Default,
        ];
        assert_eq!(INTENTS.len(), ids.len());
        for id in ids {
            assert_eq!(INTENTS.iter().filter(|i| i.id == id).count(), 1);
            let json = serde_json::to_value(id).unwrap();
            assert_eq!(json, id.as_str());
        }
    }

    #[test]
    fn test_task_intents() {
        let cases = vec![
            ("Swap 50 SOL to USDT", IntentId::SwapToken),
            ("stake SOL", IntentId::StakeSol),
            ("I want to unstake my SOL", IntentId::UnstakeSol),
            ("auction round 2", IntentId::GetAuction),
            ("show me the latest auction", IntentId::GetLatestAuction),
            ("place bid in the burn auction", IntentId::PlaceBid),
            ("What is the price of SOL?", IntentId::GetPrice),
            ("show my portfolio", IntentId::FetchMyPortfolio),
            ("what is happening with BONK", IntentId::AnalyzeToken),
            ("Solana TVL please", IntentId::GetMetrics),
            ("show proposals", IntentId::GetGovernanceProposals),
            ("find this transaction on the explorer", IntentId::TxSearch),
        ];

        for (message, expected) in cases {
            assert_eq!(IntentClassifier::classify(message), expected, "message: {}", message);
        }
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(IntentClassifier::classify("SWAP 1 sol TO usdc"), IntentId::SwapToken);
        assert_eq!(IntentClassifier::classify("What's Up"), IntentId::Default);
    }

    #[test]
    fn test_default_fallback() {
        assert_eq!(IntentClassifier::classify("zzqx vvbn"), IntentId::Default);
        assert_eq!(IntentClassifier::classify(""), IntentId::Default);
        assert_eq!(IntentClassifier::classify("hi"), IntentId::Default);
        assert_eq!(IntentClassifier::classify("Tell me about Solana"), IntentId::Default);
    }

    #[test]
    fn test_forbidden_topics() {
        assert_eq!(IntentClassifier::classify("What is Bitcoin doing today"), IntentId::ForbiddenTopics);
        assert_eq!(IntentClassifier::classify("help me write a python script"), IntentId::ForbiddenTopics);
    }

    #[test]
    fn test_ties_go_to_declaration_order() {
        // "news" and "solana" both score 2 for news / forbidden / default.
        let scores = IntentClassifier::scores("latest news about solana");
        let score_of = |id| scores.iter().find(|(i, _)| *i == id).map(|(_, s)| *s).unwrap();
        assert_eq!(score_of(IntentId::SearchSolanaNews), score_of(IntentId::ForbiddenTopics));
        assert_eq!(IntentClassifier::classify("latest news about solana"), IntentId::SearchSolanaNews);
    }

    #[test]
    fn test_unique_keyword_outscores_later_matches() {
        let score_in = |message: &str, id| {
            IntentClassifier::scores(message)
                .into_iter()
                .find(|(i, _)| *i == id)
                .map(|(_, s)| s)
                .unwrap()
        };

        // "swap sol" only exists on the swap intent; "price" matches too.
        let message = "swap SOL at the current price";
        assert_eq!(score_in(message, IntentId::SwapToken), 6);
        assert_eq!(score_in(message, IntentId::GetPrice), 2);
        assert_eq!(IntentClassifier::classify(message), IntentId::SwapToken);

        // "place bid" and "burn auction" belong to bidding; "auction" is shared.
        let message = "place bid in the burn auction";
        assert_eq!(score_in(message, IntentId::PlaceBid), 10);
        assert_eq!(score_in(message, IntentId::GetLatestAuction), 2);
        assert_eq!(IntentClassifier::classify(message), IntentId::PlaceBid);
    }

    #[test]
    fn test_short_keywords_need_word_boundaries() {
        assert_eq!(phrase_score("again and again", "ai"), 0);
        assert_eq!(phrase_score("is ai safe", "ai"), 2);
        assert_eq!(phrase_score("unstake now", "stake"), 1);
        assert_eq!(phrase_score("auction round 2", "auction round"), 4);
    }
}
