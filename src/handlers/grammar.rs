//! Fixed grammars for pulling structured fields out of free text

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

lazy_static! {
    static ref TRANSFER_RE: Regex =
        Regex::new(r"(?i)\b(?:send|transfer)\s+(\d+(?:\.\d+)?)\s+([a-z][a-z0-9]*)\s+to\s+(\S+)")
            .expect("transfer grammar is a valid regex");
    static ref SWAP_RE: Regex = Regex::new(
        r"(?i)\b(?:swap|convert|trade|exchange)\s+(\d+(?:\.\d+)?)\s+([a-z][a-z0-9]*)\s+(?:to|for|into)\s+([a-z][a-z0-9]*)"
    )
    .expect("swap grammar is a valid regex");
    static ref ROUND_RE: Regex = Regex::new(r"(?i)\b(?:bidding round|auction|round|number)\s*#?\s*(\d+)")
        .expect("round grammar is a valid regex");
    static ref BASE58_WORD_RE: Regex =
        Regex::new(r"[1-9A-HJ-NP-Za-km-z]{32,88}").expect("base58 word is a valid regex");
    static ref TICKER_RE: Regex = Regex::new(r"\$?\b([A-Z][A-Z0-9]{1,9})\b").expect("ticker is a valid regex");
}

/// Why a grammar did not yield a usable request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    AddressUnparseable,
    TokenUnknown(String),
    GrammarMismatch,
}

impl ParseFailure {
    /// Actionable message for a transfer prompt
    pub fn remediation(&self) -> String {
        match self {
            ParseFailure::AddressUnparseable => {
                "❌ Prompt details are unclear. Receiver address not found. Please type it fully and clear at your prompt."
                    .to_string()
            }
            ParseFailure::TokenUnknown(symbol) => format!(
                "❌ Prompt details are unclear. Token {} could not be found. Please check the ticker and try again.",
                symbol
            ),
            ParseFailure::GrammarMismatch => {
                "❌ Prompt details are unclear. Please send me an info with basic prompt like this. Example : 'I want to send 10 SOL to <wallet address>'"
                    .to_string()
            }
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFailure::AddressUnparseable => f.write_str("address unparseable"),
            ParseFailure::TokenUnknown(symbol) => write!(f, "token unknown: {}", symbol),
            ParseFailure::GrammarMismatch => f.write_str("grammar mismatch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub amount: f64,
    pub symbol: String,
    pub receiver: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwapRequest {
    pub amount: f64,
    pub from: String,
    pub to: String,
}

/// `‹send|transfer› ‹amount› ‹TOKEN› to ‹address›`
pub fn parse_transfer(message: &str) -> Result<TransferRequest, ParseFailure> {
    let caps = TRANSFER_RE
        .captures(message)
        .ok_or(ParseFailure::GrammarMismatch)?;

    let amount = parse_amount(&caps[1]).ok_or(ParseFailure::GrammarMismatch)?;
    let receiver = caps[3].trim_end_matches(|c: char| !c.is_ascii_alphanumeric());

    if !is_valid_address(receiver) {
        return Err(ParseFailure::AddressUnparseable);
    }

    Ok(TransferRequest {
        amount,
        symbol: caps[2].to_uppercase(),
        receiver: receiver.to_string(),
    })
}

/// `‹swap|convert|trade|exchange› ‹amount› ‹A› ‹to|for|into› ‹B›`
pub fn parse_swap(message: &str) -> Result<SwapRequest, ParseFailure> {
    let caps = SWAP_RE.captures(message).ok_or(ParseFailure::GrammarMismatch)?;
    let amount = parse_amount(&caps[1]).ok_or(ParseFailure::GrammarMismatch)?;

    Ok(SwapRequest {
        amount,
        from: caps[2].to_uppercase(),
        to: caps[3].to_uppercase(),
    })
}

/// `‹auction|round|number› ‹integer›`
pub fn parse_round(message: &str) -> Option<u64> {
    ROUND_RE
        .captures(message)
        .and_then(|caps| caps[1].parse().ok())
}

/// First word that decodes to a 32-byte public key
pub fn extract_address(message: &str) -> Option<String> {
    BASE58_WORD_RE
        .find_iter(message)
        .map(|m| m.as_str())
        .find(|word| is_valid_address(word))
        .map(str::to_string)
}

/// First word that decodes to a 64-byte transaction signature
pub fn extract_signature(message: &str) -> Option<String> {
    BASE58_WORD_RE
        .find_iter(message)
        .map(|m| m.as_str())
        .find(|word| decode_base58(word).is_some_and(|bytes| bytes.len() == 64))
        .map(str::to_string)
}

/// First upper-case ticker such as `SOL`, `JUP` or `$BONK`
pub fn extract_ticker(message: &str) -> Option<String> {
    TICKER_RE
        .captures_iter(message)
        .map(|caps| caps[1].to_string())
        .find(|ticker| !is_valid_address(ticker))
}

pub fn is_valid_address(value: &str) -> bool {
    (32..=44).contains(&value.len())
        && decode_base58(value).is_some_and(|bytes| bytes.len() == 32)
}

/// Bitcoin-alphabet base58 decode; `None` on any character outside the alphabet
pub fn decode_base58(value: &str) -> Option<Vec<u8>> {
    // Little-endian big number, one byte per limb.
    let mut bytes: Vec<u8> = Vec::with_capacity(value.len());

    for ch in value.bytes() {
        let mut carry = BASE58_ALPHABET.iter().position(|&c| c == ch)? as u32;
        for byte in bytes.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }

    let leading_zeros = value.bytes().take_while(|&c| c == b'1').count();
    bytes.extend(std::iter::repeat(0).take(leading_zeros));
    bytes.reverse();
    Some(bytes)
}

fn parse_amount(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|a| a.is_finite() && *a > 0.0)
}
