// =================================================================
// data/types.rs - Registry and Constraint Types
// =================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Numeric identifier of a coin in the registry
pub type CoinId = u32;

/// Numeric identifier of a trading pair in the registry
pub type PairId = u32;

/// Separator used by the canonical pair symbol, e.g. `BTC|ETH`
pub const PAIR_SEPARATOR: char = '|';

/// A tradable currency identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub id: CoinId,
    pub code: String,
}

impl Coin {
    pub fn new(id: CoinId, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into().to_uppercase(),
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// A base/quote trading instrument.
///
/// `base` is the settlement currency: `BTC|ETH` trades ETH priced in BTC.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair {
    pub id: PairId,
    pub base: Coin,
    pub quote: Coin,
}

impl Pair {
    pub fn new(id: PairId, base: Coin, quote: Coin) -> Self {
        Self { id, base, quote }
    }

    /// Canonical `BASE|QUOTE` symbol
    pub fn symbol(&self) -> String {
        format!("{}{}{}", self.base.code, PAIR_SEPARATOR, self.quote.code)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol())
    }
}

/// Split a canonical `BASE|QUOTE` symbol into its upper-cased codes
pub fn split_pair_symbol(symbol: &str) -> Result<(String, String), DataError> {
    match symbol.split_once(PAIR_SEPARATOR) {
        Some((base, quote)) if !base.trim().is_empty() && !quote.trim().is_empty() => {
            Ok((base.trim().to_uppercase(), quote.trim().to_uppercase()))
        }
        _ => Err(DataError::InvalidSymbol(symbol.to_string())),
    }
}

/// Exchange-specific rules for one coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinConstraint {
    pub coin_id: CoinId,
    /// Symbol of the coin on the exchange
    pub ex_symbol: String,
    /// Withdrawal transaction fee
    #[serde(default)]
    pub tx_fee: f64,
    #[serde(default)]
    pub withdraw: bool,
    #[serde(default)]
    pub deposit: bool,
    /// Confirmations required before a deposit is credited
    #[serde(default)]
    pub confirmation: u32,
}

/// Exchange-specific rules for one trading pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairConstraint {
    pub pair_id: PairId,
    /// Market symbol on the exchange
    pub ex_symbol: String,
    #[serde(default)]
    pub taker_fee: f64,
    #[serde(default)]
    pub maker_fee: f64,
    /// Minimum quantity increment
    #[serde(default)]
    pub lot_size: f64,
    /// Minimum price increment
    #[serde(default)]
    pub price_filter: f64,
}

/// Which constraint values an exchange's API actually provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConstraintFetchMethod {
    pub fee: bool,
    pub lot_size: bool,
    pub price_filter: bool,
    pub tx_fee: bool,
    pub withdraw: bool,
    pub deposit: bool,
    pub confirmation: bool,
}

impl ConstraintFetchMethod {
    pub fn all() -> Self {
        Self {
            fee: true,
            lot_size: true,
            price_filter: true,
            tx_fee: true,
            withdraw: true,
            deposit: true,
            confirmation: true,
        }
    }
}

/// Supported exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeName {
    Binance,
    Bittrex,
}

impl ExchangeName {
    pub const ALL: [ExchangeName; 2] = [ExchangeName::Binance, ExchangeName::Bittrex];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeName::Binance => "binance",
            ExchangeName::Bittrex => "bittrex",
        }
    }

    pub fn default_id(&self) -> u32 {
        match self {
            ExchangeName::Binance => 1,
            ExchangeName::Bittrex => 2,
        }
    }

    pub fn website(&self) -> &'static str {
        match self {
            ExchangeName::Binance => "https://www.binance.com/",
            ExchangeName::Bittrex => "https://www.bittrex.com/",
        }
    }
}

impl fmt::Display for ExchangeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeName {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(ExchangeName::Binance),
            "bittrex" => Ok(ExchangeName::Bittrex),
            other => Err(DataError::UnknownExchange(other.to_string())),
        }
    }
}

/// Errors raised by the data layer
#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unknown coin: {0}")]
    UnknownCoin(String),

    #[error("Snapshot for {expected} contains data of {found}")]
    ExchangeMismatch {
        expected: ExchangeName,
        found: ExchangeName,
    },

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),
}
