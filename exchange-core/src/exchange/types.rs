// =================================================================
// exchange/types.rs - Data Structures
// =================================================================

use chrono::{DateTime, Utc};
use exchange_common::data::ExchangeName;
use serde::Deserialize;

/// Static identity of an exchange instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeInfo {
    pub id: u32,
    pub name: ExchangeName,
    pub website: String,
}

impl From<ExchangeName> for ExchangeInfo {
    fn from(name: ExchangeName) -> Self {
        Self {
            id: name.default_id(),
            name,
            website: name.website().to_string(),
        }
    }
}

/// API key pair used for signed endpoints
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_empty() || self.api_secret.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

/// Coin attributes as reported by an exchange, before registry translation
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCoin {
    /// Exchange-native symbol
    pub symbol: String,
    /// Registry code the symbol maps to
    pub code: String,
    pub tx_fee: f64,
    pub withdraw: bool,
    pub deposit: bool,
    pub confirmation: u32,
}

/// Market attributes as reported by an exchange, before registry translation
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePair {
    /// Exchange-native market symbol
    pub symbol: String,
    /// Registry code of the settlement currency
    pub base: String,
    /// Registry code of the traded currency
    pub quote: String,
    pub taker_fee: f64,
    pub maker_fee: f64,
    pub lot_size: f64,
    pub price_filter: f64,
}

/// Result of one data source population
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub coins: usize,
    pub pairs: usize,
    /// Items that could not be resolved through the registry
    pub skipped: usize,
}

/// Refresh statistics of one exchange
#[derive(Debug, Clone, Default)]
pub struct RefreshStats {
    pub total_refreshes: u64,
    pub failed_refreshes: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_summary: Option<LoadSummary>,
}

// ----------------------------------------------------------------
// Bittrex v1.1 REST payloads
// ----------------------------------------------------------------

/// Common Bittrex response envelope
#[derive(Debug, Deserialize)]
pub struct BittrexResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub result: Option<T>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BittrexCurrency {
    #[serde(rename = "Currency")]
    pub currency: String,

    #[serde(rename = "MinConfirmation", default)]
    pub min_confirmation: u32,

    #[serde(rename = "TxFee", default)]
    pub tx_fee: f64,

    #[serde(rename = "IsActive", default)]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BittrexMarket {
    /// Traded currency, e.g. ETH in BTC-ETH
    #[serde(rename = "MarketCurrency")]
    pub market_currency: String,

    /// Settlement currency, e.g. BTC in BTC-ETH
    #[serde(rename = "BaseCurrency")]
    pub base_currency: String,

    #[serde(rename = "MarketName")]
    pub market_name: String,

    #[serde(rename = "MinTradeSize", default)]
    pub min_trade_size: f64,

    #[serde(rename = "IsActive", default)]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BittrexBalance {
    #[serde(rename = "Currency")]
    pub currency: String,

    #[serde(rename = "Available", default)]
    pub available: f64,
}

// ----------------------------------------------------------------
// Binance REST payloads
// ----------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct BinanceExchangeInfo {
    pub symbols: Vec<BinanceSymbol>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BinanceSymbol {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
    #[serde(default)]
    pub filters: Vec<BinanceFilter>,
}

/// Symbol filter; only the fields used for constraints are kept
#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BinanceFilter {
    pub filter_type: String,
    pub tick_size: Option<String>,
    pub step_size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BinanceAccount {
    pub balances: Vec<BinanceBalance>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BinanceBalance {
    pub asset: String,
    pub free: String,
    pub locked: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_info_from_name() {
        let info = ExchangeInfo::from(ExchangeName::Bittrex);
        assert_eq!(info.id, 2);
        assert_eq!(info.website, "https://www.bittrex.com/");
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = Credentials::new("key", "very-secret");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("key"));
        assert!(!printed.contains("very-secret"));
        assert!(!creds.is_empty());
        assert!(Credentials::default().is_empty());
    }
}
