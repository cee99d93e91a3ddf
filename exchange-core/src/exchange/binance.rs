// =================================================================
// exchange/binance.rs - Binance REST Client
// =================================================================

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use exchange_common::data::{ConstraintFetchMethod, ExchangeName, Pair};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    errors::ExchangeError,
    traits::ExchangeApi,
    types::{BinanceAccount, BinanceExchangeInfo, Credentials, RemoteCoin, RemotePair},
    utils::{binance_filter_sizes, normalize_coin_code, parse_decimal, sign_sha256},
};

// Constants
const BINANCE_API_URL: &str = "https://api.binance.com";
const BINANCE_WEB_URL: &str = "https://www.binance.com/en/trade";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RECV_WINDOW_MS: u64 = 5000;
const DEFAULT_FEE: f64 = 0.001;
/// Coins and pairs of one refresh come from the same exchangeInfo response
const EXCHANGE_INFO_TTL: Duration = Duration::from_secs(10);

type CachedExchangeInfo = Option<(Instant, Arc<BinanceExchangeInfo>)>;

/// Binance spot REST client
pub struct BinanceApi {
    api_url: String,
    client: reqwest::Client,
    info_cache: Mutex<CachedExchangeInfo>,
    info_ttl: Duration,
}

impl BinanceApi {
    /// Create a new Binance client
    pub fn new() -> Self {
        Self::with_url(BINANCE_API_URL)
    }

    /// Create a client against another endpoint (testnet, proxy)
    pub fn with_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            client: reqwest::Client::new(),
            info_cache: Mutex::new(None),
            info_ttl: EXCHANGE_INFO_TTL,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        api_key: Option<&str>,
    ) -> Result<T, ExchangeError> {
        debug!("Binance GET {}", url);

        let mut request = self.client.get(url).timeout(REQUEST_TIMEOUT);
        if let Some(key) = api_key {
            request = request.header("X-MBX-APIKEY", key);
        }
        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            return Err(ExchangeError::RateLimit(format!("Binance HTTP {}", status)));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ExchangeError::ApiError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// exchangeInfo, shared by calls within the cache TTL.
    ///
    /// The lock is held across the request so concurrent callers wait for
    /// one response instead of issuing their own. Failures are not cached.
    async fn exchange_info(&self) -> Result<Arc<BinanceExchangeInfo>, ExchangeError> {
        let mut cache = self.info_cache.lock().await;
        if let Some((fetched_at, info)) = cache.as_ref() {
            if fetched_at.elapsed() < self.info_ttl {
                debug!("Reusing Binance exchangeInfo");
                return Ok(info.clone());
            }
        }

        let info: Arc<BinanceExchangeInfo> = Arc::new(
            self.get_json(&format!("{}/api/v3/exchangeInfo", self.api_url), None)
                .await?,
        );
        *cache = Some((Instant::now(), info.clone()));
        Ok(info)
    }
}

/// Every asset that appears in a trading symbol
fn coins_from_exchange_info(info: &BinanceExchangeInfo) -> Vec<RemoteCoin> {
    let assets: BTreeSet<&str> = info
        .symbols
        .iter()
        .filter(|s| s.status == "TRADING")
        .flat_map(|s| [s.base_asset.as_str(), s.quote_asset.as_str()])
        .collect();

    // Withdrawal data needs the signed capital endpoint; see fetch_method()
    assets
        .into_iter()
        .map(|asset| RemoteCoin {
            symbol: asset.to_string(),
            code: normalize_coin_code(asset),
            tx_fee: 0.0,
            withdraw: false,
            deposit: false,
            confirmation: 0,
        })
        .collect()
}

/// Binance lists `ETHBTC` with base ETH; the registry reads it as `BTC|ETH`
fn pairs_from_exchange_info(info: &BinanceExchangeInfo) -> Vec<RemotePair> {
    let mut pairs = Vec::with_capacity(info.symbols.len());
    for symbol in info.symbols.iter().filter(|s| s.status == "TRADING") {
        match binance_filter_sizes(&symbol.filters) {
            Ok((lot_size, price_filter)) => pairs.push(RemotePair {
                symbol: symbol.symbol.clone(),
                base: normalize_coin_code(&symbol.quote_asset),
                quote: normalize_coin_code(&symbol.base_asset),
                taker_fee: DEFAULT_FEE,
                maker_fee: DEFAULT_FEE,
                lot_size,
                price_filter,
            }),
            Err(e) => warn!("Failed to read filters of {}: {}", symbol.symbol, e),
        }
    }
    pairs
}

fn balances_from_account(account: BinanceAccount) -> Result<HashMap<String, f64>, ExchangeError> {
    let mut balances = HashMap::with_capacity(account.balances.len());
    for balance in account.balances {
        let free = parse_decimal("free", &balance.free)?;
        balances.insert(normalize_coin_code(&balance.asset), free);
    }
    Ok(balances)
}

#[async_trait]
impl ExchangeApi for BinanceApi {
    fn name(&self) -> ExchangeName {
        ExchangeName::Binance
    }

    fn fetch_method(&self) -> ConstraintFetchMethod {
        ConstraintFetchMethod {
            fee: false,
            lot_size: true,
            price_filter: true,
            tx_fee: false,
            withdraw: false,
            deposit: false,
            confirmation: false,
        }
    }

    fn trading_web_url(&self, pair: &Pair, _ex_symbol: &str) -> String {
        format!("{}/{}_{}", BINANCE_WEB_URL, pair.quote.code, pair.base.code)
    }

    async fn fetch_coins(&self) -> Result<Vec<RemoteCoin>, ExchangeError> {
        let info = self.exchange_info().await?;
        let coins = coins_from_exchange_info(&info);
        info!("Fetched {} coins from Binance", coins.len());
        Ok(coins)
    }

    async fn fetch_pairs(&self) -> Result<Vec<RemotePair>, ExchangeError> {
        let info = self.exchange_info().await?;
        let pairs = pairs_from_exchange_info(&info);
        info!("Fetched {} pairs from Binance", pairs.len());
        Ok(pairs)
    }

    async fn fetch_balances(
        &self,
        credentials: &Credentials,
    ) -> Result<HashMap<String, f64>, ExchangeError> {
        if credentials.is_empty() {
            return Err(ExchangeError::ApiError(
                "Binance API key and secret are required".to_string(),
            ));
        }

        let query = format!(
            "recvWindow={}&timestamp={}",
            RECV_WINDOW_MS,
            chrono::Utc::now().timestamp_millis()
        );
        let signature = sign_sha256(&credentials.api_secret, &query)?;
        let url = format!(
            "{}/api/v3/account?{}&signature={}",
            self.api_url, query, signature
        );

        let account: BinanceAccount = self.get_json(&url, Some(&credentials.api_key)).await?;
        balances_from_account(account)
    }
}

impl Default for BinanceApi {
    fn default() -> Self {
        Self::new()
    }
}
