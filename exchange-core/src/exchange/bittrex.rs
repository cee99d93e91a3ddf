// =================================================================
// exchange/bittrex.rs - Bittrex REST Client (API v1.1)
// =================================================================

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use exchange_common::data::{ConstraintFetchMethod, ExchangeName, Pair};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::{
    errors::ExchangeError,
    traits::ExchangeApi,
    types::{
        BittrexBalance, BittrexCurrency, BittrexMarket, BittrexResponse, Credentials, RemoteCoin,
        RemotePair,
    },
    utils::{normalize_coin_code, sign_sha512},
};

// Constants
const BITTREX_API_URL: &str = "https://bittrex.com/api/v1.1";
const BITTREX_WEB_URL: &str = "https://bittrex.com/Market/Index";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_FEE: f64 = 0.0025;
const DEFAULT_STEP: f64 = 0.00000001;

/// Bittrex REST client
pub struct BittrexApi {
    api_url: String,
    client: reqwest::Client,
}

impl BittrexApi {
    pub fn new() -> Self {
        Self::with_url(BITTREX_API_URL)
    }

    pub fn with_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// GET an endpoint and unwrap the `{success, message, result}` envelope
    async fn get_result<T: DeserializeOwned>(
        &self,
        url: &str,
        signature: Option<&str>,
    ) -> Result<T, ExchangeError> {
        debug!("Bittrex GET {}", url);

        let mut request = self.client.get(url).timeout(REQUEST_TIMEOUT);
        if let Some(sign) = signature {
            request = request.header("apisign", sign);
        }
        let response = request.send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ExchangeError::RateLimit(format!("Bittrex HTTP {}", status)));
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

        unwrap_envelope(&response.text().await?)
    }
}

fn unwrap_envelope<T: DeserializeOwned>(body: &str) -> Result<T, ExchangeError> {
    let envelope: BittrexResponse<T> = serde_json::from_str(body)?;
    if !envelope.success {
        return Err(ExchangeError::ApiError(envelope.message));
    }
    envelope
        .result
        .ok_or_else(|| ExchangeError::ParseError("Bittrex response without result".to_string()))
}

fn coin_from_currency(currency: &BittrexCurrency) -> RemoteCoin {
    RemoteCoin {
        symbol: currency.currency.clone(),
        code: normalize_coin_code(&currency.currency),
        tx_fee: currency.tx_fee,
        withdraw: currency.is_active,
        deposit: currency.is_active,
        confirmation: currency.min_confirmation,
    }
}

/// `BTC-ETH` settles in BTC and trades ETH, the same reading as `BTC|ETH`
fn pair_from_market(market: &BittrexMarket) -> RemotePair {
    RemotePair {
        symbol: market.market_name.clone(),
        base: normalize_coin_code(&market.base_currency),
        quote: normalize_coin_code(&market.market_currency),
        taker_fee: DEFAULT_FEE,
        maker_fee: DEFAULT_FEE,
        lot_size: DEFAULT_STEP,
        price_filter: DEFAULT_STEP,
    }
}

#[async_trait]
impl ExchangeApi for BittrexApi {
    fn name(&self) -> ExchangeName {
        ExchangeName::Bittrex
    }

    fn fetch_method(&self) -> ConstraintFetchMethod {
        ConstraintFetchMethod::all()
    }

    fn trading_web_url(&self, _pair: &Pair, ex_symbol: &str) -> String {
        format!("{}?MarketName={}", BITTREX_WEB_URL, ex_symbol)
    }

    async fn fetch_coins(&self) -> Result<Vec<RemoteCoin>, ExchangeError> {
        let currencies: Vec<BittrexCurrency> = self
            .get_result(&format!("{}/public/getcurrencies", self.api_url), None)
            .await?;
        info!("Fetched {} currencies from Bittrex", currencies.len());
        Ok(currencies.iter().map(coin_from_currency).collect())
    }

    async fn fetch_pairs(&self) -> Result<Vec<RemotePair>, ExchangeError> {
        let markets: Vec<BittrexMarket> = self
            .get_result(&format!("{}/public/getmarkets", self.api_url), None)
            .await?;
        info!("Fetched {} markets from Bittrex", markets.len());
        Ok(markets
            .iter()
            .filter(|m| m.is_active)
            .map(pair_from_market)
            .collect())
    }

    async fn fetch_balances(
        &self,
        credentials: &Credentials,
    ) -> Result<HashMap<String, f64>, ExchangeError> {
        if credentials.is_empty() {
            return Err(ExchangeError::ApiError(
                "Bittrex API key and secret are required".to_string(),
            ));
        }

        let uri = format!(
            "{}/account/getbalances?apikey={}&nonce={}",
            self.api_url,
            credentials.api_key,
            chrono::Utc::now().timestamp_millis()
        );
        let signature = sign_sha512(&credentials.api_secret, &uri)?;
        let balances: Vec<BittrexBalance> = self.get_result(&uri, Some(&signature)).await?;

        Ok(balances
            .into_iter()
            .map(|b| (normalize_coin_code(&b.currency), b.available))
            .collect())
    }
}

impl Default for BittrexApi {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exchange_common::data::Coin;

    #[test]
    fn test_parse_currencies() {
        let body = r#"{
            "success": true,
            "message": "",
            "result": [
                {"Currency": "BTC", "CurrencyLong": "Bitcoin", "MinConfirmation": 2, "TxFee": 0.0005, "IsActive": true, "CoinType": "BITCOIN"},
                {"Currency": "BCC", "CurrencyLong": "Bitcoin Cash", "MinConfirmation": 12, "TxFee": 0.001, "IsActive": false, "CoinType": "BITCOIN"}
            ]
        }"#;
        let currencies: Vec<BittrexCurrency> = unwrap_envelope(body).unwrap();
        let coins: Vec<RemoteCoin> = currencies.iter().map(coin_from_currency).collect();

        assert_eq!(coins[0].code, "BTC");
        assert_eq!(coins[0].confirmation, 2);
        assert!(coins[0].withdraw && coins[0].deposit);
        assert_eq!(coins[1].symbol, "BCC");
        assert_eq!(coins[1].code, "BCH");
        assert!(!coins[1].withdraw);
    }

    #[test]
    fn test_parse_markets() {
        let body = r#"{
            "success": true,
            "message": "",
            "result": [
                {"MarketCurrency": "ETH", "BaseCurrency": "BTC", "MarketName": "BTC-ETH", "MinTradeSize": 0.01, "IsActive": true}
            ]
        }"#;
        let markets: Vec<BittrexMarket> = unwrap_envelope(body).unwrap();
        let pair = pair_from_market(&markets[0]);

        assert_eq!(pair.symbol, "BTC-ETH");
        assert_eq!(pair.base, "BTC");
        assert_eq!(pair.quote, "ETH");
        assert_eq!(pair.taker_fee, 0.0025);
    }

    #[test]
    fn test_failed_envelope() {
        let body = r#"{"success": false, "message": "APIKEY_INVALID", "result": null}"#;
        let result: Result<Vec<BittrexBalance>, _> = unwrap_envelope(body);
        match result {
            Err(ExchangeError::ApiError(msg)) => assert_eq!(msg, "APIKEY_INVALID"),
            other => panic!("Expected ApiError, got {:?}", other),
        }
    }

    #[test]
    fn test_trading_web_url() {
        let api = BittrexApi::new();
        let pair = Pair::new(10, Coin::new(1, "BTC"), Coin::new(2, "ETH"));
        assert_eq!(
            api.trading_web_url(&pair, "BTC-ETH"),
            "https://bittrex.com/Market/Index?MarketName=BTC-ETH"
        );
    }
}
