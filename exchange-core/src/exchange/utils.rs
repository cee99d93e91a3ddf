// =================================================================
// exchange/utils.rs - Utility Functions
// =================================================================

use exchange_common::data::{CoinConstraint, PairConstraint, Registry};
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use tracing::debug;

use super::{BinanceFilter, ExchangeError, RemoteCoin, RemotePair};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Translate a remote coin into a constraint record.
///
/// Returns `None` when the coin code is not in the registry.
pub fn coin_constraint_from_remote(registry: &Registry, remote: &RemoteCoin) -> Option<CoinConstraint> {
    let Some(coin) = registry.coin_by_code(&remote.code) else {
        debug!("Coin {} ({}) not in registry, skipped", remote.code, remote.symbol);
        return None;
    };
    Some(CoinConstraint {
        coin_id: coin.id,
        ex_symbol: remote.symbol.clone(),
        tx_fee: remote.tx_fee,
        withdraw: remote.withdraw,
        deposit: remote.deposit,
        confirmation: remote.confirmation,
    })
}

/// Translate a remote market into a constraint record.
///
/// Returns `None` when the `BASE|QUOTE` pair is not in the registry.
pub fn pair_constraint_from_remote(registry: &Registry, remote: &RemotePair) -> Option<PairConstraint> {
    let Some(pair) = registry.pair_by_codes(&remote.base, &remote.quote) else {
        debug!(
            "Pair {}|{} ({}) not in registry, skipped",
            remote.base, remote.quote, remote.symbol
        );
        return None;
    };
    Some(PairConstraint {
        pair_id: pair.id,
        ex_symbol: remote.symbol.clone(),
        taker_fee: remote.taker_fee,
        maker_fee: remote.maker_fee,
        lot_size: remote.lot_size,
        price_filter: remote.price_filter,
    })
}

/// Map an exchange currency symbol onto the registry code.
///
/// Exchanges use a few legacy tickers that differ from the common code.
pub fn normalize_coin_code(symbol: &str) -> String {
    let upper = symbol.trim().to_uppercase();
    match upper.as_str() {
        "XBT" => "BTC".to_string(),
        "BCC" => "BCH".to_string(),
        "BCHABC" => "BCH".to_string(),
        "BCHSV" => "BSV".to_string(),
        _ => upper,
    }
}

/// Parse a decimal string as returned by Binance
pub fn parse_decimal(field: &str, value: &str) -> Result<f64, ExchangeError> {
    value
        .parse::<f64>()
        .map_err(|e| ExchangeError::ParseError(format!("Invalid {} '{}': {}", field, value, e)))
}

/// Read `stepSize` of LOT_SIZE and `tickSize` of PRICE_FILTER
pub fn binance_filter_sizes(filters: &[BinanceFilter]) -> Result<(f64, f64), ExchangeError> {
    let mut lot_size = 0.0;
    let mut price_filter = 0.0;
    for filter in filters {
        match (filter.filter_type.as_str(), &filter.step_size, &filter.tick_size) {
            ("LOT_SIZE", Some(step), _) => lot_size = parse_decimal("stepSize", step)?,
            ("PRICE_FILTER", _, Some(tick)) => price_filter = parse_decimal("tickSize", tick)?,
            _ => {}
        }
    }
    Ok((lot_size, price_filter))
}

/// Hex HMAC-SHA256 signature used by Binance signed endpoints
pub fn sign_sha256(secret: &str, payload: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::ApiError(format!("Invalid API secret: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Hex HMAC-SHA512 signature used by Bittrex signed endpoints
pub fn sign_sha512(secret: &str, payload: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::ApiError(format!("Invalid API secret: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::builder()
            .coin(1, "BTC")
            .coin(2, "ETH")
            .pair(10, "BTC", "ETH")
            .unwrap()
            .build()
    }

    #[test]
    fn test_coin_translation() {
        let remote = RemoteCoin {
            symbol: "XBT".to_string(),
            code: normalize_coin_code("xbt"),
            tx_fee: 0.0005,
            withdraw: true,
            deposit: false,
            confirmation: 2,
        };
        let cc = coin_constraint_from_remote(&registry(), &remote).unwrap();
        assert_eq!(cc.coin_id, 1);
        assert_eq!(cc.ex_symbol, "XBT");
        assert!(cc.withdraw);
        assert!(!cc.deposit);
    }

    #[test]
    fn test_unknown_coin_is_skipped() {
        let remote = RemoteCoin {
            symbol: "DOGE".to_string(),
            code: "DOGE".to_string(),
            tx_fee: 1.0,
            withdraw: true,
            deposit: true,
            confirmation: 6,
        };
        assert!(coin_constraint_from_remote(&registry(), &remote).is_none());
    }

    #[test]
    fn test_pair_translation() {
        let remote = RemotePair {
            symbol: "BTC-ETH".to_string(),
            base: "BTC".to_string(),
            quote: "ETH".to_string(),
            taker_fee: 0.0025,
            maker_fee: 0.0025,
            lot_size: 0.001,
            price_filter: 0.00000001,
        };
        let pc = pair_constraint_from_remote(&registry(), &remote).unwrap();
        assert_eq!(pc.pair_id, 10);
        assert_eq!(pc.lot_size, 0.001);

        let reversed = RemotePair {
            base: "ETH".to_string(),
            quote: "BTC".to_string(),
            ..remote
        };
        assert!(pair_constraint_from_remote(&registry(), &reversed).is_none());
    }

    #[test]
    fn test_binance_filters() {
        let filters = vec![
            BinanceFilter {
                filter_type: "PRICE_FILTER".to_string(),
                tick_size: Some("0.00000100".to_string()),
                step_size: None,
            },
            BinanceFilter {
                filter_type: "LOT_SIZE".to_string(),
                tick_size: None,
                step_size: Some("0.00100000".to_string()),
            },
            BinanceFilter {
                filter_type: "MIN_NOTIONAL".to_string(),
                tick_size: None,
                step_size: None,
            },
        ];
        let (lot, price) = binance_filter_sizes(&filters).unwrap();
        assert_eq!(lot, 0.001);
        assert_eq!(price, 0.000001);
    }

    #[test]
    fn test_bad_decimal() {
        assert!(matches!(
            parse_decimal("stepSize", "abc"),
            Err(ExchangeError::ParseError(_))
        ));
    }

    #[test]
    fn test_sha256_signature_matches_binance_docs() {
        // Example from the Binance REST API documentation
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let payload = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign_sha256(secret, payload).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_sha512_signature_is_hex() {
        let signature = sign_sha512("secret", "https://bittrex.com/api").unwrap();
        assert_eq!(signature.len(), 128);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
