// =================================================================
// data/snapshot.rs - JSON Snapshot Files
// =================================================================
//
// Layout of a snapshot directory:
//
//   coin.json       [{"id": 1, "code": "BTC"}, ...]
//   pair.json       [{"id": 10, "base": "BTC", "quote": "ETH"}, ...]
//   <exchange>.json {"exchange": "bittrex", "coin_constraint": {...}, "pair_constraint": {...}}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::registry::Registry;
use super::types::{CoinConstraint, CoinId, DataError, ExchangeName, PairConstraint, PairId};

const COIN_FILE: &str = "coin.json";
const PAIR_FILE: &str = "pair.json";

/// Serialized constraint data of one exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeSnapshot {
    pub exchange: ExchangeName,
    #[serde(default)]
    pub coin_constraint: BTreeMap<CoinId, CoinConstraint>,
    #[serde(default)]
    pub pair_constraint: BTreeMap<PairId, PairConstraint>,
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
}

impl ExchangeSnapshot {
    pub fn new(exchange: ExchangeName) -> Self {
        Self {
            exchange,
            coin_constraint: BTreeMap::new(),
            pair_constraint: BTreeMap::new(),
            exported_at: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CoinEntry {
    id: CoinId,
    code: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PairEntry {
    id: PairId,
    base: String,
    quote: String,
}

/// Path of the snapshot file for `exchange` under `dir`
pub fn exchange_file(dir: impl AsRef<Path>, exchange: ExchangeName) -> PathBuf {
    dir.as_ref().join(format!("{}.json", exchange.as_str()))
}

pub async fn load_exchange(
    dir: impl AsRef<Path>,
    exchange: ExchangeName,
) -> Result<ExchangeSnapshot, DataError> {
    let path = exchange_file(dir, exchange);
    debug!("Loading {} snapshot from {}", exchange, path.display());
    let content = tokio::fs::read_to_string(&path).await?;
    let mut snapshot: ExchangeSnapshot = serde_json::from_str(&content)?;
    if snapshot.exchange != exchange {
        return Err(DataError::ExchangeMismatch {
            expected: exchange,
            found: snapshot.exchange,
        });
    }
    // The map key wins over the record's own ID field
    for (id, record) in snapshot.coin_constraint.iter_mut() {
        record.coin_id = *id;
    }
    for (id, record) in snapshot.pair_constraint.iter_mut() {
        record.pair_id = *id;
    }
    Ok(snapshot)
}

pub async fn save_exchange(
    dir: impl AsRef<Path>,
    snapshot: &ExchangeSnapshot,
) -> Result<PathBuf, DataError> {
    tokio::fs::create_dir_all(dir.as_ref()).await?;
    let path = exchange_file(dir, snapshot.exchange);
    let json = serde_json::to_string_pretty(snapshot)?;
    tokio::fs::write(&path, json).await?;
    info!(
        "Saved {} snapshot ({} coins, {} pairs) to {}",
        snapshot.exchange,
        snapshot.coin_constraint.len(),
        snapshot.pair_constraint.len(),
        path.display()
    );
    Ok(path)
}

/// Load the coin and pair catalog from `coin.json` and `pair.json`
pub async fn load_registry(dir: impl AsRef<Path>) -> Result<Registry, DataError> {
    let dir = dir.as_ref();
    let coins: Vec<CoinEntry> =
        serde_json::from_str(&tokio::fs::read_to_string(dir.join(COIN_FILE)).await?)?;
    let pairs: Vec<PairEntry> =
        serde_json::from_str(&tokio::fs::read_to_string(dir.join(PAIR_FILE)).await?)?;

    let mut builder = Registry::builder();
    for entry in coins {
        builder = builder.coin(entry.id, &entry.code);
    }
    for entry in pairs {
        builder.insert_pair_codes(entry.id, &entry.base, &entry.quote)?;
    }
    let registry = builder.build();
    info!(
        "Loaded registry from {}: {} coins, {} pairs",
        dir.display(),
        registry.coin_count(),
        registry.pair_count()
    );
    Ok(registry)
}

pub async fn save_registry(dir: impl AsRef<Path>, registry: &Registry) -> Result<(), DataError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;

    let coins: Vec<CoinEntry> = registry
        .coins()
        .map(|c| CoinEntry {
            id: c.id,
            code: c.code.clone(),
        })
        .collect();
    let pairs: Vec<PairEntry> = registry
        .pairs()
        .map(|p| PairEntry {
            id: p.id,
            base: p.base.code.clone(),
            quote: p.quote.code.clone(),
        })
        .collect();

    tokio::fs::write(dir.join(COIN_FILE), serde_json::to_string_pretty(&coins)?).await?;
    tokio::fs::write(dir.join(PAIR_FILE), serde_json::to_string_pretty(&pairs)?).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_exchange_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{
            "exchange": "bittrex",
            "coin_constraint": {
                "1": {"coin_id": 1, "ex_symbol": "BTC", "withdraw": true}
            },
            "pair_constraint": {
                "10": {"pair_id": 0, "ex_symbol": "BTC-ETH", "lot_size": 0.001}
            }
        }"#;
        std::fs::write(dir.path().join("bittrex.json"), json).unwrap();

        let snapshot = load_exchange(dir.path(), ExchangeName::Bittrex).await.unwrap();
        assert_eq!(snapshot.coin_constraint[&1].ex_symbol, "BTC");
        assert_eq!(snapshot.pair_constraint[&10].pair_id, 10);
        assert_eq!(snapshot.pair_constraint[&10].lot_size, 0.001);
    }

    #[tokio::test]
    async fn test_snapshot_of_other_exchange_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bittrex.json"),
            r#"{"exchange": "binance", "coin_constraint": {}, "pair_constraint": {}}"#,
        )
        .unwrap();

        let result = load_exchange(dir.path(), ExchangeName::Bittrex).await;
        assert!(matches!(
            result,
            Err(DataError::ExchangeMismatch {
                expected: ExchangeName::Bittrex,
                found: ExchangeName::Binance,
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_snapshot_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_exchange(dir.path(), ExchangeName::Binance).await;
        assert!(matches!(result, Err(DataError::Io(_))));
    }

    #[tokio::test]
    async fn test_registry_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::builder()
            .coin(1, "BTC")
            .coin(2, "ETH")
            .pair(10, "BTC", "ETH")
            .unwrap()
            .build();

        save_registry(dir.path(), &registry).await.unwrap();
        let loaded = load_registry(dir.path()).await.unwrap();

        assert_eq!(loaded.coin_count(), 2);
        assert_eq!(loaded.pair_by_symbol("BTC|ETH").unwrap().id, 10);
    }
}
