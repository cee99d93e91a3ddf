// exchange/traits.rs

use std::collections::HashMap;

use async_trait::async_trait;
use exchange_common::data::{
    Coin, CoinConstraint, ConstraintFetchMethod, ConstraintStore, ExchangeName, ExchangeSnapshot,
    Pair, PairConstraint, Registry,
};
use tracing::warn;

use super::errors::{ConstraintKind, ExchangeError};
use super::types::{Credentials, ExchangeInfo, LoadSummary, RefreshStats, RemoteCoin, RemotePair};

/// Remote REST client of one exchange
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    fn name(&self) -> ExchangeName;

    /// Which constraint fields the remote API provides
    fn fetch_method(&self) -> ConstraintFetchMethod;

    /// Browser URL of the market page for `pair`
    fn trading_web_url(&self, pair: &Pair, ex_symbol: &str) -> String;

    async fn fetch_coins(&self) -> Result<Vec<RemoteCoin>, ExchangeError>;

    async fn fetch_pairs(&self) -> Result<Vec<RemotePair>, ExchangeError>;

    /// Balances keyed by registry coin code
    async fn fetch_balances(
        &self,
        credentials: &Credentials,
    ) -> Result<HashMap<String, f64>, ExchangeError>;
}

/// Uniform contract every exchange exposes over its constraint store.
///
/// Implementors provide identity, storage and the refresh path; every
/// query is implemented here once so that all exchanges answer identically.
#[async_trait]
pub trait Exchange: Send + Sync {
    fn info(&self) -> &ExchangeInfo;

    fn store(&self) -> &ConstraintStore;

    fn registry(&self) -> &Registry;

    fn constraint_fetch_method(&self) -> ConstraintFetchMethod;

    fn trading_web_url(&self, pair: &Pair) -> Option<String>;

    /// Refresh coin and pair constraints from the configured data source
    async fn update_constraint(&self) -> Result<LoadSummary, ExchangeError>;

    /// Replace the balance table with a fresh remote read
    async fn update_balances(&self) -> Result<usize, ExchangeError>;

    fn refresh_stats(&self) -> RefreshStats;

    fn name(&self) -> ExchangeName {
        self.info().name
    }

    fn id(&self) -> u32 {
        self.info().id
    }

    fn get_balance(&self, coin: &Coin) -> f64 {
        self.store().balances.get(&coin.code)
    }

    /// Coins with a constraint on this exchange, by ascending ID
    fn coins(&self) -> Vec<Coin> {
        self.store()
            .coins
            .ids_sorted()
            .into_iter()
            .filter_map(|id| match self.registry().coin(id) {
                Some(coin) => Some(coin.clone()),
                None => {
                    warn!("{}: coin constraint {} has no registry coin, skipped", self.name(), id);
                    None
                }
            })
            .collect()
    }

    /// Pairs with a constraint on this exchange, by ascending ID
    fn pairs(&self) -> Vec<Pair> {
        self.store()
            .pairs
            .ids_sorted()
            .into_iter()
            .filter_map(|id| match self.registry().pair(id) {
                Some(pair) => Some(pair.clone()),
                None => {
                    warn!("{}: pair constraint {} has no registry pair, skipped", self.name(), id);
                    None
                }
            })
            .collect()
    }

    /// Registry pair for a canonical `BASE|QUOTE` symbol, if listed here
    fn get_pair(&self, symbol: &str) -> Option<Pair> {
        let pair = self.registry().pair_by_symbol(symbol)?;
        self.has_pair(pair).then(|| pair.clone())
    }

    fn get_coin_constraint(&self, coin: &Coin) -> Option<CoinConstraint> {
        self.store().coins.get(coin.id)
    }

    fn set_coin_constraint(&self, constraint: CoinConstraint) {
        self.store().coins.set(constraint);
    }

    fn get_pair_constraint(&self, pair: &Pair) -> Option<PairConstraint> {
        self.store().pairs.get(pair.id)
    }

    fn set_pair_constraint(&self, constraint: PairConstraint) {
        self.store().pairs.set(constraint);
    }

    fn symbol_for_coin(&self, coin: &Coin) -> Option<String> {
        self.get_coin_constraint(coin).map(|cc| cc.ex_symbol)
    }

    fn coin_by_symbol(&self, symbol: &str) -> Option<Coin> {
        let cc = self.store().coins.find_by_symbol(symbol)?;
        self.registry().coin(cc.coin_id).cloned()
    }

    fn symbol_for_pair(&self, pair: &Pair) -> Option<String> {
        self.get_pair_constraint(pair).map(|pc| pc.ex_symbol)
    }

    fn pair_by_symbol(&self, symbol: &str) -> Option<Pair> {
        let pc = self.store().pairs.find_by_symbol(symbol)?;
        self.registry().pair(pc.pair_id).cloned()
    }

    fn has_pair(&self, pair: &Pair) -> bool {
        self.store().pairs.contains(pair.id)
    }

    fn delete_coin(&self, coin: &Coin) {
        self.store().coins.remove(coin.id);
    }

    fn delete_pair(&self, pair: &Pair) {
        self.store().pairs.remove(pair.id);
    }

    fn to_snapshot(&self) -> ExchangeSnapshot {
        let mut snapshot = ExchangeSnapshot::new(self.name());
        snapshot.coin_constraint = self.store().coins.snapshot();
        snapshot.pair_constraint = self.store().pairs.snapshot();
        snapshot.exported_at = Some(chrono::Utc::now());
        snapshot
    }

    // ---------------- Coin constraint ----------------

    fn require_coin_constraint(&self, coin: &Coin) -> Result<CoinConstraint, ExchangeError> {
        self.get_coin_constraint(coin)
            .ok_or(ExchangeError::ConstraintNotLoaded {
                exchange: self.name(),
                kind: ConstraintKind::Coin,
                id: coin.id,
            })
    }

    fn get_tx_fee(&self, coin: &Coin) -> Result<f64, ExchangeError> {
        Ok(self.require_coin_constraint(coin)?.tx_fee)
    }

    fn can_withdraw(&self, coin: &Coin) -> Result<bool, ExchangeError> {
        Ok(self.require_coin_constraint(coin)?.withdraw)
    }

    fn can_deposit(&self, coin: &Coin) -> Result<bool, ExchangeError> {
        Ok(self.require_coin_constraint(coin)?.deposit)
    }

    fn get_confirmation(&self, coin: &Coin) -> Result<u32, ExchangeError> {
        Ok(self.require_coin_constraint(coin)?.confirmation)
    }

    // ---------------- Pair constraint ----------------

    fn require_pair_constraint(&self, pair: &Pair) -> Result<PairConstraint, ExchangeError> {
        self.get_pair_constraint(pair)
            .ok_or(ExchangeError::ConstraintNotLoaded {
                exchange: self.name(),
                kind: ConstraintKind::Pair,
                id: pair.id,
            })
    }

    /// Taker fee rate
    fn get_fee(&self, pair: &Pair) -> Result<f64, ExchangeError> {
        Ok(self.require_pair_constraint(pair)?.taker_fee)
    }

    fn get_maker_fee(&self, pair: &Pair) -> Result<f64, ExchangeError> {
        Ok(self.require_pair_constraint(pair)?.maker_fee)
    }

    fn get_lot_size(&self, pair: &Pair) -> Result<f64, ExchangeError> {
        Ok(self.require_pair_constraint(pair)?.lot_size)
    }

    fn get_price_filter(&self, pair: &Pair) -> Result<f64, ExchangeError> {
        Ok(self.require_pair_constraint(pair)?.price_filter)
    }
}
