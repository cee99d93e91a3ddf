// =================================================================
// data/registry.rs - Coin/Pair Registry
// =================================================================

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::types::{split_pair_symbol, Coin, CoinId, DataError, Pair, PairId};

/// Catalog of every coin and pair known to the process.
///
/// Built once at startup and shared read-only (`Arc<Registry>`) by all
/// exchanges afterwards.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    coins: BTreeMap<CoinId, Coin>,
    coin_codes: HashMap<String, CoinId>,
    pairs: BTreeMap<PairId, Pair>,
    pair_symbols: HashMap<String, PairId>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn coin(&self, id: CoinId) -> Option<&Coin> {
        self.coins.get(&id)
    }

    pub fn coin_by_code(&self, code: &str) -> Option<&Coin> {
        self.coin_codes
            .get(&code.to_uppercase())
            .and_then(|id| self.coins.get(id))
    }

    pub fn pair(&self, id: PairId) -> Option<&Pair> {
        self.pairs.get(&id)
    }

    /// Look up a pair by its canonical `BASE|QUOTE` symbol
    pub fn pair_by_symbol(&self, symbol: &str) -> Option<&Pair> {
        let (base, quote) = split_pair_symbol(symbol).ok()?;
        self.pair_by_codes(&base, &quote)
    }

    pub fn pair_by_codes(&self, base: &str, quote: &str) -> Option<&Pair> {
        let key = format!("{}|{}", base.to_uppercase(), quote.to_uppercase());
        self.pair_symbols.get(&key).and_then(|id| self.pairs.get(id))
    }

    /// All coins in ascending ID order
    pub fn coins(&self) -> impl Iterator<Item = &Coin> {
        self.coins.values()
    }

    /// All pairs in ascending ID order
    pub fn pairs(&self) -> impl Iterator<Item = &Pair> {
        self.pairs.values()
    }

    pub fn coin_count(&self) -> usize {
        self.coins.len()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }
}

/// Accumulates coins and pairs before the registry is frozen
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    /// Add a coin. A later coin with the same ID replaces the earlier one; a
    /// later coin with the same code takes over the code lookup.
    pub fn coin(mut self, id: CoinId, code: &str) -> Self {
        self.insert_coin(Coin::new(id, code));
        self
    }

    /// Add a pair from already registered coin codes
    pub fn pair(mut self, id: PairId, base: &str, quote: &str) -> Result<Self, DataError> {
        self.insert_pair_codes(id, base, quote)?;
        Ok(self)
    }

    pub fn insert_coin(&mut self, coin: Coin) {
        if let Some(old) = self.registry.coins.insert(coin.id, coin.clone()) {
            // Only unbind the old code if no other coin has claimed it since
            if self.registry.coin_codes.get(&old.code) == Some(&old.id) {
                self.registry.coin_codes.remove(&old.code);
            }
        }
        self.registry.coin_codes.insert(coin.code.clone(), coin.id);
    }

    pub fn insert_pair_codes(&mut self, id: PairId, base: &str, quote: &str) -> Result<(), DataError> {
        let base = self
            .registry
            .coin_by_code(base)
            .cloned()
            .ok_or_else(|| DataError::UnknownCoin(base.to_string()))?;
        let quote = self
            .registry
            .coin_by_code(quote)
            .cloned()
            .ok_or_else(|| DataError::UnknownCoin(quote.to_string()))?;
        self.insert_pair(Pair::new(id, base, quote));
        Ok(())
    }

    pub fn insert_pair(&mut self, pair: Pair) {
        if let Some(old) = self.registry.pairs.insert(pair.id, pair.clone()) {
            let old_symbol = old.symbol();
            if self.registry.pair_symbols.get(&old_symbol) == Some(&old.id) {
                self.registry.pair_symbols.remove(&old_symbol);
            }
        }
        self.registry.pair_symbols.insert(pair.symbol(), pair.id);
    }

    pub fn build(self) -> Registry {
        debug!(
            "Registry built with {} coins and {} pairs",
            self.registry.coin_count(),
            self.registry.pair_count()
        );
        self.registry
    }
}
