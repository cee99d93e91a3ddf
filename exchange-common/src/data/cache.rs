// =================================================================
// data/cache.rs - Per-Exchange Constraint Cache
// =================================================================

use std::collections::{BTreeMap, HashMap};

use dashmap::DashMap;

use super::types::{CoinConstraint, PairConstraint};

/// A record that can live in a [`ConstraintTable`]
pub trait ConstraintRecord: Clone + Send + Sync + 'static {
    /// Registry ID the record is keyed by
    fn id(&self) -> u32;

    /// Exchange-native symbol
    fn ex_symbol(&self) -> &str;
}

impl ConstraintRecord for CoinConstraint {
    fn id(&self) -> u32 {
        self.coin_id
    }

    fn ex_symbol(&self) -> &str {
        &self.ex_symbol
    }
}

impl ConstraintRecord for PairConstraint {
    fn id(&self) -> u32 {
        self.pair_id
    }

    fn ex_symbol(&self) -> &str {
        &self.ex_symbol
    }
}

/// Thread-safe table of constraint records keyed by registry ID.
///
/// Records are always replaced whole, so a concurrent reader gets either the
/// previous or the new record.
#[derive(Debug)]
pub struct ConstraintTable<R: ConstraintRecord> {
    records: DashMap<u32, R>,
}

impl<R: ConstraintRecord> ConstraintTable<R> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    pub fn get(&self, id: u32) -> Option<R> {
        self.records.get(&id).map(|entry| entry.value().clone())
    }

    /// Insert or replace by the record's own ID
    pub fn set(&self, record: R) {
        self.records.insert(record.id(), record);
    }

    /// Removing an absent ID is a no-op
    pub fn remove(&self, id: u32) {
        self.records.remove(&id);
    }

    pub fn contains(&self, id: u32) -> bool {
        self.records.contains_key(&id)
    }

    /// All IDs in ascending numeric order
    pub fn ids_sorted(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.records.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// First record whose exchange symbol equals `symbol`.
    ///
    /// Linear scan; tables hold hundreds of records, not millions.
    pub fn find_by_symbol(&self, symbol: &str) -> Option<R> {
        self.records
            .iter()
            .find(|entry| entry.value().ex_symbol() == symbol)
            .map(|entry| entry.value().clone())
    }

    /// Replace the table content with `records`.
    ///
    /// IDs missing from the new set are removed, the others replaced one by
    /// one; readers may observe a mix of old and new records meanwhile.
    pub fn replace_all<I>(&self, records: I)
    where
        I: IntoIterator<Item = R>,
    {
        let incoming: HashMap<u32, R> = records.into_iter().map(|r| (r.id(), r)).collect();
        self.records.retain(|id, _| incoming.contains_key(id));
        for (id, record) in incoming {
            self.records.insert(id, record);
        }
    }

    /// Point-in-time copy ordered by ID
    pub fn snapshot(&self) -> BTreeMap<u32, R> {
        self.records
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R: ConstraintRecord> Default for ConstraintTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Balances keyed by coin code
#[derive(Debug, Default)]
pub struct BalanceTable {
    balances: DashMap<String, f64>,
}

impl BalanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown coins read as zero
    pub fn get(&self, code: &str) -> f64 {
        self.balances
            .get(&code.to_uppercase())
            .map(|entry| *entry.value())
            .unwrap_or(0.0)
    }

    pub fn set(&self, code: &str, amount: f64) {
        self.balances.insert(code.to_uppercase(), amount);
    }

    /// Overwrite every balance with `balances`
    pub fn replace_all(&self, balances: HashMap<String, f64>) {
        let incoming: HashMap<String, f64> = balances
            .into_iter()
            .map(|(code, amount)| (code.to_uppercase(), amount))
            .collect();
        self.balances.retain(|code, _| incoming.contains_key(code));
        for (code, amount) in incoming {
            self.balances.insert(code, amount);
        }
    }
}

/// Everything one exchange knows about its coins, pairs and balances
#[derive(Debug, Default)]
pub struct ConstraintStore {
    pub coins: ConstraintTable<CoinConstraint>,
    pub pairs: ConstraintTable<PairConstraint>,
    pub balances: BalanceTable,
}

impl ConstraintStore {
    pub fn new() -> Self {
        Self::default()
    }
}
