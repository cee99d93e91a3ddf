// =================================================================
// exchange/adapter.rs - Exchange Adapter
// =================================================================

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use exchange_common::data::{ConstraintFetchMethod, ConstraintStore, Pair, Registry};
use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::{
    errors::ExchangeError,
    source::{DataSource, DataSourceKind, LoadTarget},
    traits::{Exchange, ExchangeApi},
    types::{Credentials, ExchangeInfo, LoadSummary, RefreshStats},
};

/// One exchange: its constraint store, remote client and data source
pub struct ExchangeAdapter {
    info: ExchangeInfo,
    credentials: Credentials,
    registry: Arc<Registry>,
    store: ConstraintStore,
    api: Arc<dyn ExchangeApi>,
    source: Option<Arc<dyn DataSource>>,
    /// Serializes refreshes of this exchange
    refresh_lock: tokio::sync::Mutex<()>,
    stats: Mutex<RefreshStats>,
}

impl ExchangeAdapter {
    pub fn new(
        api: Arc<dyn ExchangeApi>,
        registry: Arc<Registry>,
        credentials: Credentials,
        source: Option<Arc<dyn DataSource>>,
    ) -> Self {
        Self {
            info: ExchangeInfo::from(api.name()),
            credentials,
            registry,
            store: ConstraintStore::new(),
            api,
            source,
            refresh_lock: tokio::sync::Mutex::new(()),
            stats: Mutex::new(RefreshStats::default()),
        }
    }

    pub fn source_kind(&self) -> Option<DataSourceKind> {
        self.source.as_ref().map(|s| s.kind())
    }

    /// First population after construction.
    ///
    /// Failures are logged and leave the store empty; the exchange stays
    /// usable and the next refresh tries again.
    pub async fn initialize(&self) -> Result<LoadSummary, ExchangeError> {
        match self.source_kind() {
            Some(kind) => info!("Initializing {} from {} source", self.info.name, kind),
            None => warn!(
                "{} initial load: there is no selected data source",
                self.info.name
            ),
        }
        self.update_constraint().await
    }

    fn record_success(&self, summary: LoadSummary) {
        let mut stats = self.stats.lock();
        stats.total_refreshes += 1;
        stats.last_success = Some(Utc::now());
        stats.last_summary = Some(summary);
    }

    fn record_failure(&self, err: &ExchangeError) {
        let mut stats = self.stats.lock();
        stats.total_refreshes += 1;
        stats.failed_refreshes += 1;
        stats.last_failure = Some(Utc::now());
        stats.last_error = Some(err.to_string());
    }
}

#[async_trait]
impl Exchange for ExchangeAdapter {
    fn info(&self) -> &ExchangeInfo {
        &self.info
    }

    fn store(&self) -> &ConstraintStore {
        &self.store
    }

    fn registry(&self) -> &Registry {
        &self.registry
    }

    fn constraint_fetch_method(&self) -> ConstraintFetchMethod {
        self.api.fetch_method()
    }

    fn trading_web_url(&self, pair: &Pair) -> Option<String> {
        let symbol = self.symbol_for_pair(pair)?;
        Some(self.api.trading_web_url(pair, &symbol))
    }

    async fn update_constraint(&self) -> Result<LoadSummary, ExchangeError> {
        let _guard = self.refresh_lock.lock().await;

        let Some(source) = &self.source else {
            return Ok(LoadSummary::default());
        };

        let target = LoadTarget {
            exchange: self.info.name,
            store: &self.store,
            registry: &self.registry,
        };
        match source.populate(target).await {
            Ok(summary) => {
                info!(
                    "{} constraints updated: {} coins, {} pairs, {} skipped",
                    self.info.name, summary.coins, summary.pairs, summary.skipped
                );
                self.record_success(summary);
                Ok(summary)
            }
            Err(e) => {
                error!("{} constraint update failed: {}", self.info.name, e);
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    async fn update_balances(&self) -> Result<usize, ExchangeError> {
        let balances = self.api.fetch_balances(&self.credentials).await?;
        let count = balances.len();
        self.store.balances.replace_all(balances);
        info!("{} balances updated: {} coins", self.info.name, count);
        Ok(count)
    }

    fn refresh_stats(&self) -> RefreshStats {
        self.stats.lock().clone()
    }
}
