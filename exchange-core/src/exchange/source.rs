// =================================================================
// exchange/source.rs - Constraint Data Sources
// =================================================================

use std::fmt;
use std::str::FromStr;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use exchange_common::data::{
    snapshot, CoinConstraint, ConstraintRepository, ConstraintStore, DataError, ExchangeName,
    PairConstraint, Registry,
};
use tracing::{info, warn};

use super::{
    errors::ExchangeError,
    traits::ExchangeApi,
    types::LoadSummary,
    utils::{coin_constraint_from_remote, pair_constraint_from_remote},
};

/// Where an exchange takes its constraints from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceKind {
    LiveApi,
    Microservice,
    Snapshot,
    Relational,
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataSourceKind::LiveApi => "live_api",
            DataSourceKind::Microservice => "microservice",
            DataSourceKind::Snapshot => "snapshot",
            DataSourceKind::Relational => "relational",
        };
        f.write_str(name)
    }
}

impl FromStr for DataSourceKind {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live_api" => Ok(DataSourceKind::LiveApi),
            "microservice" => Ok(DataSourceKind::Microservice),
            "snapshot" => Ok(DataSourceKind::Snapshot),
            "relational" => Ok(DataSourceKind::Relational),
            other => Err(ExchangeError::ParseError(format!(
                "unknown data source kind: {}",
                other
            ))),
        }
    }
}

/// The store a data source fills, with what it needs to resolve IDs
pub struct LoadTarget<'a> {
    pub exchange: ExchangeName,
    pub store: &'a ConstraintStore,
    pub registry: &'a Registry,
}

/// Fills a constraint store from one backend
#[async_trait]
pub trait DataSource: Send + Sync {
    fn kind(&self) -> DataSourceKind;

    async fn populate(&self, target: LoadTarget<'_>) -> Result<LoadSummary, ExchangeError>;
}

/// Fetches coins and pairs from the exchange's REST API
pub struct LiveApiSource {
    api: Arc<dyn ExchangeApi>,
}

impl LiveApiSource {
    pub fn new(api: Arc<dyn ExchangeApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for LiveApiSource {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::LiveApi
    }

    async fn populate(&self, target: LoadTarget<'_>) -> Result<LoadSummary, ExchangeError> {
        // Both fetches must succeed before anything is written
        let (coins, pairs) = tokio::try_join!(self.api.fetch_coins(), self.api.fetch_pairs())?;

        let mut summary = LoadSummary::default();
        for remote in &coins {
            match coin_constraint_from_remote(target.registry, remote) {
                Some(cc) => {
                    target.store.coins.set(cc);
                    summary.coins += 1;
                }
                None => summary.skipped += 1,
            }
        }
        for remote in &pairs {
            match pair_constraint_from_remote(target.registry, remote) {
                Some(pc) => {
                    target.store.pairs.set(pc);
                    summary.pairs += 1;
                }
                None => summary.skipped += 1,
            }
        }
        Ok(summary)
    }
}

/// Population happens in an external service that writes through the
/// administrative API; nothing is fetched locally.
pub struct MicroserviceSource {
    endpoint: Option<String>,
}

impl MicroserviceSource {
    pub fn new(endpoint: Option<String>) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl DataSource for MicroserviceSource {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::Microservice
    }

    async fn populate(&self, target: LoadTarget<'_>) -> Result<LoadSummary, ExchangeError> {
        info!(
            "{}: constraints are managed by microservice {}",
            target.exchange,
            self.endpoint.as_deref().unwrap_or("<unset>")
        );
        Ok(LoadSummary::default())
    }
}

/// Replaces the store with a JSON snapshot from a directory
pub struct SnapshotSource {
    dir: PathBuf,
}

impl SnapshotSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl DataSource for SnapshotSource {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::Snapshot
    }

    async fn populate(&self, target: LoadTarget<'_>) -> Result<LoadSummary, ExchangeError> {
        let data = snapshot::load_exchange(&self.dir, target.exchange).await?;
        let summary = LoadSummary {
            coins: data.coin_constraint.len(),
            pairs: data.pair_constraint.len(),
            skipped: 0,
        };
        target.store.coins.replace_all(data.coin_constraint.into_values());
        target.store.pairs.replace_all(data.pair_constraint.into_values());
        Ok(summary)
    }
}

/// Constraint rows kept in a relational store
#[async_trait]
pub trait ConstraintRows: Send + Sync {
    async fn coin_rows(&self, exchange: ExchangeName) -> Result<Vec<CoinConstraint>, DataError>;

    async fn pair_rows(&self, exchange: ExchangeName) -> Result<Vec<PairConstraint>, DataError>;
}

#[async_trait]
impl ConstraintRows for ConstraintRepository {
    async fn coin_rows(&self, exchange: ExchangeName) -> Result<Vec<CoinConstraint>, DataError> {
        self.load_coin_constraints(exchange).await
    }

    async fn pair_rows(&self, exchange: ExchangeName) -> Result<Vec<PairConstraint>, DataError> {
        self.load_pair_constraints(exchange).await
    }
}

/// Replaces the store with the rows kept in PostgreSQL
pub struct RelationalSource {
    rows: Arc<dyn ConstraintRows>,
}

impl RelationalSource {
    pub fn new(repository: ConstraintRepository) -> Self {
        Self::with_rows(Arc::new(repository))
    }

    pub fn with_rows(rows: Arc<dyn ConstraintRows>) -> Self {
        Self { rows }
    }
}

#[async_trait]
impl DataSource for RelationalSource {
    fn kind(&self) -> DataSourceKind {
        DataSourceKind::Relational
    }

    async fn populate(&self, target: LoadTarget<'_>) -> Result<LoadSummary, ExchangeError> {
        let (coins, pairs) = tokio::try_join!(
            self.rows.coin_rows(target.exchange),
            self.rows.pair_rows(target.exchange)
        )?;
        let summary = LoadSummary {
            coins: coins.len(),
            pairs: pairs.len(),
            skipped: 0,
        };
        target.store.coins.replace_all(coins);
        target.store.pairs.replace_all(pairs);
        Ok(summary)
    }
}

/// Build the data source selected for `exchange`.
///
/// A missing selection or missing backend is a configuration fault: it is
/// logged and the exchange runs without a source.
pub fn build_source(
    exchange: ExchangeName,
    kind: Option<DataSourceKind>,
    uri: Option<&str>,
    api: Arc<dyn ExchangeApi>,
    repository: Option<&ConstraintRepository>,
) -> Option<Arc<dyn DataSource>> {
    let Some(kind) = kind else {
        warn!("{}: no data source selected, constraints stay empty", exchange);
        return None;
    };

    match kind {
        DataSourceKind::LiveApi => Some(Arc::new(LiveApiSource::new(api))),
        DataSourceKind::Microservice => {
            Some(Arc::new(MicroserviceSource::new(uri.map(str::to_string))))
        }
        DataSourceKind::Snapshot => match uri {
            Some(dir) => Some(Arc::new(SnapshotSource::new(dir))),
            None => {
                warn!("{}: snapshot source selected without a directory", exchange);
                None
            }
        },
        DataSourceKind::Relational => match repository {
            Some(repository) => Some(Arc::new(RelationalSource::new(repository.clone()))),
            None => {
                warn!("{}: relational source selected without a database", exchange);
                None
            }
        },
    }
}
