use std::sync::Arc;
use std::time::Duration;

use exchange_common::data::{ConstraintRepository, ExchangeName};

use crate::exchange::{Credentials, DataSourceKind, ExchangeApi, LoadSummary};

use super::manager::RefreshHandle;

/// Refresh coordination settings
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum exchanges refreshed at the same time by an immediate refresh
    pub max_concurrency: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// How to build one exchange adapter
#[derive(Default)]
pub struct AdapterOptions {
    pub source: Option<DataSourceKind>,
    /// Snapshot directory or microservice endpoint
    pub uri: Option<String>,
    pub credentials: Credentials,
    pub repository: Option<ConstraintRepository>,
    /// Remote client override; the exchange's REST client when unset
    pub api: Option<Arc<dyn ExchangeApi>>,
}

/// When a refresh runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Once, now
    Immediate,
    /// Every period until cancelled; the first tick fires immediately
    Interval(Duration),
}

/// Which exchanges to refresh and when
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub exchanges: Vec<ExchangeName>,
    pub trigger: Trigger,
}

impl UpdateRequest {
    pub fn immediate(exchanges: impl IntoIterator<Item = ExchangeName>) -> Self {
        Self::new(exchanges, Trigger::Immediate)
    }

    pub fn every(exchanges: impl IntoIterator<Item = ExchangeName>, period: Duration) -> Self {
        Self::new(exchanges, Trigger::Interval(period))
    }

    /// Duplicate names are dropped, first occurrence wins
    pub fn new(exchanges: impl IntoIterator<Item = ExchangeName>, trigger: Trigger) -> Self {
        let mut names: Vec<ExchangeName> = Vec::new();
        for name in exchanges {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Self {
            exchanges: names,
            trigger,
        }
    }
}

/// Result of an immediate refresh
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub succeeded: Vec<(ExchangeName, LoadSummary)>,
    pub failed: Vec<(ExchangeName, String)>,
}

impl RefreshReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What [`super::ExchangeManager::refresh`] started
#[must_use]
pub enum RefreshOutcome {
    Completed(RefreshReport),
    Scheduled(RefreshHandle),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deduplicates_names() {
        let request = UpdateRequest::immediate([
            ExchangeName::Bittrex,
            ExchangeName::Binance,
            ExchangeName::Bittrex,
        ]);
        assert_eq!(
            request.exchanges,
            vec![ExchangeName::Bittrex, ExchangeName::Binance]
        );
        assert_eq!(request.trigger, Trigger::Immediate);
    }

    #[test]
    fn test_interval_request() {
        let request = UpdateRequest::every([ExchangeName::Binance], Duration::from_secs(10));
        assert_eq!(request.trigger, Trigger::Interval(Duration::from_secs(10)));
    }
}
