// =================================================================
// service/manager.rs - Exchange Manager
// =================================================================

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use exchange_common::data::{ExchangeName, Registry};
use futures_util::stream::{self, StreamExt};
use parking_lot::RwLock;
use tokio::sync::{broadcast, OnceCell};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio::{select, spawn};
use tracing::{debug, error, info, warn};

use super::{AdapterOptions, RefreshConfig, RefreshOutcome, RefreshReport, ServiceError, Trigger, UpdateRequest};
use crate::exchange::{api_for, build_source, Exchange, ExchangeAdapter};

type ExchangeCell = Arc<OnceCell<Arc<dyn Exchange>>>;

/// Process-wide registry of live exchanges
pub struct ExchangeManager {
    /// Registration order
    exchanges: RwLock<Vec<Arc<dyn Exchange>>>,
    /// One initializer per identity
    cells: DashMap<ExchangeName, ExchangeCell>,
    config: RefreshConfig,
    shutdown_tx: broadcast::Sender<()>,
    shut_down: AtomicBool,
}

impl ExchangeManager {
    pub fn new(config: RefreshConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            exchanges: RwLock::new(Vec::new()),
            cells: DashMap::new(),
            config,
            shutdown_tx,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Return the exchange for `name`, running `init` only if none exists yet.
    ///
    /// Concurrent first callers wait on the same initialization. A failed
    /// initialization leaves the slot empty so a later call can retry.
    pub async fn get_or_create<F, Fut>(
        &self,
        name: ExchangeName,
        init: F,
    ) -> Result<Arc<dyn Exchange>, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn Exchange>, ServiceError>>,
    {
        // Clone the cell out so no map guard is held across the await
        let cell = self
            .cells
            .entry(name)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let exchange = cell
            .get_or_try_init(move || async move {
                let exchange = init().await?;
                if exchange.name() != name {
                    return Err(ServiceError::Config(format!(
                        "initializer for {} produced {}",
                        name,
                        exchange.name()
                    )));
                }
                self.list(exchange.clone());
                info!("Registered exchange {}", name);
                Ok(exchange)
            })
            .await?;

        Ok(exchange.clone())
    }

    /// Build, initialize and register the adapter for `name` unless it exists.
    ///
    /// A failed first load is logged; the exchange is still registered with
    /// an empty store.
    pub async fn open(
        &self,
        name: ExchangeName,
        registry: Arc<Registry>,
        options: AdapterOptions,
    ) -> Result<Arc<dyn Exchange>, ServiceError> {
        self.get_or_create(name, move || async move {
            let api = options.api.unwrap_or_else(|| api_for(name));
            let source = build_source(
                name,
                options.source,
                options.uri.as_deref(),
                api.clone(),
                options.repository.as_ref(),
            );
            let adapter = ExchangeAdapter::new(api, registry, options.credentials, source);
            if let Err(e) = adapter.initialize().await {
                warn!("{} starts with an empty constraint store: {}", name, e);
            }
            Ok(Arc::new(adapter) as Arc<dyn Exchange>)
        })
        .await
    }

    /// Add or replace an exchange by identity
    pub fn register(&self, exchange: Arc<dyn Exchange>) {
        let name = exchange.name();
        self.cells
            .insert(name, Arc::new(OnceCell::new_with(Some(exchange.clone()))));
        self.list(exchange);
        debug!("Exchange {} registered directly", name);
    }

    fn list(&self, exchange: Arc<dyn Exchange>) {
        let mut exchanges = self.exchanges.write();
        match exchanges.iter_mut().find(|e| e.name() == exchange.name()) {
            Some(slot) => *slot = exchange,
            None => exchanges.push(exchange),
        }
    }

    pub fn get(&self, name: ExchangeName) -> Option<Arc<dyn Exchange>> {
        self.exchanges
            .read()
            .iter()
            .find(|e| e.name() == name)
            .cloned()
    }

    /// Every registered exchange, in registration order
    pub fn all(&self) -> Vec<Arc<dyn Exchange>> {
        self.exchanges.read().clone()
    }

    pub fn names(&self) -> Vec<ExchangeName> {
        self.exchanges.read().iter().map(|e| e.name()).collect()
    }

    pub async fn refresh(&self, request: UpdateRequest) -> Result<RefreshOutcome, ServiceError> {
        match request.trigger {
            Trigger::Immediate => Ok(RefreshOutcome::Completed(
                self.update_now(&request.exchanges).await,
            )),
            Trigger::Interval(period) => Ok(RefreshOutcome::Scheduled(
                self.schedule(&request.exchanges, period)?,
            )),
        }
    }

    /// Refresh the named exchanges once, at most `max_concurrency` at a time
    pub async fn update_now(&self, names: &[ExchangeName]) -> RefreshReport {
        let mut report = RefreshReport::default();
        let mut targets = Vec::with_capacity(names.len());
        for &name in names {
            match self.get(name) {
                Some(exchange) => targets.push(exchange),
                None => {
                    warn!("Refresh requested for unregistered exchange {}", name);
                    report
                        .failed
                        .push((name, ServiceError::UnknownExchange(name).to_string()));
                }
            }
        }

        let results: Vec<_> = stream::iter(targets)
            .map(|exchange| async move { (exchange.name(), exchange.update_constraint().await) })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        for (name, result) in results {
            match result {
                Ok(summary) => report.succeeded.push((name, summary)),
                Err(e) => report.failed.push((name, e.to_string())),
            }
        }

        info!(
            "Refresh finished: {} succeeded, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );
        report
    }

    /// Refresh each named exchange every `period` on its own task.
    ///
    /// The first tick fires immediately. A failing exchange keeps its
    /// schedule and does not affect the others. Tasks run until the handle
    /// cancels them or the manager shuts down; dropping the handle detaches.
    pub fn schedule(
        &self,
        names: &[ExchangeName],
        period: Duration,
    ) -> Result<RefreshHandle, ServiceError> {
        if period.is_zero() {
            return Err(ServiceError::Config(
                "refresh interval must be greater than zero".to_string(),
            ));
        }
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(ServiceError::Shutdown);
        }

        let (cancel_tx, _) = broadcast::channel(1);
        let mut tasks = Vec::new();
        let mut scheduled = Vec::new();
        let mut unknown = Vec::new();

        for &name in names {
            let Some(exchange) = self.get(name) else {
                warn!("Cannot schedule unregistered exchange {}", name);
                unknown.push(name);
                continue;
            };

            let mut cancel_rx = cancel_tx.subscribe();
            // Keeps the cancel channel open once the handle is gone
            let cancel_keepalive = cancel_tx.clone();
            let mut shutdown_rx = self.shutdown_tx.subscribe();

            tasks.push(spawn(async move {
                let _cancel_keepalive = cancel_keepalive;
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    select! {
                        _ = cancel_rx.recv() => {
                            debug!("{} refresh schedule cancelled", name);
                            break;
                        }
                        _ = shutdown_rx.recv() => {
                            debug!("{} refresh schedule stopped by shutdown", name);
                            break;
                        }
                        _ = ticker.tick() => {
                            if let Err(e) = exchange.update_constraint().await {
                                let err = ServiceError::from(e);
                                if err.is_recoverable() {
                                    warn!("{} scheduled refresh failed: {}", name, err);
                                } else {
                                    error!("{} scheduled refresh failed: {}", name, err);
                                }
                            }
                        }
                    }
                }
            }));
            scheduled.push(name);
        }

        info!(
            "Scheduled refresh every {:?} for {:?}",
            period, scheduled
        );

        Ok(RefreshHandle {
            cancel_tx,
            tasks,
            scheduled,
            unknown,
        })
    }

    /// Stop every schedule this manager started
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        // No receivers just means nothing is scheduled
        let _ = self.shutdown_tx.send(());
        info!("Exchange manager shut down");
    }
}

impl Default for ExchangeManager {
    fn default() -> Self {
        Self::new(RefreshConfig::default())
    }
}

/// Controls a running interval refresh.
///
/// Dropping the handle leaves the schedule running until
/// [`ExchangeManager::shutdown`].
#[must_use = "keep the handle to cancel the schedule"]
pub struct RefreshHandle {
    cancel_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
    scheduled: Vec<ExchangeName>,
    unknown: Vec<ExchangeName>,
}

impl RefreshHandle {
    pub fn scheduled(&self) -> &[ExchangeName] {
        &self.scheduled
    }

    /// Names that were requested but not registered
    pub fn unknown(&self) -> &[ExchangeName] {
        &self.unknown
    }

    /// Ask every task to stop after its current tick
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(());
    }

    /// Cancel and wait for every task to finish
    pub async fn stop(self) {
        self.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Refresh task failed: {}", e);
            }
        }
    }

    /// Wait until the schedule ends by cancellation or manager shutdown
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Refresh task failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{
        BinanceApi, BittrexApi, Credentials, DataSource, DataSourceKind, ExchangeApi,
        ExchangeError, LoadSummary, LoadTarget,
    };
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct CountingSource {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl DataSource for CountingSource {
        fn kind(&self) -> DataSourceKind {
            DataSourceKind::LiveApi
        }

        async fn populate(&self, _target: LoadTarget<'_>) -> Result<LoadSummary, ExchangeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ExchangeError::Timeout)
            } else {
                Ok(LoadSummary {
                    coins: 1,
                    pairs: 0,
                    skipped: 0,
                })
            }
        }
    }

    fn registry() -> Arc<Registry> {
        Arc::new(Registry::builder().coin(1, "BTC").build())
    }

    fn counting_exchange(name: ExchangeName, fail: bool) -> (Arc<dyn Exchange>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let api: Arc<dyn ExchangeApi> = match name {
            ExchangeName::Binance => Arc::new(BinanceApi::new()),
            ExchangeName::Bittrex => Arc::new(BittrexApi::new()),
        };
        let source = Arc::new(CountingSource {
            calls: calls.clone(),
            fail,
        });
        let adapter = ExchangeAdapter::new(api, registry(), Credentials::default(), Some(source));
        (Arc::new(adapter), calls)
    }

    #[tokio::test]
    async fn test_get_or_create_initializes_once() {
        let manager = Arc::new(ExchangeManager::default());
        let inits = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let inits = inits.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .get_or_create(ExchangeName::Bittrex, || async move {
                        inits.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(counting_exchange(ExchangeName::Bittrex, false).0)
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(inits.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|e| Arc::ptr_eq(e, &results[0])));
        assert_eq!(manager.names(), vec![ExchangeName::Bittrex]);
    }

    #[tokio::test]
    async fn test_failed_init_can_retry() {
        let manager = ExchangeManager::default();

        let first = manager
            .get_or_create(ExchangeName::Binance, || async {
                Err(ServiceError::Config("no credentials".to_string()))
            })
            .await;
        assert!(first.is_err());
        assert!(manager.get(ExchangeName::Binance).is_none());

        let second = manager
            .get_or_create(ExchangeName::Binance, || async {
                Ok(counting_exchange(ExchangeName::Binance, false).0)
            })
            .await;
        assert!(second.is_ok());
        assert!(manager.get(ExchangeName::Binance).is_some());
    }

    #[tokio::test]
    async fn test_initializer_name_mismatch_rejected() {
        let manager = ExchangeManager::default();
        let result = manager
            .get_or_create(ExchangeName::Binance, || async {
                Ok(counting_exchange(ExchangeName::Bittrex, false).0)
            })
            .await;
        assert!(matches!(result, Err(ServiceError::Config(_))));
        assert!(manager.all().is_empty());
    }

    #[tokio::test]
    async fn test_register_replaces_by_identity() {
        let manager = ExchangeManager::default();
        let (first, _) = counting_exchange(ExchangeName::Bittrex, false);
        let (binance, _) = counting_exchange(ExchangeName::Binance, false);
        let (second, _) = counting_exchange(ExchangeName::Bittrex, false);

        manager.register(first);
        manager.register(binance);
        manager.register(second.clone());

        assert_eq!(
            manager.names(),
            vec![ExchangeName::Bittrex, ExchangeName::Binance]
        );
        let current = manager.get(ExchangeName::Bittrex).unwrap();
        assert!(Arc::ptr_eq(&current, &second));

        // get_or_create sees the registered instance and does not rebuild
        let found = manager
            .get_or_create(ExchangeName::Bittrex, || async {
                Err(ServiceError::Config("should not run".to_string()))
            })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&found, &second));
    }

    #[tokio::test]
    async fn test_immediate_refresh_reports_partial_failure() {
        let manager = ExchangeManager::default();
        let (bittrex, bittrex_calls) = counting_exchange(ExchangeName::Bittrex, true);
        let (binance, binance_calls) = counting_exchange(ExchangeName::Binance, false);
        manager.register(bittrex);
        manager.register(binance);

        let outcome = manager
            .refresh(UpdateRequest::immediate([
                ExchangeName::Bittrex,
                ExchangeName::Binance,
            ]))
            .await
            .unwrap();

        let RefreshOutcome::Completed(report) = outcome else {
            panic!("expected a completed refresh");
        };
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].0, ExchangeName::Binance);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, ExchangeName::Bittrex);
        assert!(!report.is_complete_success());
        assert_eq!(bittrex_calls.load(Ordering::SeqCst), 1);
        assert_eq!(binance_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_exchange_reported() {
        let manager = ExchangeManager::default();
        let (binance, _) = counting_exchange(ExchangeName::Binance, false);
        manager.register(binance);

        let report = manager
            .update_now(&[ExchangeName::Bittrex, ExchangeName::Binance])
            .await;

        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, ExchangeName::Bittrex);
    }

    #[tokio::test]
    async fn test_interval_refresh_ticks_despite_failing_peer() {
        let manager = ExchangeManager::default();
        let (bittrex, bittrex_calls) = counting_exchange(ExchangeName::Bittrex, true);
        let (binance, binance_calls) = counting_exchange(ExchangeName::Binance, false);
        manager.register(bittrex);
        manager.register(binance);

        let period = Duration::from_millis(40);
        let handle = manager
            .schedule(&[ExchangeName::Bittrex, ExchangeName::Binance], period)
            .unwrap();
        assert_eq!(handle.scheduled().len(), 2);

        tokio::time::sleep(period * 3 + Duration::from_millis(30)).await;
        handle.stop().await;

        assert!(bittrex_calls.load(Ordering::SeqCst) >= 3);
        assert!(binance_calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_cancel_stops_ticks() {
        let manager = ExchangeManager::default();
        let (binance, calls) = counting_exchange(ExchangeName::Binance, false);
        manager.register(binance);

        let handle = manager
            .schedule(&[ExchangeName::Binance, ExchangeName::Bittrex], Duration::from_millis(20))
            .unwrap();
        assert_eq!(handle.unknown(), &[ExchangeName::Bittrex]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop().await;
        let after_stop = calls.load(Ordering::SeqCst);
        assert!(after_stop >= 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn test_shutdown_ends_schedules() {
        let manager = ExchangeManager::default();
        let (binance, calls) = counting_exchange(ExchangeName::Binance, false);
        manager.register(binance);

        let handle = manager
            .schedule(&[ExchangeName::Binance], Duration::from_millis(20))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        manager.shutdown();
        handle.join().await;
        let after = calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after);
        assert!(matches!(
            manager.schedule(&[ExchangeName::Binance], Duration::from_millis(20)),
            Err(ServiceError::Shutdown)
        ));
    }

    #[tokio::test]
    async fn test_discarded_handle_keeps_ticking() {
        let manager = ExchangeManager::default();
        let (binance, calls) = counting_exchange(ExchangeName::Binance, false);
        manager.register(binance);

        let period = Duration::from_millis(20);
        let _ = manager
            .refresh(UpdateRequest::every([ExchangeName::Binance], period))
            .await
            .unwrap();

        tokio::time::sleep(period * 10).await;
        let ticks = calls.load(Ordering::SeqCst);
        assert!(ticks >= 3, "only {} ticks after the handle was dropped", ticks);

        manager.shutdown();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let after_shutdown = calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), after_shutdown);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let manager = ExchangeManager::default();
        assert!(matches!(
            manager.schedule(&[], Duration::ZERO),
            Err(ServiceError::Config(_))
        ));
    }
}
