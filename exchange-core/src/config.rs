use config::{Config, ConfigError, File, FileFormat};
use exchange_common::data::{ConstraintRepository, DatabaseOptions, ExchangeName};
use serde::Deserialize;
use tracing::warn;

use crate::exchange::{Credentials, DataSourceKind};
use crate::service::{AdapterOptions, RefreshConfig};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Source {
    /// One of `live_api`, `microservice`, `snapshot`, `relational`
    pub kind: Option<String>,
    /// Snapshot directory or microservice endpoint
    pub uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Refresh {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for Refresh {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeSettings {
    pub name: String,
    /// Overrides the top-level source for this exchange
    pub source: Option<Source>,
    #[serde(default)]
    pub credentials: Credentials,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Directory holding coin.json and pair.json
    #[serde(default = "default_registry_dir")]
    pub registry_dir: String,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub refresh: Refresh,
    pub database: Option<Database>,
    #[serde(default)]
    pub exchanges: Vec<ExchangeSettings>,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_max_concurrency() -> usize {
    4
}

fn default_max_connections() -> u32 {
    5
}

fn default_registry_dir() -> String {
    "./data".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "../config".into());

        let mut builder = Config::builder()
            .add_source(File::with_name(&format!("{}/{}", config_dir, run_mode)).required(true));

        if let Ok(database_url) = std::env::var("DATABASE_URL") {
            builder = builder.set_override("database.url", database_url)?;
        }

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.apply_credential_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Fill credentials from `<EXCHANGE>_API_KEY` and `<EXCHANGE>_API_SECRET`
    pub fn apply_credential_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for exchange in &mut self.exchanges {
            let prefix = exchange.name.trim().to_uppercase();
            if let Some(key) = lookup(&format!("{}_API_KEY", prefix)) {
                exchange.credentials.api_key = key;
            }
            if let Some(secret) = lookup(&format!("{}_API_SECRET", prefix)) {
                exchange.credentials.api_secret = secret;
            }
        }
    }

    /// Configured exchanges with a recognized name, in file order
    pub fn exchange_names(&self) -> Vec<ExchangeName> {
        self.exchanges
            .iter()
            .filter_map(|e| match e.name.parse::<ExchangeName>() {
                Ok(name) => Some(name),
                Err(err) => {
                    warn!("Skipping configured exchange: {}", err);
                    None
                }
            })
            .collect()
    }

    pub fn exchange(&self, name: ExchangeName) -> Option<&ExchangeSettings> {
        self.exchanges
            .iter()
            .find(|e| e.name.parse::<ExchangeName>().ok() == Some(name))
    }

    /// Resolve how to build `name`'s adapter.
    ///
    /// An unrecognized source kind is logged and the exchange runs without a
    /// source.
    pub fn adapter_options(
        &self,
        name: ExchangeName,
        repository: Option<&ConstraintRepository>,
    ) -> AdapterOptions {
        let exchange = self.exchange(name);
        let source = exchange
            .and_then(|e| e.source.as_ref())
            .unwrap_or(&self.source);

        let kind = source.kind.as_deref().and_then(|kind| {
            match kind.parse::<DataSourceKind>() {
                Ok(kind) => Some(kind),
                Err(e) => {
                    warn!("{}: {}", name, e);
                    None
                }
            }
        });

        AdapterOptions {
            source: kind,
            uri: source.uri.clone(),
            credentials: exchange.map(|e| e.credentials.clone()).unwrap_or_default(),
            repository: repository.cloned(),
            api: None,
        }
    }

    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            max_concurrency: self.refresh.max_concurrency,
        }
    }

    pub fn database_options(&self) -> Option<DatabaseOptions> {
        self.database.as_ref().map(|db| DatabaseOptions {
            url: db.url.clone(),
            max_connections: db.max_connections,
        })
    }
}
