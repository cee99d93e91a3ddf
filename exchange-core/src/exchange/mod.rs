// exchange/mod.rs
pub mod traits;
pub mod types;
pub mod errors;
pub mod utils;
pub mod source;
pub mod adapter;
pub mod binance;
pub mod bittrex;

use std::sync::Arc;

use exchange_common::data::ExchangeName;

// Re-export main interfaces for easy access
pub use adapter::ExchangeAdapter;
pub use binance::BinanceApi;
pub use bittrex::BittrexApi;
pub use errors::{ConstraintKind, ExchangeError};
pub use source::{build_source, ConstraintRows, DataSource, DataSourceKind, LoadTarget};
pub use traits::{Exchange, ExchangeApi};
pub use types::*;

/// REST client for a supported exchange
pub fn api_for(name: ExchangeName) -> Arc<dyn ExchangeApi> {
    match name {
        ExchangeName::Binance => Arc::new(BinanceApi::new()),
        ExchangeName::Bittrex => Arc::new(BittrexApi::new()),
    }
}
