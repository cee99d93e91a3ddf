use exchange_common::data::ExchangeName;
use thiserror::Error;

use crate::exchange::ExchangeError;

/// Service layer error types
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Exchange not registered: {0}")]
    UnknownExchange(ExchangeName),

    #[error("Service shutdown")]
    Shutdown,
}

impl ServiceError {
    /// Check if error is recoverable
    ///
    /// Transport faults clear up on a later attempt; malformed data and
    /// configuration faults do not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ServiceError::Exchange(e) => !matches!(
                e,
                ExchangeError::ParseError(_) | ExchangeError::Data(_)
            ),
            ServiceError::UnknownExchange(_) => false,
            ServiceError::Shutdown => false,
            ServiceError::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exchange_common::data::DataError;

    #[test]
    fn test_recoverable() {
        assert!(ServiceError::Exchange(ExchangeError::Timeout).is_recoverable());
        assert!(ServiceError::from(ExchangeError::RateLimit("429".to_string())).is_recoverable());
        assert!(!ServiceError::from(ExchangeError::ParseError("bad json".to_string())).is_recoverable());
        assert!(!ServiceError::from(ExchangeError::Data(DataError::UnknownCoin("DOGE".to_string())))
            .is_recoverable());
        assert!(!ServiceError::UnknownExchange(ExchangeName::Binance).is_recoverable());
        assert!(!ServiceError::Config("bad".to_string()).is_recoverable());
    }
}
