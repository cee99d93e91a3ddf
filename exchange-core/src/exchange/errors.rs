// =================================================================
// exchange/errors.rs - Error Types
// =================================================================

use exchange_common::data::{DataError, ExchangeName};
use thiserror::Error;

/// Error types for exchange operations
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Data parsing error: {0}")]
    ParseError(String),

    #[error("Connection timeout")]
    Timeout,

    #[error("Exchange API error: {0}")]
    ApiError(String),

    #[error("{exchange}: {kind} constraint for id {id} is not loaded")]
    ConstraintNotLoaded {
        exchange: ExchangeName,
        kind: ConstraintKind,
        id: u32,
    },

    #[error("Data error: {0}")]
    Data(#[from] DataError),
}

/// Which constraint table a lookup went to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Coin,
    Pair,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstraintKind::Coin => f.write_str("coin"),
            ConstraintKind::Pair => f.write_str("pair"),
        }
    }
}

// Convert from common error types
impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout
        } else if err.is_connect() {
            ExchangeError::NetworkError(err.to_string())
        } else {
            ExchangeError::ApiError(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_not_loaded_message() {
        let err = ExchangeError::ConstraintNotLoaded {
            exchange: ExchangeName::Bittrex,
            kind: ConstraintKind::Pair,
            id: 10,
        };
        assert_eq!(err.to_string(), "bittrex: pair constraint for id 10 is not loaded");
    }

    #[test]
    fn test_json_error_becomes_parse_error() {
        let err: ExchangeError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ExchangeError::ParseError(_)));
    }
}
