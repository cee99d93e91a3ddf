pub mod manager;
pub mod types;
pub mod errors;

// Re-export main interfaces
pub use manager::{ExchangeManager, RefreshHandle};
pub use types::*;
pub use errors::ServiceError;
