pub mod types;
pub mod registry;
pub mod cache;
pub mod snapshot;
pub mod repository;

pub use cache::{BalanceTable, ConstraintRecord, ConstraintStore, ConstraintTable};
pub use registry::{Registry, RegistryBuilder};
pub use repository::{ConstraintRepository, DatabaseOptions};
pub use snapshot::ExchangeSnapshot;
pub use types::*;
