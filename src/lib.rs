pub mod cache;
pub mod config;
pub mod db;
pub mod indexer;
pub mod metrics;
pub mod models;
pub mod sync;

#[cfg(test)]
pub mod tests;

// Re-export specific items for convenience
pub use config::Config;
pub use db::connection;
pub use indexer::client::{ClientError, LedgerClient};
pub use indexer::{refresh_balances, RefreshConfig};
pub use metrics::{build_wallet_metrics, WalletMetricsBundle};
pub use models::TransactionRecord;
pub use sync::{SyncEngine, SyncError, SyncOutcome};
