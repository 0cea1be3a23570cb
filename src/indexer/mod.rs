pub mod balances;
pub mod client;
pub mod models;
pub mod retry;

pub use balances::{refresh_balances, RefreshConfig, RefreshProgress};
pub use client::{BalanceSource, ClientError, LedgerClient, PageRequest, TransactionsSource};
pub use models::{AddressBalances, RawTransaction, TransactionsPage};
pub use retry::RetryPolicy;
