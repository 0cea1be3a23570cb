//! Cohort and retention analytics derived from the ledger store. Everything
//! here is recomputable from stored transactions plus the first-seen table;
//! nothing in this module is a source of truth.

pub mod fees;
pub mod retention;
pub mod segmented;
pub mod wallets;

pub use fees::compute_fee_per_wallet;
pub use retention::{compute_retention, RetentionMode};
pub use segmented::{build_segmented_panel, compute_segmented_retention, compute_value_flags};
pub use wallets::{compute_active_wallets, compute_new_wallets};

use crate::db;
use crate::indexer::client::TransactionsSource;
use crate::models::{
    ActiveWalletsRow, ActivityRow, FeePerWalletRow, FirstSeen, NewWalletsRow, RetentionRow,
};
use crate::sync::{SyncEngine, SyncError};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use sqlx::SqlitePool;
use std::collections::HashMap;

/// 2024-12-23T00:00:00Z. The upstream index has no reliable coverage before
/// this, so analytics ignore anything earlier.
pub const DATA_COVERAGE_START_EPOCH: i64 = 1_734_912_000;

pub fn data_coverage_start() -> DateTime<Utc> {
    DateTime::from_timestamp(DATA_COVERAGE_START_EPOCH, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

pub fn coverage_floor_date() -> NaiveDate {
    data_coverage_start().date_naive()
}

/// Sorted, deduplicated, strictly positive window lengths.
pub(crate) fn normalize_windows(windows: &[u32]) -> Vec<u32> {
    let mut normalized: Vec<u32> = windows.iter().copied().filter(|w| *w > 0).collect();
    normalized.sort_unstable();
    normalized.dedup();
    normalized
}

/// Container for the wallet-level metric tables.
#[derive(Debug)]
pub struct WalletMetricsBundle {
    pub activity: Vec<ActivityRow>,
    pub first_seen: Vec<FirstSeen>,
    pub new_wallets: Vec<NewWalletsRow>,
    pub active_wallets: Vec<ActiveWalletsRow>,
    pub retention: Vec<RetentionRow>,
    pub fee_per_wallet: Vec<FeePerWalletRow>,
}

/// Wallet activity within the trailing `max_days` horizon.
pub async fn load_recent_activity(
    pool: &SqlitePool,
    max_days: i64,
) -> Result<Vec<ActivityRow>, sqlx::Error> {
    let cutoff = Utc::now() - ChronoDuration::days(max_days);
    db::transaction::recent_activity(pool, cutoff.timestamp(), coverage_floor_date()).await
}

/// Merge the earliest observed timestamp per wallet into the first-seen table
/// (minimum wins) and return the merged view.
pub async fn update_first_seen(
    pool: &SqlitePool,
    activity: &[ActivityRow],
) -> Result<Vec<FirstSeen>, sqlx::Error> {
    let mut minima: HashMap<&str, i64> = HashMap::new();
    for row in activity {
        let timestamp = row.block_time.timestamp();
        minima
            .entry(row.address.as_str())
            .and_modify(|current| *current = (*current).min(timestamp))
            .or_insert(timestamp);
    }
    let entries: Vec<(String, i64)> = minima
        .into_iter()
        .map(|(address, first_seen)| (address.to_string(), first_seen))
        .collect();
    db::wallet::merge_first_seen(pool, &entries).await?;
    db::wallet::load_first_seen(pool, DATA_COVERAGE_START_EPOCH).await
}

/// Sync the store over the requested horizon, then compute the full metric
/// bundle from it.
pub async fn build_wallet_metrics<S: TransactionsSource>(
    engine: &SyncEngine<'_, S>,
    max_days: i64,
    windows: &[u32],
    force_refresh: bool,
) -> Result<WalletMetricsBundle, SyncError> {
    engine.ensure_history(max_days, force_refresh).await?;

    let pool = engine.pool();
    let activity = load_recent_activity(pool, max_days).await?;
    let first_seen = update_first_seen(pool, &activity).await?;

    let today = Utc::now().date_naive();
    let start = (Utc::now() - ChronoDuration::days(max_days)).date_naive();

    let new_wallets = wallets::compute_new_wallets(&first_seen, start);
    let active_wallets = wallets::compute_active_wallets(&activity, start);
    let retention = retention::compute_retention(
        &activity,
        &first_seen,
        windows,
        today,
        RetentionMode::Cumulative,
        None,
    );
    let fee_per_wallet = fees::compute_fee_per_wallet(&activity, &first_seen, windows, today);

    Ok(WalletMetricsBundle {
        activity,
        first_seen,
        new_wallets,
        active_wallets,
        retention,
        fee_per_wallet,
    })
}
