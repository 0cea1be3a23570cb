// Domain records shared across the store, sync engine and aggregators.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Micro-STX per STX, used when converting stored integer fees to display units.
pub const MICROSTX_PER_STX: i64 = 1_000_000;

/// A canonical, successfully-executed transaction as kept in the ledger store.
///
/// `tx_id` is globally unique; re-fetching a page upserts by id, so duplicate
/// rows can never accumulate. Timestamps are unix seconds (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub tx_id: String,
    pub block_time: i64,
    pub block_height: Option<i64>,
    pub sender_address: String,
    pub fee_ustx: i64,
    pub tx_type: Option<String>,
    pub canonical: bool,
    pub tx_status: String,
    pub burn_block_time: Option<i64>,
    pub burn_block_height: Option<i64>,
    pub microblock_sequence: Option<i64>,
    pub ingested_at: i64,
}

/// One row of wallet activity as read back from the store for aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityRow {
    pub tx_id: String,
    pub address: String,
    pub block_time: DateTime<Utc>,
    pub activity_date: NaiveDate,
    pub fee_ustx: i64,
    pub tx_type: Option<String>,
}

/// Earliest known valid transaction timestamp per wallet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirstSeen {
    pub address: String,
    pub first_seen: DateTime<Utc>,
}

impl FirstSeen {
    /// Activation date = first_seen floored to the UTC day.
    pub fn activation_date(&self) -> NaiveDate {
        self.first_seen.date_naive()
    }
}

/// Balance snapshot for a wallet on a given date.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceSnapshot {
    pub address: String,
    pub as_of_date: NaiveDate,
    pub balance_ustx: i64,
    pub funded: bool,
    pub ingested_at: i64,
}

/// Cohort retention for one activation date and window length.
#[derive(Debug, Clone, Serialize)]
pub struct RetentionRow {
    pub activation_date: NaiveDate,
    pub window_days: u32,
    pub cohort_size: u64,
    pub retained_wallets: u64,
    pub retention_rate: f64,
}

/// Per-cohort fee statistics over an activation window, in STX.
#[derive(Debug, Clone, Serialize)]
pub struct FeePerWalletRow {
    pub activation_date: NaiveDate,
    pub window_days: u32,
    pub avg_fee_stx: f64,
    pub median_fee_stx: f64,
    pub wallets_observed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewWalletsRow {
    pub activation_date: NaiveDate,
    pub new_wallets: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveWalletsRow {
    pub activity_date: NaiveDate,
    pub active_wallets: u64,
    pub rolling_7d: f64,
    pub rolling_30d: f64,
}

/// Whether a wallet generated meaningful fee volume in its first month.
#[derive(Debug, Clone, Serialize)]
pub struct ValueFlag {
    pub address: String,
    pub activation_date: NaiveDate,
    pub value_30d: bool,
}

/// One row of the segmented retention panel. `eligible_users` is computed once
/// from the anchor window and shared across every window length so the curves
/// stay comparable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentedRetentionRow {
    pub window_days: u32,
    pub segment: String,
    pub retained_users: u64,
    pub eligible_users: u64,
    pub retention_pct: f64,
    pub anchor_window_days: u32,
    pub updated_at: i64,
}
