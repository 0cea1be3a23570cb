pub mod balance;
pub mod connection;
pub mod segmented;
pub mod transaction;
pub mod wallet;

use chrono::NaiveDate;

pub const INIT_SCHEMA: &str = r#"
-- Transactions: the single source of truth, keyed by transaction id
CREATE TABLE IF NOT EXISTS transactions (
    tx_id TEXT PRIMARY KEY,
    block_time INTEGER NOT NULL,
    block_height INTEGER,
    sender_address TEXT NOT NULL,
    fee_ustx INTEGER NOT NULL,
    tx_type TEXT,
    canonical BOOLEAN NOT NULL,
    tx_status TEXT NOT NULL,
    burn_block_time INTEGER,
    burn_block_height INTEGER,
    microblock_sequence INTEGER,
    ingested_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transactions_block_time ON transactions(block_time);
CREATE INDEX IF NOT EXISTS idx_transactions_sender_time ON transactions(sender_address, block_time);

-- Earliest valid transaction timestamp per wallet, merged minimum-wins
CREATE TABLE IF NOT EXISTS wallet_first_seen (
    address TEXT PRIMARY KEY,
    first_seen INTEGER NOT NULL
);

-- Balance snapshots, one per wallet per day
CREATE TABLE IF NOT EXISTS wallet_balances (
    address TEXT NOT NULL,
    as_of_date TEXT NOT NULL,
    balance_ustx INTEGER NOT NULL,
    funded BOOLEAN NOT NULL,
    ingested_at INTEGER NOT NULL,
    PRIMARY KEY (address, as_of_date)
);

-- Segmented retention panel, fully derived and replaced wholesale
CREATE TABLE IF NOT EXISTS retention_segmented (
    window_days INTEGER NOT NULL,
    segment TEXT NOT NULL,
    retained_users INTEGER NOT NULL,
    eligible_users INTEGER NOT NULL,
    retention_pct REAL NOT NULL,
    anchor_window_days INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (window_days, segment)
);
"#;

/// SQLite variable limit headroom for dynamically built IN () lists.
pub(crate) const BIND_CHUNK: usize = 500;

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, sqlx::Error> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|err| sqlx::Error::Decode(Box::new(err)))
}
