//! Shared fixtures: an in-memory store, scripted upstream sources and row
//! builders.

use crate::db;
use crate::indexer::client::{BalanceSource, ClientError, PageRequest, TransactionsSource};
use crate::indexer::models::{AddressBalances, RawTransaction, TransactionsPage};
use crate::models::{ActivityRow, FirstSeen, TransactionRecord};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// A single-connection in-memory database so every query sees the same state.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");
    db::connection::run_migrations(&pool)
        .await
        .expect("failed to apply schema");
    pool
}

pub fn day(year: i32, month: u32, dom: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, dom).unwrap()
}

pub fn at(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(10, 0, 0).unwrap().and_utc()
}

pub fn activity(tx_id: &str, address: &str, when: DateTime<Utc>, fee_ustx: i64) -> ActivityRow {
    ActivityRow {
        tx_id: tx_id.to_string(),
        address: address.to_string(),
        block_time: when,
        activity_date: when.date_naive(),
        fee_ustx,
        tx_type: Some("contract_call".to_string()),
    }
}

pub fn first_seen(address: &str, when: DateTime<Utc>) -> FirstSeen {
    FirstSeen {
        address: address.to_string(),
        first_seen: when,
    }
}

pub fn raw_tx(value: serde_json::Value) -> RawTransaction {
    serde_json::from_value(value).expect("raw transaction json")
}

/// A transaction that passes the acceptance filter, anchored at `block_time`
/// for both timestamps.
pub fn valid_tx(id: &str, sender: &str, block_time: i64) -> RawTransaction {
    raw_tx(serde_json::json!({
        "tx_id": id,
        "sender_address": sender,
        "block_time": block_time,
        "burn_block_time": block_time,
        "block_height": 100,
        "fee_rate": "1000",
        "tx_type": "contract_call",
        "canonical": true,
        "tx_status": "success",
    }))
}

/// A non-canonical transaction; rejected by the filter but still carrying a
/// burn timestamp for cursor derivation.
pub fn orphaned_tx(id: &str, burn_block_time: i64) -> RawTransaction {
    raw_tx(serde_json::json!({
        "tx_id": id,
        "sender_address": "SPORPHAN",
        "block_time": burn_block_time,
        "burn_block_time": burn_block_time,
        "canonical": false,
        "tx_status": "success",
    }))
}

pub fn page(results: Vec<RawTransaction>) -> TransactionsPage {
    TransactionsPage {
        limit: 50,
        offset: 0,
        total: results.len() as i64,
        results,
    }
}

pub fn record(id: &str, sender: &str, block_time: i64) -> TransactionRecord {
    TransactionRecord {
        tx_id: id.to_string(),
        block_time,
        block_height: Some(100),
        sender_address: sender.to_string(),
        fee_ustx: 1000,
        tx_type: Some("contract_call".to_string()),
        canonical: true,
        tx_status: "success".to_string(),
        burn_block_time: Some(block_time),
        burn_block_height: Some(90),
        microblock_sequence: None,
        ingested_at: 0,
    }
}

/// Serves transaction pages keyed by the requested `end_time` and records
/// every request for assertions on cursor behaviour.
pub struct ScriptedSource {
    pages: HashMap<Option<i64>, TransactionsPage>,
    pub requests: Mutex<Vec<PageRequest>>,
}

impl ScriptedSource {
    pub fn new(pages: Vec<(Option<i64>, TransactionsPage)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn cursors(&self) -> Vec<Option<i64>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.end_time)
            .collect()
    }
}

#[async_trait]
impl TransactionsSource for ScriptedSource {
    async fn fetch_transactions_page(
        &self,
        request: &PageRequest,
    ) -> Result<TransactionsPage, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self
            .pages
            .get(&request.end_time)
            .cloned()
            .unwrap_or_default())
    }
}

/// Balance source with scripted balances, scripted failures, and a call log.
pub struct FakeBalanceSource {
    balances: HashMap<String, i64>,
    failing: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeBalanceSource {
    pub fn new(balances: &[(&str, i64)], failing: &[&str]) -> Self {
        Self {
            balances: balances
                .iter()
                .map(|(address, balance)| (address.to_string(), *balance))
                .collect(),
            failing: failing.iter().map(|address| address.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn called_addresses(&self) -> Vec<String> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

#[async_trait]
impl BalanceSource for FakeBalanceSource {
    async fn fetch_address_balances(
        &self,
        principal: &str,
    ) -> Result<AddressBalances, ClientError> {
        self.calls.lock().unwrap().push(principal.to_string());
        if self.failing.contains(principal) {
            return Err(ClientError::Status {
                status: 500,
                url: format!("/extended/v1/address/{}/balances", principal),
            });
        }
        let balance = self.balances.get(principal).copied().unwrap_or(0);
        Ok(serde_json::from_value(serde_json::json!({
            "stx": { "balance": balance.to_string() }
        }))
        .unwrap())
    }
}
