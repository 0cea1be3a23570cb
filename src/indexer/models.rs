//! Payload structs for the ledger-indexing API, with validation and defaults
//! applied at this one deserialization boundary. Anything shaped wrong is
//! dropped or zeroed here, never downstream.

use crate::models::TransactionRecord;
use serde::{Deserialize, Deserializer};

/// One transaction as returned by the paginated listing endpoint. Every field
/// besides the id is optional or defaulted; the acceptance filter decides what
/// actually reaches the store.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    pub tx_id: String,
    #[serde(default)]
    pub sender_address: Option<String>,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub block_height: Option<i64>,
    #[serde(default)]
    pub burn_block_time: Option<i64>,
    #[serde(default)]
    pub burn_block_height: Option<i64>,
    #[serde(default)]
    pub microblock_sequence: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub fee: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub fee_rate: Option<i64>,
    #[serde(default)]
    pub tx_type: Option<String>,
    #[serde(default)]
    pub canonical: bool,
    #[serde(default)]
    pub tx_status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionsPage {
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub results: Vec<RawTransaction>,
}

/// Balance payload for an address principal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressBalances {
    #[serde(default)]
    pub stx: Option<StxBalance>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StxBalance {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub balance: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub locked: Option<i64>,
}

impl AddressBalances {
    /// Spendable balance, falling back to the locked amount; malformed or
    /// missing values count as zero.
    pub fn balance_ustx(&self) -> i64 {
        match &self.stx {
            Some(stx) => stx.balance.or(stx.locked).unwrap_or(0),
            None => 0,
        }
    }
}

/// Acceptance filter: only canonical, successfully-executed transactions with
/// a known sender and timestamp carry wallet-activity signal. Everything else
/// is rejected by returning `None`.
pub fn extract_record(raw: &RawTransaction, ingested_at: i64) -> Option<TransactionRecord> {
    let sender = raw.sender_address.as_deref().filter(|s| !s.is_empty())?;
    if !raw.canonical {
        return None;
    }
    if raw.tx_status.as_deref() != Some("success") {
        return None;
    }
    let block_time = raw.block_time?;
    Some(TransactionRecord {
        tx_id: raw.tx_id.clone(),
        block_time,
        block_height: raw.block_height,
        sender_address: sender.to_string(),
        fee_ustx: raw.fee.or(raw.fee_rate).unwrap_or(0),
        tx_type: raw.tx_type.clone(),
        canonical: raw.canonical,
        tx_status: "success".to_string(),
        burn_block_time: raw.burn_block_time,
        burn_block_height: raw.burn_block_height,
        microblock_sequence: raw.microblock_sequence,
        ingested_at,
    })
}

/// Derive the next pagination cursor from an unfiltered page: one second
/// before the oldest anchoring timestamp seen, burn time preferred. `None`
/// when no record carries a usable timestamp.
pub fn page_cursor(results: &[RawTransaction]) -> Option<i64> {
    results
        .iter()
        .filter_map(|tx| tx.burn_block_time.or(tx.block_time))
        .min()
        .map(|oldest| oldest - 1)
}

/// Accept integers encoded as JSON numbers or numeric strings; anything else
/// becomes `None` rather than failing the whole page.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}
