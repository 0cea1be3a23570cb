//! Balance refresh: bounded-concurrency fan-out over an address set.
//!
//! Failed addresses are simply omitted from the result, so a re-run only
//! retries the gap; there is no per-address retry state to persist.

use crate::config::Config;
use crate::db;
use crate::indexer::client::BalanceSource;
use crate::models::{BalanceSnapshot, FirstSeen};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use governor::{Quota, RateLimiter};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU32;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RefreshConfig {
    pub workers: usize,
    pub batch_size: usize,
    pub requests_per_minute: u32,
    pub funded_threshold_ustx: i64,
}

impl RefreshConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.balance_workers,
            batch_size: config.balance_batch_size,
            requests_per_minute: config.balance_requests_per_minute,
            funded_threshold_ustx: config.funded_threshold_ustx(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RefreshProgress {
    pub completed_batches: usize,
    pub total_batches: usize,
    pub processed: usize,
    pub total: usize,
}

pub type ProgressCallback<'a> = &'a (dyn Fn(RefreshProgress) + Send + Sync);

/// Ensure a balance snapshot exists for every address on `as_of_date`.
///
/// Addresses already snapshotted for that date are skipped, failures are
/// omitted, and the returned count covers newly inserted rows only.
pub async fn refresh_balances<S: BalanceSource>(
    source: &S,
    pool: &SqlitePool,
    addresses: &[String],
    as_of_date: NaiveDate,
    config: &RefreshConfig,
    progress: Option<ProgressCallback<'_>>,
    cancel: &CancellationToken,
) -> Result<usize, sqlx::Error> {
    let deduped: Vec<String> = addresses
        .iter()
        .filter(|address| !address.is_empty())
        .cloned()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();
    if deduped.is_empty() {
        return Ok(0);
    }

    let existing = db::balance::existing_snapshot_addresses(pool, as_of_date, &deduped).await?;
    let missing: Vec<String> = deduped
        .into_iter()
        .filter(|address| !existing.contains(address))
        .collect();
    if missing.is_empty() {
        debug!("all {} addresses already snapshotted for {}", existing.len(), as_of_date);
        return Ok(0);
    }

    let quota = Quota::per_minute(NonZeroU32::new(config.requests_per_minute).unwrap_or(NonZeroU32::MIN));
    let limiter = RateLimiter::direct(quota);

    let total = missing.len();
    let batches: Vec<&[String]> = missing.chunks(config.batch_size.max(1)).collect();
    let total_batches = batches.len();
    info!(
        "refreshing balances for {} addresses in {} batches ({} workers, {} rpm)",
        total, total_batches, config.workers, config.requests_per_minute
    );

    let mut snapshots: Vec<BalanceSnapshot> = Vec::new();

    for (batch_index, batch) in batches.into_iter().enumerate() {
        if cancel.is_cancelled() {
            warn!("balance refresh cancelled after {} batches", batch_index);
            break;
        }

        let fetched: Vec<Option<BalanceSnapshot>> = stream::iter(batch.iter())
            .map(|address| {
                let limiter = &limiter;
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    limiter.until_ready().await;
                    match source.fetch_address_balances(address).await {
                        Ok(payload) => {
                            let balance_ustx = payload.balance_ustx();
                            Some(BalanceSnapshot {
                                address: address.clone(),
                                as_of_date,
                                balance_ustx,
                                funded: balance_ustx >= config.funded_threshold_ustx,
                                ingested_at: Utc::now().timestamp(),
                            })
                        }
                        Err(err) => {
                            // Omitted, not fatal: the next run retries the gap.
                            warn!("balance fetch failed for {}: {}", address, err);
                            None
                        }
                    }
                }
            })
            .buffer_unordered(config.workers.max(1))
            .collect()
            .await;

        snapshots.extend(fetched.into_iter().flatten());

        if let Some(callback) = progress {
            callback(RefreshProgress {
                completed_batches: batch_index + 1,
                total_batches,
                processed: snapshots.len(),
                total,
            });
        }
    }

    db::balance::upsert_balances(pool, &snapshots).await?;
    if snapshots.len() < total {
        info!(
            "balance refresh inserted {}/{} snapshots; re-run to retry the rest",
            snapshots.len(),
            total
        );
    }
    Ok(snapshots.len())
}

/// Snapshot activation-day balances for wallets activated within the recent
/// lookback window, grouped per activation date. Feeds the funded-at-D0
/// segmentation input.
pub async fn ensure_activation_day_snapshots<S: BalanceSource>(
    source: &S,
    pool: &SqlitePool,
    first_seen: &[FirstSeen],
    lookback_days: i64,
    today: NaiveDate,
    config: &RefreshConfig,
    progress: Option<ProgressCallback<'_>>,
    cancel: &CancellationToken,
) -> Result<usize, sqlx::Error> {
    if first_seen.is_empty() || lookback_days <= 0 {
        return Ok(0);
    }

    let cutoff = today - ChronoDuration::days((lookback_days - 1).max(0));
    let mut by_activation: BTreeMap<NaiveDate, Vec<String>> = BTreeMap::new();
    for wallet in first_seen {
        let activation = wallet.activation_date();
        if activation >= cutoff {
            by_activation
                .entry(activation)
                .or_default()
                .push(wallet.address.clone());
        }
    }

    let mut inserted = 0;
    for (activation_date, addresses) in by_activation {
        inserted += refresh_balances(
            source,
            pool,
            &addresses,
            activation_date,
            config,
            progress,
            cancel,
        )
        .await?;
    }
    Ok(inserted)
}
