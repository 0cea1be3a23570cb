//! Retention segmented by funded-at-activation and value-generating wallets.
//!
//! The eligible-cohort denominator is fixed once, from the largest matured
//! window (the anchor), and shared across every usable window length so the
//! segment curves stay comparable.

use super::{data_coverage_start, normalize_windows};
use crate::db;
use crate::indexer::balances::{
    ensure_activation_day_snapshots, ProgressCallback, RefreshConfig,
};
use crate::indexer::client::BalanceSource;
use crate::models::{ActivityRow, FirstSeen, SegmentedRetentionRow, ValueFlag, MICROSTX_PER_STX};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tokio_util::sync::CancellationToken;

/// Window used to derive the value flag and the fee volume that qualifies.
pub const VALUE_WINDOW_DAYS: u32 = 30;
pub const VALUE_MIN_FEE_STX: f64 = 1.0;

pub const SEGMENT_ALL: &str = "All";
pub const SEGMENT_VALUE: &str = "Value";
pub const SEGMENT_NON_VALUE: &str = "Non-value";

/// Funded-at-activation state for one wallet, read back from the balance
/// snapshot taken on its activation day.
#[derive(Debug, Clone)]
pub struct ActivationFunding {
    pub address: String,
    pub activation_date: NaiveDate,
    pub funded_d0: bool,
    pub has_snapshot: bool,
}

pub async fn load_activation_funding(
    pool: &SqlitePool,
    first_seen: &[FirstSeen],
) -> Result<Vec<ActivationFunding>, sqlx::Error> {
    let coverage = data_coverage_start();
    let scoped: Vec<(&str, NaiveDate)> = first_seen
        .iter()
        .filter(|wallet| wallet.first_seen >= coverage)
        .map(|wallet| (wallet.address.as_str(), wallet.activation_date()))
        .collect();
    if scoped.is_empty() {
        return Ok(Vec::new());
    }

    let dates: Vec<NaiveDate> = scoped
        .iter()
        .map(|(_, date)| *date)
        .collect::<BTreeSet<NaiveDate>>()
        .into_iter()
        .collect();
    let snapshots = db::balance::balances_for_dates(pool, &dates).await?;
    let lookup: HashMap<(String, NaiveDate), bool> = snapshots
        .into_iter()
        .map(|snapshot| ((snapshot.address, snapshot.as_of_date), snapshot.funded))
        .collect();

    Ok(scoped
        .into_iter()
        .map(|(address, activation_date)| {
            let funded = lookup.get(&(address.to_string(), activation_date));
            ActivationFunding {
                address: address.to_string(),
                activation_date,
                funded_d0: funded.copied().unwrap_or(false),
                has_snapshot: funded.is_some(),
            }
        })
        .collect())
}

/// Flag wallets whose fee volume within the first `window_days` days of
/// activation (inclusive) reaches `min_fee_stx`.
pub fn compute_value_flags(
    activity: &[ActivityRow],
    first_seen: &[FirstSeen],
    window_days: u32,
    min_fee_stx: f64,
) -> Vec<ValueFlag> {
    if first_seen.is_empty() {
        return Vec::new();
    }
    let coverage = data_coverage_start();
    let activation: Vec<(&str, NaiveDate)> = first_seen
        .iter()
        .filter(|wallet| wallet.first_seen >= coverage)
        .map(|wallet| (wallet.address.as_str(), wallet.activation_date()))
        .collect();
    if activation.is_empty() {
        return Vec::new();
    }
    let activation_map: HashMap<&str, NaiveDate> = activation.iter().copied().collect();

    let mut fee_totals: HashMap<&str, f64> = HashMap::new();
    for row in activity {
        let Some(activation_date) = activation_map.get(row.address.as_str()) else {
            continue;
        };
        let days = (row.activity_date - *activation_date).num_days();
        if days < 0 || days > window_days as i64 {
            continue;
        }
        *fee_totals.entry(row.address.as_str()).or_insert(0.0) +=
            row.fee_ustx as f64 / MICROSTX_PER_STX as f64;
    }

    activation
        .into_iter()
        .map(|(address, activation_date)| ValueFlag {
            address: address.to_string(),
            activation_date,
            value_30d: fee_totals.get(address).copied().unwrap_or(0.0) >= min_fee_stx,
        })
        .collect()
}

/// Aggregate retention for the All / Value / Non-value segments with a fixed
/// eligible denominator derived from the anchor window.
pub fn compute_segmented_retention(
    activity: &[ActivityRow],
    first_seen: &[FirstSeen],
    windows: &[u32],
    funding: &[ActivationFunding],
    value_flags: &[ValueFlag],
    today: NaiveDate,
) -> Vec<SegmentedRetentionRow> {
    if activity.is_empty() || first_seen.is_empty() || funding.is_empty() {
        return Vec::new();
    }
    let windows = normalize_windows(windows);
    if windows.is_empty() {
        return Vec::new();
    }

    let coverage = data_coverage_start();
    let funding_map: HashMap<(&str, NaiveDate), (bool, bool)> = funding
        .iter()
        .map(|entry| {
            (
                (entry.address.as_str(), entry.activation_date),
                (entry.funded_d0, entry.has_snapshot),
            )
        })
        .collect();
    let flag_map: HashMap<(&str, NaiveDate), bool> = value_flags
        .iter()
        .map(|flag| ((flag.address.as_str(), flag.activation_date), flag.value_30d))
        .collect();

    // Membership: wallets funded on their activation day, in "All" plus one of
    // the value segments.
    let mut member_index: HashMap<&str, Vec<(&'static str, NaiveDate)>> = HashMap::new();
    let mut cohort_sizes: BTreeMap<(&'static str, NaiveDate), u64> = BTreeMap::new();
    for wallet in first_seen {
        if wallet.first_seen < coverage {
            continue;
        }
        let address = wallet.address.as_str();
        let activation_date = wallet.activation_date();
        let Some((funded, has_snapshot)) = funding_map.get(&(address, activation_date)) else {
            continue;
        };
        if !(*funded && *has_snapshot) {
            continue;
        }
        let value_segment = if flag_map
            .get(&(address, activation_date))
            .copied()
            .unwrap_or(false)
        {
            SEGMENT_VALUE
        } else {
            SEGMENT_NON_VALUE
        };
        for segment in [SEGMENT_ALL, value_segment] {
            member_index
                .entry(address)
                .or_default()
                .push((segment, activation_date));
            *cohort_sizes.entry((segment, activation_date)).or_insert(0) += 1;
        }
    }
    if cohort_sizes.is_empty() {
        return Vec::new();
    }

    // Anchor: the largest window with any matured cohort. Windows beyond it
    // are dropped rather than reported against a different denominator.
    let mut anchor: Option<(u32, NaiveDate)> = None;
    for candidate in windows.iter().rev() {
        let maturity_cutoff = today - ChronoDuration::days(*candidate as i64);
        if cohort_sizes.keys().any(|(_, date)| *date <= maturity_cutoff) {
            anchor = Some((*candidate, maturity_cutoff));
            break;
        }
    }
    let Some((anchor_window, maturity_anchor)) = anchor else {
        return Vec::new();
    };
    let usable_windows: Vec<u32> = windows
        .iter()
        .copied()
        .filter(|window| *window <= anchor_window)
        .collect();

    let mut eligible_totals: BTreeMap<&'static str, u64> = BTreeMap::new();
    for ((segment, activation_date), size) in &cohort_sizes {
        if *activation_date <= maturity_anchor {
            *eligible_totals.entry(*segment).or_insert(0) += *size;
        }
    }

    let updated_at = Utc::now().timestamp();
    let mut rows = Vec::new();
    for window in usable_windows {
        let mut retained: HashMap<&'static str, HashSet<(&str, NaiveDate)>> = HashMap::new();
        for row in activity {
            let Some(memberships) = member_index.get(row.address.as_str()) else {
                continue;
            };
            for (segment, activation_date) in memberships {
                if *activation_date > maturity_anchor {
                    continue;
                }
                let days = (row.activity_date - *activation_date).num_days();
                if days > 0 && days <= window as i64 {
                    retained
                        .entry(*segment)
                        .or_default()
                        .insert((row.address.as_str(), *activation_date));
                }
            }
        }

        for (segment, eligible) in &eligible_totals {
            if *eligible == 0 {
                continue;
            }
            let retained_users = retained
                .get(segment)
                .map(|wallets| wallets.len() as u64)
                .unwrap_or(0);
            rows.push(SegmentedRetentionRow {
                window_days: window,
                segment: segment.to_string(),
                retained_users,
                eligible_users: *eligible,
                retention_pct: retained_users as f64 / *eligible as f64 * 100.0,
                anchor_window_days: anchor_window,
                updated_at,
            });
        }
    }

    rows
}

/// Snapshot recent activation-day balances, derive funding and value inputs,
/// compute the panel and persist it wholesale.
#[allow(clippy::too_many_arguments)]
pub async fn build_segmented_panel<S: BalanceSource>(
    source: &S,
    pool: &SqlitePool,
    activity: &[ActivityRow],
    first_seen: &[FirstSeen],
    windows: &[u32],
    refresh: &RefreshConfig,
    lookback_days: i64,
    today: NaiveDate,
    progress: Option<ProgressCallback<'_>>,
    cancel: &CancellationToken,
) -> Result<Vec<SegmentedRetentionRow>, sqlx::Error> {
    ensure_activation_day_snapshots(
        source,
        pool,
        first_seen,
        lookback_days,
        today,
        refresh,
        progress,
        cancel,
    )
    .await?;

    let funding = load_activation_funding(pool, first_seen).await?;
    let flags = compute_value_flags(activity, first_seen, VALUE_WINDOW_DAYS, VALUE_MIN_FEE_STX);
    let panel = compute_segmented_retention(activity, first_seen, windows, &funding, &flags, today);
    db::segmented::replace_segmented_panel(pool, &panel).await?;
    Ok(panel)
}
