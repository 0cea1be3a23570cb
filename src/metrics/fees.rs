//! Fee-per-wallet statistics over activation windows.

use super::normalize_windows;
use crate::models::{ActivityRow, FeePerWalletRow, FirstSeen, MICROSTX_PER_STX};
use chrono::{Duration as ChronoDuration, NaiveDate};
use std::collections::{BTreeMap, HashMap};

/// Average and median fee per wallet, restricted to wallets active within
/// `[D, D+W)` days of activation. Only matured cohorts are reported.
pub fn compute_fee_per_wallet(
    activity: &[ActivityRow],
    first_seen: &[FirstSeen],
    windows: &[u32],
    today: NaiveDate,
) -> Vec<FeePerWalletRow> {
    if activity.is_empty() || first_seen.is_empty() {
        return Vec::new();
    }
    let windows = normalize_windows(windows);
    if windows.is_empty() {
        return Vec::new();
    }

    let activation_by_address: HashMap<&str, NaiveDate> = first_seen
        .iter()
        .map(|wallet| (wallet.address.as_str(), wallet.activation_date()))
        .collect();

    // (address, activation, days since activation, fee)
    let mut observations: Vec<(&str, NaiveDate, i64, i64)> = Vec::with_capacity(activity.len());
    for row in activity {
        let Some(activation) = activation_by_address.get(row.address.as_str()) else {
            continue;
        };
        let days = (row.activity_date - *activation).num_days();
        if days < 0 {
            continue;
        }
        observations.push((row.address.as_str(), *activation, days, row.fee_ustx));
    }

    let mut results = Vec::new();
    for window in windows {
        let maturity_cutoff = today - ChronoDuration::days(window as i64);

        let mut wallet_fees: BTreeMap<NaiveDate, HashMap<&str, i64>> = BTreeMap::new();
        for (address, activation, days, fee) in &observations {
            if *activation > maturity_cutoff {
                continue;
            }
            if *days >= window as i64 {
                continue;
            }
            *wallet_fees
                .entry(*activation)
                .or_default()
                .entry(*address)
                .or_insert(0) += *fee;
        }

        for (activation_date, per_wallet) in wallet_fees {
            let mut fees_stx: Vec<f64> = per_wallet
                .values()
                .map(|total| *total as f64 / MICROSTX_PER_STX as f64)
                .collect();
            if fees_stx.is_empty() {
                continue;
            }
            let count = fees_stx.len();
            let avg = fees_stx.iter().sum::<f64>() / count as f64;
            results.push(FeePerWalletRow {
                activation_date,
                window_days: window,
                avg_fee_stx: avg,
                median_fee_stx: median(&mut fees_stx),
                wallets_observed: count as u64,
            });
        }
    }

    results
}

fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}
