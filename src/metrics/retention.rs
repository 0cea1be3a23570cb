//! Activation-aligned retention.

use super::{data_coverage_start, normalize_windows};
use crate::models::{ActivityRow, FirstSeen, RetentionRow};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

/// How engagement within a window is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionMode {
    /// Any activity in days (0, W] after activation.
    Cumulative,
    /// Activity in the trailing band (W - band, W] only, so long-window rates
    /// reflect wallets still active near the window's end.
    ActiveBand,
}

/// Trailing band length for a window: an explicit override when given,
/// otherwise 15 days for the 15-day window and 30 for anything longer,
/// clamped to the window itself.
pub fn resolve_retention_band(window: u32, band_days: Option<&BTreeMap<u32, u32>>) -> u32 {
    let band = band_days
        .and_then(|bands| bands.get(&window).copied())
        .filter(|band| *band > 0)
        .unwrap_or(if window <= 15 { 15 } else { 30 });
    band.min(window)
}

/// Compute retention per activation date and window.
///
/// A cohort only enters the output for window W once `today - D >= W`;
/// immature cohorts are excluded rather than reported as zero.
pub fn compute_retention(
    activity: &[ActivityRow],
    first_seen: &[FirstSeen],
    windows: &[u32],
    today: NaiveDate,
    mode: RetentionMode,
    band_days: Option<&BTreeMap<u32, u32>>,
) -> Vec<RetentionRow> {
    if activity.is_empty() || first_seen.is_empty() {
        return Vec::new();
    }
    let windows = normalize_windows(windows);
    if windows.is_empty() {
        return Vec::new();
    }

    let coverage = data_coverage_start();
    let activation_by_address: HashMap<&str, DateTime<Utc>> = first_seen
        .iter()
        .filter(|wallet| wallet.first_seen >= coverage)
        .map(|wallet| (wallet.address.as_str(), wallet.first_seen))
        .collect();
    if activation_by_address.is_empty() {
        return Vec::new();
    }

    // (address, activation date, days since activation) per activity row
    let mut observations: Vec<(&str, NaiveDate, i64)> = Vec::with_capacity(activity.len());
    for row in activity {
        let Some(first) = activation_by_address.get(row.address.as_str()) else {
            continue;
        };
        let activation = first.date_naive();
        let days = (row.activity_date - activation).num_days();
        if days < 0 {
            continue;
        }
        observations.push((row.address.as_str(), activation, days));
    }
    if observations.is_empty() {
        return Vec::new();
    }

    let mut cohorts: BTreeMap<NaiveDate, HashSet<&str>> = BTreeMap::new();
    for (address, activation, days) in &observations {
        if *days == 0 {
            cohorts.entry(*activation).or_default().insert(*address);
        }
    }

    let mut results = Vec::new();
    for window in windows {
        let maturity_cutoff = today - ChronoDuration::days(window as i64);
        let lower = match mode {
            RetentionMode::Cumulative => 0,
            RetentionMode::ActiveBand => {
                window.saturating_sub(resolve_retention_band(window, band_days)) as i64
            }
        };

        let mut engaged: HashMap<NaiveDate, HashSet<&str>> = HashMap::new();
        for (address, activation, days) in &observations {
            if *days > lower && *days <= window as i64 {
                engaged.entry(*activation).or_default().insert(*address);
            }
        }

        for (activation_date, cohort) in &cohorts {
            if *activation_date > maturity_cutoff {
                continue;
            }
            let cohort_size = cohort.len() as u64;
            let retained = engaged
                .get(activation_date)
                .map(|wallets| wallets.len() as u64)
                .unwrap_or(0);
            let rate = if cohort_size > 0 {
                retained as f64 / cohort_size as f64
            } else {
                0.0
            };
            results.push(RetentionRow {
                activation_date: *activation_date,
                window_days: window,
                cohort_size,
                retained_wallets: retained,
                retention_rate: rate,
            });
        }
    }

    results
}
