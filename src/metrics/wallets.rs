//! Daily wallet counts: activations per day and active wallets with rolling
//! means.

use crate::models::{ActiveWalletsRow, ActivityRow, FirstSeen, NewWalletsRow};
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};

pub fn compute_new_wallets(first_seen: &[FirstSeen], start: NaiveDate) -> Vec<NewWalletsRow> {
    let mut per_day: BTreeMap<NaiveDate, HashSet<&str>> = BTreeMap::new();
    for wallet in first_seen {
        let activation = wallet.activation_date();
        if activation >= start {
            per_day
                .entry(activation)
                .or_default()
                .insert(wallet.address.as_str());
        }
    }
    per_day
        .into_iter()
        .map(|(activation_date, wallets)| NewWalletsRow {
            activation_date,
            new_wallets: wallets.len() as u64,
        })
        .collect()
}

pub fn compute_active_wallets(activity: &[ActivityRow], start: NaiveDate) -> Vec<ActiveWalletsRow> {
    let mut per_day: BTreeMap<NaiveDate, HashSet<&str>> = BTreeMap::new();
    for row in activity {
        if row.activity_date >= start {
            per_day
                .entry(row.activity_date)
                .or_default()
                .insert(row.address.as_str());
        }
    }

    let counts: Vec<(NaiveDate, u64)> = per_day
        .into_iter()
        .map(|(date, wallets)| (date, wallets.len() as u64))
        .collect();

    counts
        .iter()
        .enumerate()
        .map(|(index, (activity_date, active_wallets))| ActiveWalletsRow {
            activity_date: *activity_date,
            active_wallets: *active_wallets,
            rolling_7d: trailing_mean(&counts, index, 7),
            rolling_30d: trailing_mean(&counts, index, 30),
        })
        .collect()
}

fn trailing_mean(counts: &[(NaiveDate, u64)], index: usize, window: usize) -> f64 {
    let start = (index + 1).saturating_sub(window);
    let slice = &counts[start..=index];
    slice.iter().map(|(_, count)| *count as f64).sum::<f64>() / slice.len() as f64
}
