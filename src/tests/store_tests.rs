use crate::db::{balance, segmented, transaction, wallet};
use crate::models::{BalanceSnapshot, SegmentedRetentionRow};
use crate::tests::support::{day, record, test_pool};

#[tokio::test]
async fn upserting_an_identical_batch_twice_is_a_noop() {
    let pool = test_pool().await;
    let batch = vec![record("tx1", "SP1", 1_000), record("tx2", "SP2", 2_000)];

    transaction::upsert_transactions(&pool, &batch).await.unwrap();
    let first = transaction::get_transaction(&pool, "tx1").await.unwrap();

    transaction::upsert_transactions(&pool, &batch).await.unwrap();
    let second = transaction::get_transaction(&pool, "tx1").await.unwrap();

    assert_eq!(transaction::count_transactions(&pool).await.unwrap(), 2);
    assert_eq!(first, second);
}

#[tokio::test]
async fn conflicting_refetch_replaces_the_stored_row() {
    let pool = test_pool().await;
    transaction::upsert_transactions(&pool, &[record("tx1", "SP1", 1_000)])
        .await
        .unwrap();

    let mut updated = record("tx1", "SP1", 1_000);
    updated.fee_ustx = 9_999;
    updated.block_height = Some(200);
    transaction::upsert_transactions(&pool, &[updated]).await.unwrap();

    let stored = transaction::get_transaction(&pool, "tx1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.fee_ustx, 9_999);
    assert_eq!(stored.block_height, Some(200));
    assert_eq!(transaction::count_transactions(&pool).await.unwrap(), 1);
}

#[tokio::test]
async fn extrema_track_min_max_and_burn_floor() {
    let pool = test_pool().await;

    let empty = transaction::time_extrema(&pool).await.unwrap();
    assert_eq!(empty.min_block_time, None);
    assert_eq!(empty.max_block_time, None);
    assert_eq!(empty.min_burn_block_time, None);

    let mut older = record("tx1", "SP1", 1_000);
    older.burn_block_time = Some(950);
    transaction::upsert_transactions(&pool, &[older, record("tx2", "SP2", 3_000)])
        .await
        .unwrap();

    let extrema = transaction::time_extrema(&pool).await.unwrap();
    assert_eq!(extrema.min_block_time, Some(1_000));
    assert_eq!(extrema.max_block_time, Some(3_000));
    assert_eq!(extrema.min_burn_block_time, Some(950));
}

#[tokio::test]
async fn recent_activity_applies_cutoff_and_coverage_floor() {
    let pool = test_pool().await;
    // 2025-02-01T00:00:00Z and an hour later
    let recent = 1_738_368_000;
    transaction::upsert_transactions(
        &pool,
        &[
            record("tx-old", "SP1", recent - 86_400 * 30),
            record("tx-new", "SP1", recent),
            record("tx-newer", "SP2", recent + 3_600),
            // Before the 2024-12-23 coverage start even though the cutoff allows it
            record("tx-precoverage", "SP3", 1_700_000_000),
        ],
    )
    .await
    .unwrap();

    let activity = transaction::recent_activity(&pool, 1_600_000_000, day(2024, 12, 23))
        .await
        .unwrap();

    let ids: Vec<&str> = activity.iter().map(|row| row.tx_id.as_str()).collect();
    assert_eq!(ids, vec!["tx-newer", "tx-new", "tx-old"]);
    assert_eq!(activity[0].address, "SP2");
    assert_eq!(activity[0].fee_ustx, 1_000);

    let bounded = transaction::recent_activity(&pool, recent, day(2024, 12, 23))
        .await
        .unwrap();
    assert_eq!(bounded.len(), 2);
}

#[tokio::test]
async fn wipe_empties_the_store() {
    let pool = test_pool().await;
    transaction::upsert_transactions(&pool, &[record("tx1", "SP1", 1_000)])
        .await
        .unwrap();
    transaction::wipe_transactions(&pool).await.unwrap();
    assert_eq!(transaction::count_transactions(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn first_seen_merge_is_monotonic_minimum() {
    let pool = test_pool().await;
    let floor = 0;

    wallet::merge_first_seen(&pool, &[("SP1".to_string(), 1_800_000_000)])
        .await
        .unwrap();
    wallet::merge_first_seen(&pool, &[("SP1".to_string(), 1_750_000_000)])
        .await
        .unwrap();
    // A later sighting never moves the activation forward
    wallet::merge_first_seen(&pool, &[("SP1".to_string(), 1_900_000_000)])
        .await
        .unwrap();

    let loaded = wallet::load_first_seen(&pool, floor).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].first_seen.timestamp(), 1_750_000_000);
}

#[tokio::test]
async fn first_seen_load_respects_the_floor() {
    let pool = test_pool().await;
    wallet::merge_first_seen(
        &pool,
        &[
            ("SP-early".to_string(), 1_000),
            ("SP-late".to_string(), 2_000_000_000),
        ],
    )
    .await
    .unwrap();

    let loaded = wallet::load_first_seen(&pool, 1_000_000_000).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].address, "SP-late");
}

#[tokio::test]
async fn balance_snapshots_round_trip() {
    let pool = test_pool().await;
    let snapshot_date = day(2025, 3, 1);
    let snapshots = vec![
        BalanceSnapshot {
            address: "SP1".to_string(),
            as_of_date: snapshot_date,
            balance_ustx: 25_000_000,
            funded: true,
            ingested_at: 1,
        },
        BalanceSnapshot {
            address: "SP2".to_string(),
            as_of_date: snapshot_date,
            balance_ustx: 100,
            funded: false,
            ingested_at: 1,
        },
    ];
    balance::upsert_balances(&pool, &snapshots).await.unwrap();

    let addresses = vec!["SP1".to_string(), "SP2".to_string(), "SP3".to_string()];
    let existing = balance::existing_snapshot_addresses(&pool, snapshot_date, &addresses)
        .await
        .unwrap();
    assert!(existing.contains("SP1"));
    assert!(existing.contains("SP2"));
    assert!(!existing.contains("SP3"));

    // A different date has no snapshots
    let other = balance::existing_snapshot_addresses(&pool, day(2025, 3, 2), &addresses)
        .await
        .unwrap();
    assert!(other.is_empty());

    let loaded = balance::balances_for_dates(&pool, &[snapshot_date]).await.unwrap();
    assert_eq!(loaded.len(), 2);
    let funded: Vec<bool> = {
        let mut rows = loaded.clone();
        rows.sort_by(|a, b| a.address.cmp(&b.address));
        rows.iter().map(|row| row.funded).collect()
    };
    assert_eq!(funded, vec![true, false]);
}

#[tokio::test]
async fn segmented_panel_is_replaced_wholesale() {
    let pool = test_pool().await;
    let row = |window: u32, segment: &str| SegmentedRetentionRow {
        window_days: window,
        segment: segment.to_string(),
        retained_users: 5,
        eligible_users: 10,
        retention_pct: 50.0,
        anchor_window_days: 30,
        updated_at: 1,
    };

    segmented::replace_segmented_panel(&pool, &[row(15, "All"), row(30, "All")])
        .await
        .unwrap();
    assert_eq!(segmented::load_segmented_panel(&pool).await.unwrap().len(), 2);

    segmented::replace_segmented_panel(&pool, &[row(15, "Value")])
        .await
        .unwrap();
    let reloaded = segmented::load_segmented_panel(&pool).await.unwrap();
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].segment, "Value");
    assert_eq!(reloaded[0].anchor_window_days, 30);
}
