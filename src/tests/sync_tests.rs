use crate::db::transaction;
use crate::sync::{SyncEngine, SyncError};
use crate::tests::support::{orphaned_tx, page, raw_tx, record, test_pool, valid_tx, ScriptedSource};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

async fn stored_ids(pool: &sqlx::SqlitePool) -> BTreeSet<String> {
    use sqlx::Row;
    sqlx::query("SELECT tx_id FROM transactions ORDER BY tx_id")
        .fetch_all(pool)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>("tx_id"))
        .collect()
}

fn horizon(epoch: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(epoch, 0).unwrap()
}

#[tokio::test]
async fn forward_sync_walks_pages_and_counts_drops() {
    let pool = test_pool().await;
    let source = ScriptedSource::new(vec![
        (
            None,
            page(vec![
                valid_tx("t3", "SP1", 3_000),
                valid_tx("t2", "SP2", 2_500),
                orphaned_tx("bad", 2_400),
            ]),
        ),
        (Some(2_399), page(vec![valid_tx("t1", "SP3", 2_000)])),
        (Some(1_999), page(vec![])),
    ]);

    let engine = SyncEngine::new(&source, &pool, 50, 100);
    let outcome = engine.sync_latest().await.unwrap();

    assert_eq!(outcome.pages_fetched, 3);
    assert_eq!(outcome.records_upserted, 3);
    assert_eq!(outcome.records_dropped, 1);
    assert_eq!(
        stored_ids(&pool).await,
        BTreeSet::from(["t1".to_string(), "t2".to_string(), "t3".to_string()])
    );
    // The first request has no cursor and bypasses the cache; later ones don't
    let requests = source.requests.lock().unwrap();
    assert!(requests[0].force_refresh);
    assert!(!requests[1].force_refresh);
    assert_eq!(requests[0].end_time, None);
    assert_eq!(requests[1].end_time, Some(2_399));
    assert_eq!(requests[2].end_time, Some(1_999));
}

#[tokio::test]
async fn forward_sync_stops_once_caught_up_with_stored_maximum() {
    let pool = test_pool().await;
    transaction::upsert_transactions(&pool, &[record("seen", "SP1", 2_500)])
        .await
        .unwrap();

    let source = ScriptedSource::new(vec![(
        None,
        page(vec![valid_tx("t3", "SP1", 3_000), valid_tx("t2", "SP2", 2_500)]),
    )]);

    let engine = SyncEngine::new(&source, &pool, 50, 100);
    let outcome = engine.sync_latest().await.unwrap();

    // The page's oldest accepted record is not newer than the stored maximum,
    // so one page suffices instead of a full re-walk.
    assert_eq!(outcome.pages_fetched, 1);
    assert_eq!(source.cursors(), vec![None]);
    assert_eq!(stored_ids(&pool).await.len(), 3);
}

#[tokio::test]
async fn backward_sync_is_a_noop_when_horizon_already_covered() {
    let pool = test_pool().await;
    transaction::upsert_transactions(&pool, &[record("old", "SP1", 1_000)])
        .await
        .unwrap();

    let source = ScriptedSource::new(vec![]);
    let engine = SyncEngine::new(&source, &pool, 50, 100);
    let outcome = engine.sync_history(horizon(1_500)).await.unwrap();

    assert_eq!(outcome.pages_fetched, 0);
    assert!(source.cursors().is_empty());
}

#[tokio::test]
async fn backward_sync_walks_until_horizon_with_decreasing_cursors() {
    let pool = test_pool().await;
    transaction::upsert_transactions(&pool, &[record("t2", "SP1", 2_500)])
        .await
        .unwrap();

    let source = ScriptedSource::new(vec![
        (Some(2_499), page(vec![valid_tx("t1", "SP2", 1_800)])),
        (Some(1_799), page(vec![valid_tx("t0", "SP3", 900)])),
    ]);

    let engine = SyncEngine::new(&source, &pool, 50, 100);
    let outcome = engine.sync_history(horizon(1_000)).await.unwrap();

    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(outcome.records_upserted, 2);
    let cursors: Vec<i64> = source.cursors().into_iter().flatten().collect();
    assert_eq!(cursors, vec![2_499, 1_799]);
    assert!(cursors.windows(2).all(|pair| pair[1] < pair[0]));
    assert_eq!(stored_ids(&pool).await.len(), 3);
}

#[tokio::test]
async fn fully_rejected_page_still_advances_the_cursor() {
    let pool = test_pool().await;
    transaction::upsert_transactions(&pool, &[record("t2", "SP1", 2_500)])
        .await
        .unwrap();

    let source = ScriptedSource::new(vec![
        (Some(2_499), page(vec![orphaned_tx("bad1", 2_000), orphaned_tx("bad2", 2_100)])),
        (Some(1_999), page(vec![])),
    ]);

    let engine = SyncEngine::new(&source, &pool, 50, 100);
    let outcome = engine.sync_history(horizon(500)).await.unwrap();

    // No record survived the filter, yet the unfiltered page yielded the next
    // cursor and the walk continued instead of stalling.
    assert_eq!(source.cursors(), vec![Some(2_499), Some(1_999)]);
    assert_eq!(outcome.records_upserted, 0);
    assert_eq!(outcome.records_dropped, 2);
}

#[tokio::test]
async fn acceptance_filter_keeps_invalid_records_out_of_the_store() {
    let pool = test_pool().await;
    let source = ScriptedSource::new(vec![(
        None,
        page(vec![
            valid_tx("ok", "SP1", 3_000),
            raw_tx(serde_json::json!({
                "tx_id": "no-sender", "block_time": 2_900, "burn_block_time": 2_900,
                "canonical": true, "tx_status": "success"
            })),
            raw_tx(serde_json::json!({
                "tx_id": "failed", "sender_address": "SP2", "block_time": 2_800,
                "burn_block_time": 2_800, "canonical": true, "tx_status": "abort_by_post_condition"
            })),
            raw_tx(serde_json::json!({
                "tx_id": "no-time", "sender_address": "SP3",
                "canonical": true, "tx_status": "success"
            })),
            orphaned_tx("orphan", 2_700),
        ]),
    )]);

    let engine = SyncEngine::new(&source, &pool, 50, 1);
    let outcome = engine.sync_latest().await.unwrap();

    assert_eq!(outcome.records_upserted, 1);
    assert_eq!(outcome.records_dropped, 4);
    assert_eq!(stored_ids(&pool).await, BTreeSet::from(["ok".to_string()]));
}

#[tokio::test]
async fn interrupted_history_sync_resumes_to_the_same_state() {
    let history_pages = vec![
        (Some(4_999), page(vec![valid_tx("h1", "SP1", 4_000)])),
        (Some(3_999), page(vec![valid_tx("h2", "SP2", 3_000)])),
        (Some(2_999), page(vec![valid_tx("h3", "SP3", 2_000)])),
        (Some(1_999), page(vec![])),
    ];

    // Uninterrupted reference run
    let reference_pool = test_pool().await;
    transaction::upsert_transactions(&reference_pool, &[record("newest", "SP0", 5_000)])
        .await
        .unwrap();
    let reference_source = ScriptedSource::new(history_pages.clone());
    let reference = SyncEngine::new(&reference_source, &reference_pool, 50, 100);
    reference.sync_history(horizon(1_500)).await.unwrap();
    let expected = stored_ids(&reference_pool).await;

    // Interrupted after two pages, then resumed from store extrema alone
    let pool = test_pool().await;
    transaction::upsert_transactions(&pool, &[record("newest", "SP0", 5_000)])
        .await
        .unwrap();
    let interrupted_source = ScriptedSource::new(history_pages.clone());
    let interrupted = SyncEngine::new(&interrupted_source, &pool, 50, 2);
    interrupted.sync_history(horizon(1_500)).await.unwrap();
    assert_eq!(stored_ids(&pool).await.len(), 3); // newest + h1 + h2

    let resumed_source = ScriptedSource::new(history_pages.clone());
    let resumed = SyncEngine::new(&resumed_source, &pool, 50, 100);
    resumed.sync_history(horizon(1_500)).await.unwrap();

    assert_eq!(stored_ids(&pool).await, expected);
    // The resumed walk started below the already-covered range
    assert_eq!(resumed_source.cursors()[0], Some(2_999));

    // Running once more changes nothing
    let again_source = ScriptedSource::new(history_pages);
    let again = SyncEngine::new(&again_source, &pool, 50, 100);
    again.sync_history(horizon(1_500)).await.unwrap();
    assert_eq!(stored_ids(&pool).await, expected);
}

#[tokio::test]
async fn build_wallet_metrics_ingests_then_aggregates() {
    let pool = test_pool().await;
    let now = Utc::now().timestamp();
    let activation = now - 86_400 * 20;
    let return_visit = now - 86_400 * 11; // day 9 after activation

    let source = ScriptedSource::new(vec![
        (
            None,
            page(vec![
                valid_tx("a-return", "SPA", return_visit),
                valid_tx("a-first", "SPA", activation),
            ]),
        ),
        (Some(activation - 1), page(vec![])),
    ]);

    let engine = SyncEngine::new(&source, &pool, 50, 100);
    let bundle = crate::metrics::build_wallet_metrics(&engine, 60, &[15], false)
        .await
        .unwrap();

    assert_eq!(bundle.activity.len(), 2);
    assert_eq!(bundle.first_seen.len(), 1);
    assert_eq!(bundle.first_seen[0].address, "SPA");
    assert_eq!(bundle.first_seen[0].first_seen.timestamp(), activation);
    assert_eq!(bundle.new_wallets.len(), 1);
    assert_eq!(bundle.active_wallets.len(), 2);

    // Activated 20 days ago and seen again on day 9: fully retained at 15 days
    assert_eq!(bundle.retention.len(), 1);
    assert_eq!(bundle.retention[0].window_days, 15);
    assert_eq!(bundle.retention[0].cohort_size, 1);
    assert_eq!(bundle.retention[0].retention_rate, 1.0);

    assert_eq!(bundle.fee_per_wallet.len(), 1);
    assert_eq!(bundle.fee_per_wallet[0].wallets_observed, 1);
}

#[tokio::test]
async fn ensure_history_rejects_nonpositive_horizons_and_supports_wipe() {
    let pool = test_pool().await;
    transaction::upsert_transactions(&pool, &[record("stale", "SP1", 1_000)])
        .await
        .unwrap();

    let source = ScriptedSource::new(vec![(None, page(vec![]))]);
    let engine = SyncEngine::new(&source, &pool, 50, 100);

    assert!(matches!(
        engine.ensure_history(0, false).await,
        Err(SyncError::InvalidHorizon(0))
    ));

    engine.ensure_history(30, true).await.unwrap();
    assert_eq!(transaction::count_transactions(&pool).await.unwrap(), 0);
}
