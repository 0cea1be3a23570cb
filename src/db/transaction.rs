use crate::models::{ActivityRow, TransactionRecord};
use chrono::{DateTime, NaiveDate};
use sqlx::{Pool, Row, Sqlite};

/// Oldest/newest anchoring timestamps currently in the store, used to resume
/// both sync phases without external checkpoint state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeExtrema {
    pub min_block_time: Option<i64>,
    pub max_block_time: Option<i64>,
    pub min_burn_block_time: Option<i64>,
}

/// Upsert a batch of records atomically. Re-inserting an identical batch is
/// observationally a no-op; a conflicting re-fetch replaces the stored row.
pub async fn upsert_transactions(
    pool: &Pool<Sqlite>,
    records: &[TransactionRecord],
) -> Result<(), sqlx::Error> {
    if records.is_empty() {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    for record in records {
        sqlx::query(
            r#"
            INSERT INTO transactions
            (tx_id, block_time, block_height, sender_address, fee_ustx, tx_type,
             canonical, tx_status, burn_block_time, burn_block_height,
             microblock_sequence, ingested_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tx_id) DO UPDATE SET
                block_time = excluded.block_time,
                block_height = excluded.block_height,
                sender_address = excluded.sender_address,
                fee_ustx = excluded.fee_ustx,
                tx_type = excluded.tx_type,
                canonical = excluded.canonical,
                tx_status = excluded.tx_status,
                burn_block_time = excluded.burn_block_time,
                burn_block_height = excluded.burn_block_height,
                microblock_sequence = excluded.microblock_sequence,
                ingested_at = excluded.ingested_at
            "#,
        )
        .bind(&record.tx_id)
        .bind(record.block_time)
        .bind(record.block_height)
        .bind(&record.sender_address)
        .bind(record.fee_ustx)
        .bind(&record.tx_type)
        .bind(record.canonical)
        .bind(&record.tx_status)
        .bind(record.burn_block_time)
        .bind(record.burn_block_height)
        .bind(record.microblock_sequence)
        .bind(record.ingested_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(())
}

/// Wallet activity at or after `cutoff`, newest first, floored to activity
/// dates no earlier than `coverage_floor`.
pub async fn recent_activity(
    pool: &Pool<Sqlite>,
    cutoff: i64,
    coverage_floor: NaiveDate,
) -> Result<Vec<ActivityRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT tx_id, sender_address, block_time, fee_ustx, tx_type
           FROM transactions
           WHERE block_time >= ?
           ORDER BY block_time DESC"#,
    )
    .bind(cutoff)
    .fetch_all(pool)
    .await?;

    let mut activity = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        let block_time: i64 = row.get("block_time");
        let Some(timestamp) = DateTime::from_timestamp(block_time, 0) else {
            continue;
        };
        let activity_date = timestamp.date_naive();
        if activity_date < coverage_floor {
            continue;
        }
        activity.push(ActivityRow {
            tx_id: row.get("tx_id"),
            address: row.get("sender_address"),
            block_time: timestamp,
            activity_date,
            fee_ustx: row.get("fee_ustx"),
            tx_type: row.get("tx_type"),
        });
    }

    Ok(activity)
}

pub async fn time_extrema(pool: &Pool<Sqlite>) -> Result<TimeExtrema, sqlx::Error> {
    let row = sqlx::query(
        "SELECT MIN(block_time), MAX(block_time), MIN(burn_block_time) FROM transactions",
    )
    .fetch_one(pool)
    .await?;

    Ok(TimeExtrema {
        min_block_time: row.get(0),
        max_block_time: row.get(1),
        min_burn_block_time: row.get(2),
    })
}

pub async fn count_transactions(pool: &Pool<Sqlite>) -> Result<i64, sqlx::Error> {
    let count = sqlx::query("SELECT COUNT(*) FROM transactions")
        .fetch_one(pool)
        .await?
        .get::<i64, _>(0);

    Ok(count)
}

/// Full wipe; only a forced refresh deletes stored transactions.
pub async fn wipe_transactions(pool: &Pool<Sqlite>) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM transactions").execute(pool).await?;
    Ok(())
}

/// Fetch a single record by id.
pub async fn get_transaction(
    pool: &Pool<Sqlite>,
    tx_id: &str,
) -> Result<Option<TransactionRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT tx_id, block_time, block_height, sender_address, fee_ustx, tx_type,
                  canonical, tx_status, burn_block_time, burn_block_height,
                  microblock_sequence, ingested_at
           FROM transactions WHERE tx_id = ?"#,
    )
    .bind(tx_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| TransactionRecord {
        tx_id: row.get("tx_id"),
        block_time: row.get("block_time"),
        block_height: row.get("block_height"),
        sender_address: row.get("sender_address"),
        fee_ustx: row.get("fee_ustx"),
        tx_type: row.get("tx_type"),
        canonical: row.get::<i64, _>("canonical") != 0,
        tx_status: row.get("tx_status"),
        burn_block_time: row.get("burn_block_time"),
        burn_block_height: row.get("burn_block_height"),
        microblock_sequence: row.get("microblock_sequence"),
        ingested_at: row.get("ingested_at"),
    }))
}
